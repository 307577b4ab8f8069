//! Conversion from [`http::Request`] into [`RequestParts`].
//!
//! Servers built on the `http` crate (hyper, axum, tower) can snapshot their
//! requests with [`RequestParts::from_http`]. Route parameters and the
//! authenticated principal are not part of the HTTP message, so routers and
//! auth layers attach them as [`RouteParams`] and [`Principal`] extensions.

use percent_encoding::percent_decode_str;

use crate::additional_context::{AdditionalContext, ContextValue};
use crate::request::RequestParts;

/// Route parameters captured by the host router, stored as a request
/// extension.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteParams(pub AdditionalContext);

/// Identifying data of the authenticated user, stored as a request extension.
#[derive(Clone, Debug, PartialEq)]
pub struct Principal(pub ContextValue);

impl RequestParts {
    /// Snapshot an [`http::Request`].
    ///
    /// The body is parsed as JSON when possible and kept as text otherwise;
    /// an empty body is treated as absent. The scheme defaults to `http` and
    /// the host falls back to the `Host` header, then `localhost`, when the
    /// URI is relative. Userinfo in the URI authority is never kept.
    pub fn from_http<B: AsRef<[u8]>>(request: &http::Request<B>) -> Self {
        let uri = request.uri();
        let original_url = uri
            .path_and_query()
            .map_or_else(|| uri.path().to_owned(), |pq| pq.as_str().to_owned());
        let hostname = uri
            .authority()
            .map(|authority| match authority.port_u16() {
                Some(port) => format!("{}:{port}", authority.host()),
                None => authority.host().to_owned(),
            })
            .or_else(|| {
                request
                    .headers()
                    .get(http::header::HOST)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned)
            });

        let mut parts = Self::new(request.method().as_str(), original_url)
            .with_protocol(uri.scheme_str().unwrap_or("http"));
        if let Some(hostname) = hostname {
            parts.hostname = hostname;
        }
        for (name, value) in request.headers() {
            if let Ok(value) = value.to_str() {
                parts = parts.with_header(name.as_str(), value);
            }
        }
        parts.body = parse_body(request.body().as_ref());
        parts.query = uri.query().map(decode_query).filter(|q| !q.is_empty());
        parts.params = request
            .extensions()
            .get::<RouteParams>()
            .map(|params| params.0.clone());
        parts.principal = request
            .extensions()
            .get::<Principal>()
            .map(|principal| principal.0.clone());
        parts
    }
}

impl<B: AsRef<[u8]>> From<&http::Request<B>> for RequestParts {
    fn from(request: &http::Request<B>) -> Self {
        Self::from_http(request)
    }
}

fn parse_body(bytes: &[u8]) -> Option<ContextValue> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => ContextValue::from_json(value),
        Err(_) => Some(ContextValue::String(
            String::from_utf8_lossy(bytes).into_owned(),
        )),
    }
}

/// Decode an `application/x-www-form-urlencoded` query string.
///
/// `+` decodes to a space. Repeated keys collect into a list in order of
/// appearance.
pub fn decode_query(query: &str) -> AdditionalContext {
    let mut decoded = AdditionalContext::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        let value = ContextValue::String(decode_component(value));
        match decoded.remove(&key) {
            None => {
                decoded.insert(key, value);
            }
            Some(ContextValue::List(mut items)) => {
                items.push(value);
                decoded.insert(key, ContextValue::List(items));
            }
            Some(previous) => {
                decoded.insert(key, ContextValue::List(vec![previous, value]));
            }
        }
    }
    decoded
}

fn decode_component(component: &str) -> String {
    percent_decode_str(&component.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}
