//! Inbound request abstraction consumed by the context extractor.
//!
//! Host servers expose their requests through [`InboundRequest`]. The crate
//! ships [`RequestParts`], an owned implementation that adapters and tests can
//! fill in directly, and (with the `http-compat` feature) an implementation
//! for [`http::Request`].

use std::collections::BTreeMap;

use crate::additional_context::{AdditionalContext, ContextValue};

/// Read-only view of an inbound HTTP request.
///
/// Every accessor must be cheap and infallible; the context extractor calls
/// them on the host's request path.
pub trait InboundRequest {
    /// HTTP method, e.g. `GET`.
    fn method(&self) -> &str;
    /// URL scheme the request arrived on, e.g. `https`.
    fn protocol(&self) -> &str;
    /// Host name (and port, if non-default) the request was addressed to.
    fn hostname(&self) -> &str;
    /// Path plus query string exactly as received.
    fn original_url(&self) -> &str;
    /// Case-insensitive header lookup.
    fn header(&self, name: &str) -> Option<&str>;
    /// Parsed request body, if any.
    fn body(&self) -> Option<&ContextValue>;
    /// Decoded query parameters.
    fn query(&self) -> Option<&AdditionalContext>;
    /// Route parameters captured by the host router.
    fn params(&self) -> Option<&AdditionalContext>;
    /// Identifying data of the authenticated principal, when one is attached.
    fn principal(&self) -> Option<&ContextValue> {
        None
    }

    /// Path component of [`original_url`](Self::original_url) without the
    /// query string.
    fn path(&self) -> &str {
        let url = self.original_url();
        url.split_once('?').map_or(url, |(path, _)| path)
    }
}

/// Owned request snapshot implementing [`InboundRequest`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestParts {
    pub method: String,
    pub protocol: String,
    pub hostname: String,
    pub original_url: String,
    /// Header names are stored lower-cased.
    pub headers: BTreeMap<String, String>,
    pub body: Option<ContextValue>,
    pub query: Option<AdditionalContext>,
    pub params: Option<AdditionalContext>,
    pub principal: Option<ContextValue>,
}

impl RequestParts {
    /// Start a snapshot for `method` on `original_url`, defaulting to
    /// `http://localhost`.
    pub fn new(method: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            protocol: "http".into(),
            hostname: "localhost".into(),
            original_url: original_url.into(),
            ..Self::default()
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Add a header; the name is lower-cased for lookup.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<ContextValue>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_query(mut self, query: AdditionalContext) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_params(mut self, params: AdditionalContext) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_principal(mut self, principal: impl Into<ContextValue>) -> Self {
        self.principal = Some(principal.into());
        self
    }
}

impl InboundRequest for RequestParts {
    fn method(&self) -> &str {
        &self.method
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn hostname(&self) -> &str {
        &self.hostname
    }

    fn original_url(&self) -> &str {
        &self.original_url
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn body(&self) -> Option<&ContextValue> {
        self.body.as_ref()
    }

    fn query(&self) -> Option<&AdditionalContext> {
        self.query.as_ref()
    }

    fn params(&self) -> Option<&AdditionalContext> {
        self.params.as_ref()
    }

    fn principal(&self) -> Option<&ContextValue> {
        self.principal.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn header_lookup_ignores_case() {
        let req = RequestParts::new("GET", "/").with_header("User-Agent", "curl/8.0");
        assert_eq!(req.header("user-agent"), Some("curl/8.0"));
        assert_eq!(req.header("USER-AGENT"), Some("curl/8.0"));
    }

    #[rstest]
    #[case("/users/7?tab=billing", "/users/7")]
    #[case("/health", "/health")]
    #[case("/?", "/")]
    fn path_strips_query(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(RequestParts::new("GET", url).path(), expected);
    }
}
