//! Bounded snapshot of an inbound request.
//!
//! [`RequestContext::extract`] inspects a request through
//! [`InboundRequest`] and never fails: oversized fields are replaced with
//! [`FIELD_PLACEHOLDER`] and an unknown user agent produces empty client
//! fields.

use serde::Serialize;

use crate::additional_context::{AdditionalContext, ContextValue, serialized_len};
use crate::client_info::ClientInfo;
use crate::request::InboundRequest;

/// Largest serialized size, in characters, kept for body, query or params.
pub const FIELD_CEILING: usize = 500;
/// Value substituted for a request field above [`FIELD_CEILING`].
pub const FIELD_PLACEHOLDER: &str = "too long";

/// Request metadata merged into a record's additional context.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Referring origin from the `referer` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// `"<METHOD> <scheme>://<host><path+query>"`.
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<ContextValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<ContextValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<ContextValue>,
    #[serde(skip_serializing_if = "ClientInfo::is_empty")]
    pub client_info: ClientInfo,
    /// Identifying data of the authenticated principal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ContextValue>,
}

impl RequestContext {
    /// Take a bounded snapshot of `request`.
    pub fn extract<R: InboundRequest + ?Sized>(request: &R) -> Self {
        Self {
            origin: request.header("referer").map(str::to_owned),
            destination: destination(request),
            body: request.body().map(bounded),
            query: request
                .query()
                .filter(|q| !q.is_empty())
                .map(bounded_map),
            params: request
                .params()
                .filter(|p| !p.is_empty())
                .map(bounded_map),
            client_info: ClientInfo::parse(request.header("user-agent")),
            user: request.principal().cloned(),
        }
    }

    /// Flatten the snapshot into additional-context entries.
    ///
    /// Absent fields produce no key.
    pub fn into_context(self) -> AdditionalContext {
        let mut ctx = AdditionalContext::new();
        if let Some(origin) = self.origin {
            ctx.insert("origin".into(), origin.into());
        }
        ctx.insert("destination".into(), self.destination.into());
        if let Some(body) = self.body {
            ctx.insert("body".into(), body);
        }
        if let Some(query) = self.query {
            ctx.insert("query".into(), query);
        }
        if let Some(params) = self.params {
            ctx.insert("params".into(), params);
        }
        if !self.client_info.is_empty()
            && let Some(info) = to_context_value(&self.client_info)
        {
            ctx.insert("clientInfo".into(), info);
        }
        if let Some(user) = self.user {
            ctx.insert("user".into(), user);
        }
        ctx
    }
}

fn destination<R: InboundRequest + ?Sized>(request: &R) -> String {
    format!(
        "{} {}://{}{}",
        request.method(),
        request.protocol(),
        request.hostname(),
        request.original_url()
    )
}

/// Keep `value` unless its serialized form exceeds [`FIELD_CEILING`].
///
/// The value is replaced whole rather than cut, so the server never receives
/// a partial JSON document.
fn bounded(value: &ContextValue) -> ContextValue {
    if serialized_len(value) > FIELD_CEILING {
        ContextValue::from(FIELD_PLACEHOLDER)
    } else {
        value.clone()
    }
}

fn bounded_map(map: &AdditionalContext) -> ContextValue {
    if serialized_len(map) > FIELD_CEILING {
        ContextValue::from(FIELD_PLACEHOLDER)
    } else {
        ContextValue::Map(map.clone())
    }
}

fn to_context_value<T: Serialize>(value: &T) -> Option<ContextValue> {
    serde_json::to_value(value)
        .ok()
        .and_then(ContextValue::from_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::additional_context::context;
    use crate::request::RequestParts;
    use rstest::{fixture, rstest};

    #[fixture]
    fn request() -> RequestParts {
        RequestParts::new("POST", "/api/orders?draft=true")
            .with_protocol("https")
            .with_hostname("shop.example.com")
            .with_header("Referer", "https://shop.example.com/cart")
            .with_header("User-Agent", "curl/8.4.0")
    }

    #[rstest]
    fn composes_destination(request: RequestParts) {
        let ctx = RequestContext::extract(&request);
        assert_eq!(
            ctx.destination,
            "POST https://shop.example.com/api/orders?draft=true"
        );
    }

    #[rstest]
    fn captures_origin_and_client(request: RequestParts) {
        let ctx = RequestContext::extract(&request);
        assert_eq!(ctx.origin.as_deref(), Some("https://shop.example.com/cart"));
        assert_eq!(ctx.client_info.ua.as_deref(), Some("curl/8.4.0"));
        assert_eq!(ctx.client_info.browser.name.as_deref(), Some("curl"));
    }

    #[rstest]
    fn keeps_small_fields(request: RequestParts) {
        let request = request
            .with_body(ContextValue::Map(context([("sku", "A-1".into())])))
            .with_query(context([("draft", "true".into())]))
            .with_params(context([("id", 7.into())]));
        let ctx = RequestContext::extract(&request);
        assert_eq!(
            ctx.body,
            Some(ContextValue::Map(context([("sku", "A-1".into())])))
        );
        assert_eq!(
            ctx.query,
            Some(ContextValue::Map(context([("draft", "true".into())])))
        );
        assert_eq!(ctx.params, Some(ContextValue::Map(context([("id", 7.into())]))));
    }

    #[rstest]
    fn replaces_oversized_fields_independently(request: RequestParts) {
        let request = request
            .with_body("x".repeat(FIELD_CEILING + 1))
            .with_params(context([("id", 7.into())]));
        let ctx = RequestContext::extract(&request);
        assert_eq!(ctx.body, Some(ContextValue::from(FIELD_PLACEHOLDER)));
        assert_eq!(ctx.params, Some(ContextValue::Map(context([("id", 7.into())]))));
    }

    #[rstest]
    fn oversized_query_does_not_touch_body(request: RequestParts) {
        let request = request
            .with_body("small")
            .with_query(context([("q", "y".repeat(FIELD_CEILING).into())]));
        let ctx = RequestContext::extract(&request);
        assert_eq!(ctx.query, Some(ContextValue::from(FIELD_PLACEHOLDER)));
        assert_eq!(ctx.body, Some(ContextValue::from("small")));
    }

    #[rstest]
    fn field_at_ceiling_is_kept() {
        // Two quote characters plus 498 payload characters.
        let body = "z".repeat(FIELD_CEILING - 2);
        let request = RequestParts::new("POST", "/").with_body(body.clone());
        let ctx = RequestContext::extract(&request);
        assert_eq!(ctx.body, Some(ContextValue::from(body)));
    }

    #[rstest]
    fn missing_fields_are_omitted() {
        let ctx = RequestContext::extract(&RequestParts::new("GET", "/health")).into_context();
        assert_eq!(
            ctx.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["destination"]
        );
    }

    #[rstest]
    fn into_context_includes_user_and_client(request: RequestParts) {
        let request = request.with_principal(ContextValue::Map(context([("id", "u_1".into())])));
        let ctx = RequestContext::extract(&request).into_context();
        assert_eq!(ctx["user"], ContextValue::Map(context([("id", "u_1".into())])));
        let ContextValue::Map(client) = &ctx["clientInfo"] else {
            panic!("clientInfo should be a map");
        };
        assert_eq!(client["ua"], ContextValue::from("curl/8.4.0"));
    }
}
