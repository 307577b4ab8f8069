//! Route-call tracking for HTTP servers.
//!
//! The tracker hooks into a server's connection lifecycle rather than a
//! per-route middleware chain: call [`RouteTracker::on_request`] when a request
//! arrives and keep the returned [`ConnectionTracker`] until the connection
//! finishes. Tracking payloads go to `POST /track` and never block or fail the
//! request being served.

use crate::{
    client::Logtree,
    delivery::{Delivery, Job},
    payload::{Outgoing, TrackPayload},
    request::InboundRequest,
};

/// Status reported when a connection errors before a status was set.
pub const DEFAULT_ERROR_CODE: u16 = 500;

/// Emits route-call payloads for inbound requests.
#[derive(Clone, Debug)]
pub struct RouteTracker {
    client: Logtree,
}

impl RouteTracker {
    pub(crate) fn new(client: Logtree) -> Self {
        Self { client }
    }

    /// Record that `request` arrived.
    pub fn on_request(&self, request: &dyn InboundRequest) -> ConnectionTracker {
        let connection = ConnectionTracker {
            client: self.client.clone(),
            path: request.path().to_owned(),
        };
        connection.track(None);
        connection
    }

    /// Record `request`, then run `next` and return its result unchanged.
    ///
    /// ```rust,no_run
    /// use logtree::{Logtree, RequestParts};
    ///
    /// let tracker = Logtree::new("pk", "sk", false).route_tracker();
    /// let request = RequestParts::new("GET", "/health");
    /// let status = tracker.middleware(&request, || 200);
    /// assert_eq!(status, 200);
    /// ```
    pub fn middleware<T>(&self, request: &dyn InboundRequest, next: impl FnOnce() -> T) -> T {
        self.on_request(request);
        next()
    }
}

/// Per-connection handle used to report a failed connection.
#[derive(Clone, Debug)]
pub struct ConnectionTracker {
    client: Logtree,
    path: String,
}

impl ConnectionTracker {
    /// Path reported for this connection, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Report that the connection errored with the response status, if one
    /// was set. Falls back to [`DEFAULT_ERROR_CODE`].
    pub fn on_error(&self, status: Option<u16>) -> Delivery {
        self.track(Some(status.unwrap_or(DEFAULT_ERROR_CODE)))
    }

    fn track(&self, error_code: Option<u16>) -> Delivery {
        self.client
            .dispatch(Job::Ready(Outgoing::Track(TrackPayload {
                path: self.path.clone(),
                error_code,
            })))
    }
}
