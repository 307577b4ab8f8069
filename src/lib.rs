//! Fire-and-forget client for the Logtree logging service.
//!
//! The client captures events, debug messages and error reports, enriches
//! them with request context, stack traces and caller-supplied metadata, and
//! delivers them over HTTP on background worker threads. Sends never block on
//! the network and never fail: delivery problems are written to the [`log`]
//! facade when error logging is enabled and discarded otherwise.
//!
//! ```rust,no_run
//! use logtree::{ErrorReport, Event, Logtree, ReportedError, RequestParts, context};
//!
//! let logtree = Logtree::new("pk_live_123", "sk_live_456", true);
//! let request = RequestParts::new("POST", "/checkout")
//!     .with_header("User-Agent", "Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0");
//!
//! logtree.send_event(
//!     Event::new("checkout started", "/checkout")
//!         .reference_id("ada@example.com")
//!         .request(&request)
//!         .context(context([("cart_items", 3.into())])),
//! );
//! logtree.send_debug_log("cart recalculated", Some(&request));
//! logtree
//!     .send_error(ErrorReport::new(ReportedError::new("card declined")).request(&request))
//!     .wait();
//! ```

mod additional_context;
mod assembler;
mod client;
mod client_info;
mod config;
mod delivery;
#[cfg(feature = "http-compat")]
mod http_compat;
mod payload;
mod rate_limited_warner;
mod reported_error;
mod request;
mod request_context;
mod route;
pub mod stack_trace;
#[cfg(any(test, feature = "test-util"))]
#[doc(hidden)]
pub mod test_utils;

pub use additional_context::{AdditionalContext, ContextValue, context, serialized_len};
pub use assembler::{
    CONTEXT_CEILING, ErrorReport, Event, LINE_NUMBER_KEY, OVERSIZED_CONTEXT_KEY,
    OVERSIZED_CONTEXT_NOTE, STACKTRACE_KEY, merge_context,
};
pub use client::Logtree;
pub use client_info::{ClientInfo, Component, Device, RulesError, init_parser};
pub use config::{
    ConfigError, Credentials, DEFAULT_BASE_URL, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WORKERS, LogtreeConfig,
};
pub use delivery::{Delivery, DeliveryError, KEY_HEADER, SECRET_HEADER, classify_status};
#[cfg(feature = "http-compat")]
pub use http_compat::{Principal, RouteParams, decode_query};
pub use payload::{Channel, DEBUG_FOLDER, ERROR_FOLDER, EventPayload, Outgoing, TrackPayload};
pub use rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner};
pub use reported_error::{ErrorKind, ReportedError};
pub use request::{InboundRequest, RequestParts};
pub use request_context::{FIELD_CEILING, FIELD_PLACEHOLDER, RequestContext};
pub use route::{ConnectionTracker, DEFAULT_ERROR_CODE, RouteTracker};
