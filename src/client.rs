//! Public client handle.

use std::fmt;
use std::sync::Arc;

use crate::{
    assembler::{self, ErrorReport, Event},
    config::{ConfigError, LogtreeConfig},
    delivery::{Delivery, Dispatcher, Job},
    payload::Outgoing,
    request::InboundRequest,
    route::RouteTracker,
};

/// Client for the Logtree service.
///
/// Every send assembles its payload on the calling thread, hands it to a
/// delivery worker and returns immediately. Failures never reach the caller:
/// they are written to the `log` facade when error logging is enabled and
/// discarded otherwise.
///
/// The handle is cheap to clone; clones share one worker pool. Dropping the
/// last clone waits for already accepted payloads and stops the workers.
///
/// ```rust,no_run
/// use logtree::{Event, Logtree, ReportedError};
///
/// let logtree = Logtree::new("pk_live_123", "sk_live_456", true);
/// logtree.send_event(Event::new("user signed up", "/new-users").reference_id("ada@example.com"));
/// logtree.send_error(ReportedError::new("payment provider unreachable"));
/// ```
#[derive(Clone)]
pub struct Logtree {
    inner: Arc<Inner>,
}

struct Inner {
    config: LogtreeConfig,
    dispatcher: Dispatcher,
}

impl Logtree {
    /// Create a client with default settings for the given credentials.
    pub fn new(
        publishable_api_key: impl Into<String>,
        secret_key: impl Into<String>,
        should_log_errors: bool,
    ) -> Self {
        let config = LogtreeConfig::new(publishable_api_key, secret_key)
            .with_should_log_errors(should_log_errors);
        Self::spawn(config)
    }

    /// Create a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`LogtreeConfig::validate`].
    pub fn with_config(config: LogtreeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::spawn(config))
    }

    fn spawn(config: LogtreeConfig) -> Self {
        let dispatcher = Dispatcher::spawn(&config);
        Self {
            inner: Arc::new(Inner { config, dispatcher }),
        }
    }

    pub fn config(&self) -> &LogtreeConfig {
        &self.inner.config
    }

    pub fn should_log_errors(&self) -> bool {
        self.inner.config.should_log_errors
    }

    /// Send a structured event to `POST /logs`.
    pub fn send_event(&self, event: Event<'_>) -> Delivery {
        self.dispatch(Job::Ready(Outgoing::Event(event.assemble())))
    }

    /// Alias of [`send_event`](Self::send_event).
    pub fn send_log(&self, event: Event<'_>) -> Delivery {
        self.send_event(event)
    }

    /// Send a debug message filed under `/debugging`.
    ///
    /// Only request-derived context is attached; without a request the
    /// record carries no `additionalContext`.
    pub fn send_debug_log(
        &self,
        content: impl Into<String>,
        request: Option<&dyn InboundRequest>,
    ) -> Delivery {
        self.dispatch(Job::Ready(Outgoing::Event(assembler::debug_payload(
            content, request,
        ))))
    }

    /// Send an error report filed under `/errors`.
    ///
    /// Accepts an [`ErrorReport`] or a bare [`ReportedError`](crate::ReportedError).
    /// The stack trace is resolved on the delivery worker.
    pub fn send_error<'r>(&self, report: impl Into<ErrorReport<'r>>) -> Delivery {
        self.dispatch(Job::Error(report.into().assemble()))
    }

    /// Tracker emitting route-call payloads through this client.
    pub fn route_tracker(&self) -> RouteTracker {
        RouteTracker::new(self.clone())
    }

    pub(crate) fn dispatch(&self, job: Job) -> Delivery {
        self.inner.dispatcher.dispatch(job)
    }
}

impl fmt::Debug for Logtree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logtree")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
