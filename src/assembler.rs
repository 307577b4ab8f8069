//! Payload assembly for the event, debug and error channels.
//!
//! Request context is extracted on the caller's thread because the request is
//! only borrowed. Everything after that is owned: [`Event`] and
//! [`ErrorReport`] turn into values that can move to a delivery worker.
//!
//! # Merge rules
//!
//! 1. Caller context whose JSON form is shorter than [`CONTEXT_CEILING`] is
//!    kept; otherwise it is replaced by a single [`OVERSIZED_CONTEXT_KEY`]
//!    note.
//! 2. Request-derived fields are written over the caller's, so they win on
//!    key collision.
//! 3. Error reports then add [`STACKTRACE_KEY`] (and [`LINE_NUMBER_KEY`] when
//!    known). These are exempt from the ceiling.

use crate::additional_context::{AdditionalContext, ContextValue, serialized_len};
use crate::payload::{DEBUG_FOLDER, ERROR_FOLDER, EventPayload};
use crate::reported_error::ReportedError;
use crate::request::InboundRequest;
use crate::request_context::RequestContext;
use crate::stack_trace::{self, CapturedTrace, StackTraceError};

/// Caller context at or above this many serialized characters is replaced.
pub const CONTEXT_CEILING: usize = 1700;
/// Key of the note that replaces oversized caller context.
pub const OVERSIZED_CONTEXT_KEY: &str = "note";
/// Text of the note that replaces oversized caller context.
pub const OVERSIZED_CONTEXT_NOTE: &str =
    "additionalContext was too large to log (1700 characters or more)";
/// Key holding the rendered stack trace of an error report.
pub const STACKTRACE_KEY: &str = "stacktrace";
/// Key holding the origin line of an error report's stack trace.
pub const LINE_NUMBER_KEY: &str = "lineNumber";

/// Merge caller-supplied context with request-derived context.
///
/// Returns `None` when neither source contributes anything.
pub fn merge_context(
    caller: Option<AdditionalContext>,
    request: Option<RequestContext>,
) -> Option<AdditionalContext> {
    let mut merged = match caller {
        Some(ctx) if serialized_len(&ctx) < CONTEXT_CEILING => ctx,
        Some(_) => AdditionalContext::from([(
            OVERSIZED_CONTEXT_KEY.to_owned(),
            ContextValue::from(OVERSIZED_CONTEXT_NOTE),
        )]),
        None => AdditionalContext::new(),
    };
    if let Some(request) = request {
        merged.extend(request.into_context());
    }
    (!merged.is_empty()).then_some(merged)
}

fn extract(request: Option<&dyn InboundRequest>) -> Option<RequestContext> {
    request.map(RequestContext::extract)
}

/// A general-purpose structured log record.
///
/// ```rust
/// use logtree::{Event, RequestParts, context};
///
/// let request = RequestParts::new("POST", "/signup");
/// let event = Event::new("user signed up", "/new-users")
///     .reference_id("ada@example.com")
///     .request(&request)
///     .context(context([("plan", "pro".into())]));
/// # let _ = event;
/// ```
#[derive(Clone)]
pub struct Event<'r> {
    content: String,
    folder_path: String,
    reference_id: Option<String>,
    external_link: Option<String>,
    request: Option<&'r dyn InboundRequest>,
    context: Option<AdditionalContext>,
}

impl<'r> Event<'r> {
    /// `folder_path` must start with `/` and contain no spaces; it is passed
    /// through unchanged.
    pub fn new(content: impl Into<String>, folder_path: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            folder_path: folder_path.into(),
            reference_id: None,
            external_link: None,
            request: None,
            context: None,
        }
    }

    /// Correlation key for later search, typically a user's email.
    pub fn reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    /// Link shown alongside the record in the Logtree UI.
    pub fn external_link(mut self, external_link: impl Into<String>) -> Self {
        self.external_link = Some(external_link.into());
        self
    }

    pub fn request(mut self, request: &'r dyn InboundRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn context(mut self, context: AdditionalContext) -> Self {
        self.context = Some(context);
        self
    }

    pub(crate) fn assemble(self) -> EventPayload {
        EventPayload {
            content: self.content,
            folder_path: self.folder_path,
            reference_id: self.reference_id,
            external_link: self.external_link,
            additional_context: merge_context(self.context, extract(self.request)),
        }
    }
}

/// Assemble a `/debugging` record; only request-derived context is attached.
pub(crate) fn debug_payload(
    content: impl Into<String>,
    request: Option<&dyn InboundRequest>,
) -> EventPayload {
    EventPayload {
        content: content.into(),
        folder_path: DEBUG_FOLDER.to_owned(),
        reference_id: None,
        external_link: None,
        additional_context: merge_context(None, extract(request)),
    }
}

/// An error report filed under `/errors`.
pub struct ErrorReport<'r> {
    error: ReportedError,
    reference_id: Option<String>,
    request: Option<&'r dyn InboundRequest>,
    context: Option<AdditionalContext>,
}

impl<'r> ErrorReport<'r> {
    pub fn new(error: ReportedError) -> Self {
        Self {
            error,
            reference_id: None,
            request: None,
            context: None,
        }
    }

    pub fn reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn request(mut self, request: &'r dyn InboundRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn context(mut self, context: AdditionalContext) -> Self {
        self.context = Some(context);
        self
    }

    pub(crate) fn assemble(self) -> PendingError {
        let payload = EventPayload {
            content: self.error.content(),
            folder_path: ERROR_FOLDER.to_owned(),
            reference_id: self.reference_id,
            external_link: None,
            additional_context: merge_context(self.context, extract(self.request)),
        };
        PendingError {
            payload,
            trace: self.error.into_trace(),
        }
    }
}

impl From<ReportedError> for ErrorReport<'_> {
    fn from(error: ReportedError) -> Self {
        Self::new(error)
    }
}

/// An error payload still waiting for its stack trace.
#[derive(Debug)]
pub(crate) struct PendingError {
    payload: EventPayload,
    trace: CapturedTrace,
}

impl PendingError {
    /// Normalize the trace and attach it to the payload.
    pub(crate) fn finish(self) -> Result<EventPayload, StackTraceError> {
        let trace = stack_trace::normalize(self.trace)?;
        let mut payload = self.payload;
        let context = payload.additional_context.get_or_insert_with(Default::default);
        context.insert(STACKTRACE_KEY.to_owned(), trace.render().into());
        if let Some(line) = trace.origin_line() {
            context.insert(LINE_NUMBER_KEY.to_owned(), line.into());
        }
        Ok(payload)
    }
}
