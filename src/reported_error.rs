//! Error values accepted by [`Logtree::send_error`](crate::Logtree::send_error).
//!
//! A [`ReportedError`] pairs an [`ErrorKind`] with the stack captured when it
//! was built. The kind decides what becomes the record's `content`: a plain
//! error reports its message, while a transport error reports the body the
//! remote server answered with, since that usually explains the failure better
//! than the client-side message.

use std::error::Error;
use std::fmt;

use crate::additional_context::ContextValue;
use crate::stack_trace::{CapturedTrace, StackFrame};

/// What kind of failure is being reported.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorKind {
    /// An application error described by its message.
    Plain { message: String },
    /// An HTTP client error carrying the server's response body.
    Transport {
        message: String,
        response_body: ContextValue,
    },
}

/// An error together with the stack it was raised on.
#[derive(Debug)]
pub struct ReportedError {
    kind: ErrorKind,
    trace: CapturedTrace,
}

impl ReportedError {
    /// Report a plain error message, capturing the current stack.
    #[inline(never)]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Plain {
                message: message.into(),
            },
            trace: CapturedTrace::capture(),
        }
    }

    /// Report a transport failure whose server response explains the error.
    #[inline(never)]
    pub fn transport(message: impl Into<String>, response_body: impl Into<ContextValue>) -> Self {
        Self {
            kind: ErrorKind::Transport {
                message: message.into(),
                response_body: response_body.into(),
            },
            trace: CapturedTrace::capture(),
        }
    }

    /// Report any [`std::error::Error`], appending its `source()` chain to the
    /// message as `outer: inner: root`.
    #[inline(never)]
    pub fn from_error<E: Error + ?Sized>(err: &E) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(message)
    }

    /// Replace the captured stack with frames obtained elsewhere.
    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.trace = CapturedTrace::Frames(frames);
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The text sent as the record's `content`.
    ///
    /// Plain errors yield their message. Transport errors yield the response
    /// body, verbatim when it is a string and JSON-serialized otherwise.
    pub fn content(&self) -> String {
        match &self.kind {
            ErrorKind::Plain { message } => message.clone(),
            ErrorKind::Transport {
                response_body: ContextValue::String(body),
                ..
            } => body.clone(),
            ErrorKind::Transport {
                message,
                response_body,
            } => serde_json::to_string(response_body).unwrap_or_else(|_| message.clone()),
        }
    }

    pub(crate) fn into_trace(self) -> CapturedTrace {
        self.trace
    }
}

impl fmt::Display for ReportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Plain { message } | ErrorKind::Transport { message, .. } => {
                f.write_str(message)
            }
        }
    }
}

impl From<ureq::Error> for ReportedError {
    /// Status errors with a non-empty body become transport errors; the body
    /// is parsed as JSON when possible. Everything else is a plain error.
    #[inline(never)]
    fn from(err: ureq::Error) -> Self {
        let message = err.to_string();
        let body = match err {
            ureq::Error::Status(_, response) => response.into_string().ok(),
            ureq::Error::Transport(_) => None,
        };
        match body.filter(|b| !b.trim().is_empty()) {
            Some(text) => {
                let parsed = serde_json::from_str(&text)
                    .ok()
                    .and_then(ContextValue::from_json)
                    .unwrap_or(ContextValue::String(text));
                Self::transport(message, parsed)
            }
            None => Self::new(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::additional_context::context;
    use rstest::rstest;
    use std::io;

    #[rstest]
    fn plain_error_reports_message() {
        let err = ReportedError::new("boom");
        assert_eq!(err.content(), "boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[rstest]
    fn transport_error_prefers_string_body() {
        let err = ReportedError::transport("status code 502", "upstream timed out");
        assert_eq!(err.content(), "upstream timed out");
        assert_eq!(err.to_string(), "status code 502");
    }

    #[rstest]
    fn transport_error_serializes_structured_body() {
        let body = ContextValue::Map(context([("error", "card_declined".into())]));
        let err = ReportedError::transport("status code 402", body);
        assert_eq!(err.content(), r#"{"error":"card_declined"}"#);
    }

    #[derive(Debug)]
    struct Wrapped(io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("loading settings failed")
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[rstest]
    fn from_error_includes_source_chain() {
        let err = Wrapped(io::Error::new(io::ErrorKind::NotFound, "settings.ini missing"));
        let reported = ReportedError::from_error(&err);
        assert_eq!(
            reported.content(),
            "loading settings failed: settings.ini missing"
        );
        assert!(matches!(reported.kind(), ErrorKind::Plain { .. }));
    }

    #[rstest]
    fn with_frames_replaces_native_trace() {
        let frames = vec![StackFrame::new("app.js", 12, "handler")];
        let reported = ReportedError::new("boom").with_frames(frames.clone());
        assert!(matches!(reported.into_trace(), CapturedTrace::Frames(f) if f == frames));
    }
}
