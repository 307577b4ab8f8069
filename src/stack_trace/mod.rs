//! Stack trace capture and normalization for error reports.
//!
//! Capturing a trace is split in two so the expensive half stays off the
//! caller's thread:
//!
//! 1. [`CapturedTrace::capture`] records raw instruction pointers when a
//!    [`ReportedError`](crate::ReportedError) is built.
//! 2. [`normalize`] runs on a delivery worker, resolves symbols, drops the
//!    library's own capture frames and runtime start-up frames, and yields a
//!    [`StackTrace`] ordered innermost call first.
//!
//! A trace that normalizes to zero frames is an error. It is handled by the
//! same guard as a failed HTTP request: logged or discarded, never raised.

mod frame_filter;


use std::fmt;

use backtrace::{Backtrace, BacktraceSymbol};
use thiserror::Error;

pub use frame_filter::{
    CAPTURE_FRAME_PATTERNS, MAX_FRAMES, RUNTIME_FRAME_PATTERNS, exclude_by_function,
    filter_frames, limit_frames, skip_capture_frames,
};

/// Placeholder used when a frame has no resolvable symbol name.
pub const UNKNOWN_FUNCTION: &str = "<unknown>";

/// A single frame of a stack trace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackFrame {
    /// Source file, empty when debug info is unavailable.
    pub filename: String,
    /// Line number in `filename`, zero when unknown.
    pub lineno: u32,
    /// Demangled function path without the symbol hash.
    pub function: String,
}

impl StackFrame {
    pub fn new(filename: impl Into<String>, lineno: u32, function: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            lineno,
            function: function.into(),
        }
    }

    fn has_location(&self) -> bool {
        !self.filename.is_empty()
    }

    fn from_symbol(symbol: &BacktraceSymbol) -> Self {
        Self {
            filename: symbol
                .filename()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
            lineno: symbol.lineno().unwrap_or_default(),
            function: symbol
                .name()
                .map(|name| format!("{name:#}"))
                .unwrap_or_else(|| UNKNOWN_FUNCTION.to_owned()),
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_location() {
            write!(f, "{} ({}:{})", self.function, self.filename, self.lineno)
        } else {
            f.write_str(&self.function)
        }
    }
}

/// Raw trace attached to a reported error, not yet normalized.
#[derive(Debug)]
pub enum CapturedTrace {
    /// Unresolved native backtrace of the reporting thread.
    Native(Backtrace),
    /// Frames supplied by the caller, e.g. from a foreign runtime.
    Frames(Vec<StackFrame>),
}

impl CapturedTrace {
    /// Record the current call stack without resolving symbols.
    #[inline(never)]
    pub fn capture() -> Self {
        Self::Native(Backtrace::new_unresolved())
    }
}

/// Errors raised while normalizing a captured trace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackTraceError {
    /// Every frame was unresolvable or filtered out.
    #[error("stack trace contained no usable frames")]
    Empty,
}

/// Ordered, immutable sequence of frames, innermost call first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackTrace {
    frames: Vec<StackFrame>,
}

impl StackTrace {
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Frames joined with newlines, one descriptor per line.
    pub fn render(&self) -> String {
        self.frames
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Line number of the topmost frame that has one.
    pub fn origin_line(&self) -> Option<u32> {
        self.frames
            .iter()
            .find(|frame| frame.has_location() && frame.lineno > 0)
            .map(|frame| frame.lineno)
    }
}

/// Resolve and filter a captured trace.
///
/// # Errors
///
/// Returns [`StackTraceError::Empty`] when no frame survives resolution and
/// filtering.
pub fn normalize(trace: CapturedTrace) -> Result<StackTrace, StackTraceError> {
    let frames = match trace {
        CapturedTrace::Frames(frames) => frames,
        CapturedTrace::Native(mut backtrace) => {
            backtrace.resolve();
            let resolved: Vec<StackFrame> = backtrace
                .frames()
                .iter()
                .flat_map(|frame| frame.symbols().iter().map(StackFrame::from_symbol))
                .filter(|frame| frame.has_location() || frame.function != UNKNOWN_FUNCTION)
                .collect();
            let app_frames = skip_capture_frames(&resolved);
            exclude_by_function(&app_frames, RUNTIME_FRAME_PATTERNS)
        }
    };
    let frames = limit_frames(&frames, MAX_FRAMES);
    if frames.is_empty() {
        return Err(StackTraceError::Empty);
    }
    Ok(StackTrace { frames })
}
