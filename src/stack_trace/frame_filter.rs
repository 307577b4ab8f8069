//! Frame filtering for native stack traces.
//!
//! Native backtraces start inside the capture machinery and end inside the
//! Rust runtime's start-up code. Neither is useful in an error report, so the
//! normalizer strips them with the helpers here.

use super::StackFrame;

/// Function patterns identifying the frames that perform the capture itself.
///
/// Only a leading run of matching frames is dropped; see
/// [`skip_capture_frames`].
pub const CAPTURE_FRAME_PATTERNS: &[&str] = &[
    "backtrace::",
    "CapturedTrace::capture",
    "ReportedError",
];

/// Function patterns identifying runtime start-up and unwinding frames.
pub const RUNTIME_FRAME_PATTERNS: &[&str] = &[
    "std::rt::lang_start",
    "std::sys::backtrace::__rust_begin_short_backtrace",
    "std::sys_common::backtrace::__rust_begin_short_backtrace",
    "std::panicking::try",
    "std::panicking::catch_unwind",
    "std::panic::catch_unwind",
    "__rust_try",
    "__libc_start_main",
    "__libc_start_call_main",
    "start_thread",
    "BaseThreadInitThunk",
    "RtlUserThreadStart",
];

/// Maximum number of frames kept in a normalized trace.
pub const MAX_FRAMES: usize = 64;

/// Keep only frames for which `predicate` returns `true`.
pub fn filter_frames<F>(frames: &[StackFrame], predicate: F) -> Vec<StackFrame>
where
    F: Fn(&StackFrame) -> bool,
{
    frames.iter().filter(|f| predicate(f)).cloned().collect()
}

/// Keep the `n` innermost frames.
///
/// Frames are ordered innermost first, so this keeps the head of the list.
pub fn limit_frames(frames: &[StackFrame], n: usize) -> Vec<StackFrame> {
    frames.iter().take(n).cloned().collect()
}

fn matches_any_pattern(function: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| function.contains(p))
}

/// Exclude frames whose function name contains any of `patterns`.
///
/// ```rust
/// use logtree::stack_trace::{StackFrame, exclude_by_function};
///
/// let frames = vec![
///     StackFrame::new("src/main.rs", 10, "app::main"),
///     StackFrame::new("", 0, "std::rt::lang_start_internal"),
/// ];
/// let filtered = exclude_by_function(&frames, &["std::rt::"]);
/// assert_eq!(filtered.len(), 1);
/// ```
pub fn exclude_by_function(frames: &[StackFrame], patterns: &[&str]) -> Vec<StackFrame> {
    filter_frames(frames, |f| !matches_any_pattern(&f.function, patterns))
}

/// Drop the leading frames that belong to trace capture.
///
/// Matching frames deeper in the trace are kept: an application function
/// that happens to match a pattern is still part of the error's history.
pub fn skip_capture_frames(frames: &[StackFrame]) -> Vec<StackFrame> {
    frames
        .iter()
        .skip_while(|f| matches_any_pattern(&f.function, CAPTURE_FRAME_PATTERNS))
        .cloned()
        .collect()
}
