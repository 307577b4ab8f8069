//! Fire-and-forget delivery of assembled payloads.
//!
//! Sends hand an owned [`Job`] to a bounded channel drained by a small pool of
//! worker threads that share one `ureq::Agent`. The hand-off never blocks:
//! when the queue is full the payload is dropped and a rate-limited warning is
//! emitted. Workers perform exactly one attempt per payload; every failure is
//! logged (when enabled) and discarded.

mod handle;
mod worker;

#[cfg(test)]
mod tests;

pub use handle::Delivery;
pub use worker::{DeliveryError, KEY_HEADER, SECRET_HEADER, classify_status};

pub(crate) use worker::{Dispatcher, Job};
