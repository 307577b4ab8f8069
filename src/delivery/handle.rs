//! Completion handle returned by every send.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

/// Tracks whether a send has finished.
///
/// Dropping the handle is the fire-and-forget path. Waiting only reports that
/// the attempt is over; a payload that failed to deliver, or was dropped
/// before reaching a worker, completes just like one that succeeded.
#[derive(Debug)]
pub struct Delivery {
    ack: Option<Receiver<()>>,
}

impl Delivery {
    pub(crate) fn pending(ack: Receiver<()>) -> Self {
        Self { ack: Some(ack) }
    }

    /// A handle for a send that never reached a worker.
    pub(crate) fn completed() -> Self {
        Self { ack: None }
    }

    /// Block until the attempt has finished.
    pub fn wait(self) {
        if let Some(ack) = self.ack {
            // A disconnect means the worker finished without acknowledging.
            let _ = ack.recv();
        }
    }

    /// Block for at most `timeout`; returns `true` if the attempt finished.
    pub fn wait_timeout(self, timeout: Duration) -> bool {
        let Some(ack) = self.ack else {
            return true;
        };
        match ack.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}
