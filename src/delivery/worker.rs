//! Worker threads driving HTTP I/O.
//!
//! Every worker clones the same `ureq::Agent`, so connections are pooled across
//! the whole client. Jobs are attempted once; there is no retry.

use std::{sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, warn};
use native_tls::TlsConnector;
use thiserror::Error;
use ureq::{Agent, AgentBuilder};

use crate::{
    assembler::PendingError,
    config::{Credentials, LogtreeConfig},
    payload::{Channel, Outgoing},
    rate_limited_warner::RateLimitedWarner,
    stack_trace::StackTraceError,
};

use super::handle::Delivery;

/// Header carrying the publishable API key.
pub const KEY_HEADER: &str = "x-logtree-key";
/// Header carrying the secret key.
pub const SECRET_HEADER: &str = "authorization";

/// Reasons a single delivery attempt failed.
///
/// These never reach the caller: the worker logs them when error logging is
/// enabled and discards them otherwise.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to build stack trace: {0}")]
    StackTrace(#[from] StackTraceError),
    #[error("server responded with status {code}")]
    Status { code: u16 },
    #[error("transport error: {0}")]
    Transport(#[source] Box<ureq::Transport>),
}

/// Unit of work handed to the delivery workers.
#[derive(Debug)]
pub(crate) enum Job {
    /// A payload ready to serialize.
    Ready(Outgoing),
    /// An error report whose stack trace still needs resolving.
    Error(PendingError),
}

struct Envelope {
    job: Job,
    ack: Sender<()>,
}

/// Maps a response status to the outcome of the attempt. Only 2xx succeeds.
pub fn classify_status(status: u16) -> Result<(), DeliveryError> {
    match status {
        200..=299 => Ok(()),
        code => Err(DeliveryError::Status { code }),
    }
}

#[derive(Clone)]
struct Worker {
    agent: Agent,
    credentials: Credentials,
    logs_url: String,
    track_url: String,
    should_log_errors: bool,
}

impl Worker {
    fn new(config: &LogtreeConfig) -> Self {
        let mut builder = AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout(config.request_timeout);
        match TlsConnector::new() {
            Ok(connector) => builder = builder.tls_connector(Arc::new(connector)),
            Err(err) => {
                if config.should_log_errors {
                    warn!("Logtree native TLS unavailable, using bundled TLS: {err}");
                }
            }
        }
        let agent = builder.build();
        Self {
            agent,
            credentials: config.credentials.clone(),
            logs_url: config.endpoint(Channel::Logs.path()),
            track_url: config.endpoint(Channel::Track.path()),
            should_log_errors: config.should_log_errors,
        }
    }

    fn run(self, rx: Receiver<Envelope>) {
        // Ends once every sender is gone and the queue is drained.
        for Envelope { job, ack } in rx.iter() {
            if let Err(err) = self.deliver(job) {
                if self.should_log_errors {
                    warn!("Logtree delivery failed: {err}");
                }
            }
            let _ = ack.send(());
        }
    }

    fn deliver(&self, job: Job) -> Result<(), DeliveryError> {
        let outgoing = match job {
            Job::Ready(outgoing) => outgoing,
            Job::Error(pending) => Outgoing::Event(pending.finish()?),
        };
        let body = outgoing.to_json()?;
        let url = match outgoing.channel() {
            Channel::Logs => &self.logs_url,
            Channel::Track => &self.track_url,
        };
        self.post(url, &body)?;
        if self.should_log_errors {
            debug!("Logtree delivered payload to {url}");
        }
        Ok(())
    }

    fn post(&self, url: &str, body: &str) -> Result<(), DeliveryError> {
        let result = self
            .agent
            .post(url)
            .set(KEY_HEADER, self.credentials.publishable_api_key())
            .set(SECRET_HEADER, self.credentials.secret_key())
            .set("Content-Type", "application/json")
            .send_string(body);
        match result {
            Ok(response) => classify_status(response.status()),
            Err(ureq::Error::Status(code, _)) => classify_status(code),
            Err(ureq::Error::Transport(transport)) => {
                Err(DeliveryError::Transport(Box::new(transport)))
            }
        }
    }
}

/// Owns the job queue and the worker pool.
///
/// Dropping the dispatcher closes the queue, lets the workers finish whatever
/// was already accepted and joins them.
pub(crate) struct Dispatcher {
    tx: Option<Sender<Envelope>>,
    workers: Vec<thread::JoinHandle<()>>,
    warner: RateLimitedWarner,
    should_log_errors: bool,
}

impl Dispatcher {
    /// Spawn the worker pool described by `config`.
    ///
    /// A worker that fails to spawn is skipped. With no workers at all every
    /// send is dropped.
    pub(crate) fn spawn(config: &LogtreeConfig) -> Self {
        let (tx, rx) = bounded(config.capacity);
        let worker = Worker::new(config);
        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let (worker, rx) = (worker.clone(), rx.clone());
            match thread::Builder::new()
                .name(format!("logtree-delivery-{index}"))
                .spawn(move || worker.run(rx))
            {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    if config.should_log_errors {
                        warn!("Logtree failed to spawn delivery worker: {err}");
                    }
                }
            }
        }
        Self {
            tx: (!workers.is_empty()).then_some(tx),
            workers,
            warner: RateLimitedWarner::new(config.warn_interval),
            should_log_errors: config.should_log_errors,
        }
    }

    /// Hand `job` to the workers without blocking.
    pub(crate) fn dispatch(&self, job: Job) -> Delivery {
        let Some(tx) = &self.tx else {
            self.record_drop("no delivery workers are running");
            return Delivery::completed();
        };
        let (ack_tx, ack_rx) = bounded(1);
        match tx.try_send(Envelope { job, ack: ack_tx }) {
            Ok(()) => Delivery::pending(ack_rx),
            Err(TrySendError::Full(_)) => {
                self.record_drop("delivery queue full");
                Delivery::completed()
            }
            Err(TrySendError::Disconnected(_)) => {
                self.record_drop("delivery workers have stopped");
                Delivery::completed()
            }
        }
    }

    fn record_drop(&self, reason: &str) {
        self.warner.record_drop();
        let enabled = self.should_log_errors;
        self.warner.warn_if_due(|count| {
            if enabled {
                warn!("Logtree {reason}; dropped {count} payloads");
            }
        });
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let enabled = self.should_log_errors;
        self.warner.flush(|count| {
            if enabled {
                warn!("Logtree dropped {count} payloads in the last interval");
            }
        });
        self.tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() && enabled {
                warn!("Logtree delivery worker panicked");
            }
        }
    }
}
