//! Wire records sent to the Logtree service.

use serde::Serialize;

use crate::additional_context::AdditionalContext;

/// Folder every debug log is filed under.
pub const DEBUG_FOLDER: &str = "/debugging";
/// Folder every error report is filed under.
pub const ERROR_FOLDER: &str = "/errors";

/// Remote endpoint a payload is submitted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    /// Events, debug logs and errors: `POST /logs`.
    Logs,
    /// Route tracking: `POST /track`.
    Track,
}

impl Channel {
    /// Path appended to the configured base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Logs => "/logs",
            Self::Track => "/track",
        }
    }
}

/// Body of `POST /logs`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub content: String,
    /// Slash-delimited category, e.g. `/billing/refunds`.
    pub folder_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<AdditionalContext>,
}

/// Body of `POST /track`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
}

/// A fully assembled payload and the endpoint it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub enum Outgoing {
    Event(EventPayload),
    Track(TrackPayload),
}

impl Outgoing {
    pub fn channel(&self) -> Channel {
        match self {
            Self::Event(_) => Channel::Logs,
            Self::Track(_) => Channel::Track,
        }
    }

    /// Serialize the payload as the JSON request body.
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Self::Event(event) => serde_json::to_string(event),
            Self::Track(track) => serde_json::to_string(track),
        }
    }
}
