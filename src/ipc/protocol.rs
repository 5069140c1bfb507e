//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.
//! After a successful `Subscribe`, the connection becomes a one-way push
//! stream of `Notification` messages; the client sends nothing further.

use serde::{Deserialize, Serialize};

use crate::events::UiEvent;

/// Requests from UI clients to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request the current accumulation status
    GetStatus,

    /// Reset accumulated text, counters, and the predicted word
    Clear,

    /// Subscribe to display event notifications
    Subscribe,
}

/// Responses from daemon to UI clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current accumulation status
    Status(DaemonStatus),

    /// Request accepted
    Ack,

    /// Subscription confirmed; notifications follow
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification for subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A display event occurred
    Event(UiEvent),
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    /// Trimmed accumulated letters
    pub accumulated_text: String,

    /// Letters captured since the last submission or clear
    pub captured_count: usize,

    /// Whether the low-confidence indicator is currently shown
    pub low_confidence: bool,

    /// Most recent predicted word, if any
    pub predicted_word: Option<String>,

    /// Failure message when the capture session is faulted
    pub classifier_fault: Option<String>,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: 0,
            accumulated_text: String::new(),
            captured_count: 0,
            low_confidence: false,
            predicted_word: None,
            classifier_fault: None,
        }
    }
}
