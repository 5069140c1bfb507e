//! Frame classifier seam
//!
//! The gesture recognition model runs in an external front-end process; this
//! module owns the daemon side of that boundary: the observation data model,
//! the newline-delimited JSON wire format, and the Unix-socket listener that
//! turns the incoming stream into channel events for the state machine.

mod source;
mod wire;

pub use source::ObservationListener;
pub use wire::FrameMessage;

use serde::{Deserialize, Serialize};

/// One normalized hand landmark, as produced by the vision model.
///
/// Carried for diagnostics only; the front-end draws hand geometry itself and
/// the daemon never interprets coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// One frame's classification result: the top-ranked gesture category with
/// its confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Gesture category name as emitted by the model
    pub category: String,
    /// Confidence score in [0, 1]
    pub confidence: f32,
    /// Capture timestamp in milliseconds
    pub timestamp_ms: u64,
    /// Detected hand geometry, when the front-end forwards it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Vec<Landmark>>,
}

/// Events sent from the observation listener to the state machine
#[derive(Debug, Clone)]
pub enum ClassifierEvent {
    /// A classifier connected; a fresh capture session begins
    SessionStarted,
    /// A frame produced a top gesture
    Observation(Observation),
    /// A frame produced no detection
    NoDetection,
    /// The session failed; no further frames until the classifier reconnects
    Fault { message: String },
}

/// Errors from the observation socket
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("failed to bind observation socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("observation stream error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("malformed frame message: {0}")]
    Decode(#[from] serde_json::Error),
}
