//! Display events emitted toward UI clients
//!
//! Every observable outcome of the accumulation pipeline is broadcast as a
//! `UiEvent`; subscribed IPC clients receive them as push notifications and
//! the control server folds them into its status snapshot.

use serde::{Deserialize, Serialize};

/// Events emitted by the state machine and the predictor worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// A frame classifier connected and a new capture session began
    SessionStarted,

    /// The latest observation fell below the confidence threshold
    LowConfidenceShown,

    /// Confidence recovered; the indicator should be hidden
    LowConfidenceCleared,

    /// A stabilized gesture was captured and appended
    LetterCaptured {
        /// The token that was appended
        letter: String,
        /// Trimmed accumulated text after the append
        accumulated: String,
        /// Letters captured since the last submission or clear
        captured_count: usize,
    },

    /// The word predictor returned a result for an earlier submission
    WordPredicted {
        /// Most likely intended word for the accumulated letters
        word: String,
    },

    /// Accumulated text, counters, and the predicted word were reset
    Cleared,

    /// The capture session failed; no further captures until reconnect
    ClassifierFault {
        /// Human-readable failure description
        message: String,
    },
}

impl std::fmt::Display for UiEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiEvent::SessionStarted => write!(f, "SESSION_STARTED"),
            UiEvent::LowConfidenceShown => write!(f, "LOW_CONFIDENCE_SHOWN"),
            UiEvent::LowConfidenceCleared => write!(f, "LOW_CONFIDENCE_CLEARED"),
            UiEvent::LetterCaptured {
                letter,
                captured_count,
                ..
            } => write!(f, "LETTER_CAPTURED ({letter}, count={captured_count})"),
            UiEvent::WordPredicted { word } => write!(f, "WORD_PREDICTED ({word})"),
            UiEvent::Cleared => write!(f, "CLEARED"),
            UiEvent::ClassifierFault { message } => {
                write!(f, "CLASSIFIER_FAULT ({message})")
            }
        }
    }
}
