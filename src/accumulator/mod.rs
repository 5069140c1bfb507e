//! Gesture accumulation state machine
//!
//! Consumes per-frame classifier events, debounces gestures against flicker,
//! appends stabilized letters to the candidate word, and hands the word off
//! for prediction every few captures.

mod machine;

pub use machine::Accumulator;

/// Control commands routed to the state machine from the IPC server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reset accumulated text, counters, and displayed state
    Clear,
}
