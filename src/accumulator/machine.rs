//! Core state machine implementation
//!
//! Applies the confidence gate and debounce rules to the observation stream:
//! a gesture must be held steadily at or above the confidence threshold for
//! the full hold duration before its letter is captured. Every
//! `submit_batch` captures, the accumulated text is handed to the predictor.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::{debug, error, info, trace, warn};

use crate::alphabet::LetterMap;
use crate::classifier::{ClassifierEvent, Observation};
use crate::config::RecognitionSettings;
use crate::events::UiEvent;

use super::Command;

/// Debounce phase of the machine
#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    /// No candidate gesture
    Idle,
    /// A candidate gesture is being debounced
    Holding { category: String },
    /// The capture session failed; observations are ignored until a new
    /// classifier session starts
    Faulted,
}

/// What the run loop should do with the single-shot hold timer after a
/// transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldTimer {
    /// Start (or restart) the timer with the given duration
    Arm(Duration),
    /// Cancel any pending timer
    Disarm,
    /// Leave a running timer untouched
    Keep,
}

/// The gesture accumulation state machine
///
/// Sole owner of the accumulation state. All mutation happens through the
/// transition methods below, which the `run` loop serializes with timer
/// expiry and control commands, so transitions never overlap.
pub struct Accumulator {
    phase: Phase,
    /// Letters captured since startup or the last clear
    accumulated: String,
    /// Letters captured since the last submission or clear
    captured_count: usize,
    /// Whether the low-confidence indicator is currently shown
    low_confidence_shown: bool,
    settings: RecognitionSettings,
    letters: LetterMap,
    /// Channel for display events
    event_tx: broadcast::Sender<UiEvent>,
    /// Channel for word-prediction submissions
    submit_tx: mpsc::Sender<String>,
}

impl Accumulator {
    /// Create a new accumulator
    pub fn new(
        settings: RecognitionSettings,
        letters: LetterMap,
        event_tx: broadcast::Sender<UiEvent>,
        submit_tx: mpsc::Sender<String>,
    ) -> Self {
        Self {
            phase: Phase::Idle,
            accumulated: String::new(),
            captured_count: 0,
            low_confidence_shown: false,
            settings,
            letters,
            event_tx,
            submit_tx,
        }
    }

    /// Accumulated text so far
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Letters captured since the last submission or clear
    pub fn captured_count(&self) -> usize {
        self.captured_count
    }

    /// Run the state machine, processing classifier events and commands.
    ///
    /// Owns the single pinned hold timer: arming always replaces the previous
    /// deadline, so at most one capture timer is pending at any instant.
    pub async fn run(
        &mut self,
        mut frames: mpsc::Receiver<ClassifierEvent>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        info!("accumulator started in Idle state");

        let hold = time::sleep(Duration::ZERO);
        tokio::pin!(hold);
        let mut armed = false;
        let mut commands_open = true;

        loop {
            tokio::select! {
                event = frames.recv() => {
                    let Some(event) = event else { break };
                    match self.apply(event) {
                        HoldTimer::Arm(duration) => {
                            hold.as_mut().reset(time::Instant::now() + duration);
                            armed = true;
                        }
                        HoldTimer::Disarm => armed = false,
                        HoldTimer::Keep => {}
                    }
                }
                command = commands.recv(), if commands_open => {
                    match command {
                        Some(Command::Clear) => {
                            self.clear();
                            armed = false;
                        }
                        None => commands_open = false,
                    }
                }
                () = &mut hold, if armed => {
                    armed = false;
                    self.capture_held();
                }
            }
        }

        info!("accumulator stopped");
    }

    /// Apply one classifier event and report the resulting timer action
    fn apply(&mut self, event: ClassifierEvent) -> HoldTimer {
        match event {
            ClassifierEvent::SessionStarted => self.session_started(),
            ClassifierEvent::Observation(obs) => self.observe(obs),
            ClassifierEvent::NoDetection => self.no_detection(),
            ClassifierEvent::Fault { message } => self.fault(message),
        }
    }

    /// A classifier connected; recover from a faulted session
    fn session_started(&mut self) -> HoldTimer {
        if self.phase == Phase::Faulted {
            info!("classifier reconnected, leaving faulted state");
        }
        self.phase = Phase::Idle;
        self.emit(UiEvent::SessionStarted);
        HoldTimer::Disarm
    }

    /// Process one observation through the transition rules
    fn observe(&mut self, obs: Observation) -> HoldTimer {
        if self.phase == Phase::Faulted {
            return HoldTimer::Keep;
        }

        if let Some(landmarks) = &obs.landmarks {
            trace!(points = landmarks.len(), "hand geometry received");
        }

        if obs.confidence < self.settings.confidence_threshold {
            debug!(
                category = %obs.category,
                confidence = obs.confidence,
                "observation below confidence threshold"
            );
            self.show_low_confidence();
            self.phase = Phase::Idle;
            return HoldTimer::Disarm;
        }

        self.hide_low_confidence();

        match &self.phase {
            // Same gesture still held: let the running timer elapse
            Phase::Holding { category } if *category == obs.category => HoldTimer::Keep,
            _ => {
                debug!(category = %obs.category, "holding candidate gesture");
                self.phase = Phase::Holding {
                    category: obs.category,
                };
                HoldTimer::Arm(self.settings.hold_duration)
            }
        }
    }

    /// No gesture this frame: cancel any pending capture
    fn no_detection(&mut self) -> HoldTimer {
        if self.phase == Phase::Faulted {
            return HoldTimer::Keep;
        }
        self.hide_low_confidence();
        self.phase = Phase::Idle;
        HoldTimer::Disarm
    }

    /// The session failed; stop capturing until the classifier reconnects
    fn fault(&mut self, message: String) -> HoldTimer {
        error!(%message, "capture session faulted");
        self.phase = Phase::Faulted;
        self.low_confidence_shown = false;
        self.emit(UiEvent::ClassifierFault { message });
        HoldTimer::Disarm
    }

    /// Hold timer elapsed: capture the held gesture's letter
    fn capture_held(&mut self) {
        let category = match &self.phase {
            Phase::Holding { category } => category.clone(),
            _ => return,
        };
        self.phase = Phase::Idle;

        let letter = self.letters.letter(&category).to_string();
        self.accumulated.push_str(&letter);
        self.captured_count += 1;

        info!(
            category = %category,
            letter = %letter,
            count = self.captured_count,
            "letter captured"
        );

        self.emit(UiEvent::LetterCaptured {
            letter,
            accumulated: self.accumulated.trim().to_string(),
            captured_count: self.captured_count,
        });

        if self.captured_count >= self.settings.submit_batch {
            let text = self.accumulated.trim().to_string();
            info!(chars = text.chars().count(), "submitting accumulated letters");
            // Fire-and-forget: the frame path never waits on the predictor
            if let Err(e) = self.submit_tx.try_send(text) {
                warn!(%e, "dropping submission, predictor queue unavailable");
            }
            self.captured_count = 0;
        }
    }

    /// Reset accumulated text and displayed state
    fn clear(&mut self) {
        self.accumulated.clear();
        self.captured_count = 0;
        self.low_confidence_shown = false;
        if self.phase != Phase::Faulted {
            self.phase = Phase::Idle;
        }
        info!("accumulated gestures cleared");
        self.emit(UiEvent::Cleared);
    }

    fn show_low_confidence(&mut self) {
        if !self.low_confidence_shown {
            self.low_confidence_shown = true;
            self.emit(UiEvent::LowConfidenceShown);
        }
    }

    fn hide_low_confidence(&mut self) {
        if self.low_confidence_shown {
            self.low_confidence_shown = false;
            self.emit(UiEvent::LowConfidenceCleared);
        }
    }

    fn emit(&self, event: UiEvent) {
        debug!(?event, "emitting display event");
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_accumulator() -> (
        Accumulator,
        broadcast::Receiver<UiEvent>,
        mpsc::Receiver<String>,
    ) {
        let (event_tx, event_rx) = broadcast::channel(64);
        let (submit_tx, submit_rx) = mpsc::channel(8);
        let acc = Accumulator::new(
            RecognitionSettings::default(),
            LetterMap::arabic(),
            event_tx,
            submit_tx,
        );
        (acc, event_rx, submit_rx)
    }

    fn obs(category: &str, confidence: f32) -> Observation {
        Observation {
            category: category.to_string(),
            confidence,
            timestamp_ms: 0,
            landmarks: None,
        }
    }

    fn drain(rx: &mut broadcast::Receiver<UiEvent>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_high_confidence_arms_hold_timer() {
        let (mut acc, _rx, _srx) = create_accumulator();

        let action = acc.observe(obs("bb", 0.9));
        assert_eq!(action, HoldTimer::Arm(Duration::from_millis(1500)));

        // Same category: timer must keep running untouched
        assert_eq!(acc.observe(obs("bb", 0.8)), HoldTimer::Keep);
    }

    #[test]
    fn test_low_confidence_never_captures() {
        let (mut acc, mut rx, _srx) = create_accumulator();

        assert_eq!(acc.observe(obs("waw", 0.5)), HoldTimer::Disarm);
        acc.capture_held();

        assert_eq!(acc.accumulated(), "");
        assert_eq!(acc.captured_count(), 0);
        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [UiEvent::LowConfidenceShown]));
    }

    #[test]
    fn test_capture_appends_mapped_letter() {
        let (mut acc, mut rx, _srx) = create_accumulator();

        acc.observe(obs("bb", 0.9));
        acc.capture_held();

        assert_eq!(acc.accumulated(), "ب");
        assert_eq!(acc.captured_count(), 1);
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            UiEvent::LetterCaptured { letter, captured_count: 1, .. } if letter == "ب"
        )));
    }

    #[test]
    fn test_category_change_restarts_hold() {
        let (mut acc, _rx, _srx) = create_accumulator();

        assert!(matches!(acc.observe(obs("bb", 0.9)), HoldTimer::Arm(_)));
        // Different category mid-hold: a fresh timer replaces the old one
        assert!(matches!(acc.observe(obs("seen", 0.9)), HoldTimer::Arm(_)));

        acc.capture_held();
        assert_eq!(acc.accumulated(), "س");
    }

    #[test]
    fn test_low_confidence_cancels_pending_hold() {
        let (mut acc, mut rx, _srx) = create_accumulator();

        acc.observe(obs("bb", 0.9));
        assert_eq!(acc.observe(obs("waw", 0.3)), HoldTimer::Disarm);

        assert_eq!(acc.accumulated(), "");
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, UiEvent::LowConfidenceShown)));
    }

    #[test]
    fn test_no_detection_cancels_and_hides_indicator() {
        let (mut acc, mut rx, _srx) = create_accumulator();

        acc.observe(obs("bb", 0.2));
        drain(&mut rx);

        assert_eq!(acc.no_detection(), HoldTimer::Disarm);
        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [UiEvent::LowConfidenceCleared]));
    }

    #[test]
    fn test_low_confidence_indicator_deduplicated() {
        let (mut acc, mut rx, _srx) = create_accumulator();

        acc.observe(obs("bb", 0.2));
        acc.observe(obs("bb", 0.3));
        acc.observe(obs("waw", 0.1));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], UiEvent::LowConfidenceShown));
    }

    #[test]
    fn test_third_capture_triggers_submission() {
        let (mut acc, _rx, mut srx) = create_accumulator();

        for _ in 0..3 {
            acc.observe(obs("bb", 0.9));
            acc.capture_held();
        }

        assert_eq!(srx.try_recv().unwrap(), "ببب");
        // Count resets, text is retained
        assert_eq!(acc.captured_count(), 0);
        assert_eq!(acc.accumulated(), "ببب");
    }

    #[test]
    fn test_submission_text_is_trimmed() {
        let (mut acc, _rx, mut srx) = create_accumulator();

        // Spacer first: the leading space is kept in the buffer but trimmed
        // from the submitted text
        for category in ["toot", "bb", "bb"] {
            acc.observe(obs(category, 0.9));
            acc.capture_held();
        }

        assert_eq!(srx.try_recv().unwrap(), "بب");
        assert_eq!(acc.accumulated(), " بب");
    }

    #[test]
    fn test_captured_count_stays_below_batch() {
        let (mut acc, _rx, _srx) = create_accumulator();

        for i in 1..=7 {
            acc.observe(obs("bb", 0.9));
            acc.capture_held();
            assert!(acc.captured_count() < 3, "count out of range after capture {i}");
        }
    }

    #[test]
    fn test_clear_resets_everything() {
        let (mut acc, mut rx, mut srx) = create_accumulator();

        acc.observe(obs("bb", 0.9));
        acc.capture_held();
        acc.observe(obs("seen", 0.9));
        drain(&mut rx);

        acc.clear();

        assert_eq!(acc.accumulated(), "");
        assert_eq!(acc.captured_count(), 0);
        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [UiEvent::Cleared]));

        // Accumulation starts from empty afterwards
        for _ in 0..3 {
            acc.observe(obs("dal", 0.9));
            acc.capture_held();
        }
        assert_eq!(srx.try_recv().unwrap(), "ددد");
    }

    #[test]
    fn test_fault_blocks_captures_until_new_session() {
        let (mut acc, mut rx, _srx) = create_accumulator();

        assert_eq!(
            acc.fault("malformed frame".to_string()),
            HoldTimer::Disarm
        );
        assert_eq!(acc.observe(obs("bb", 0.9)), HoldTimer::Keep);
        acc.capture_held();
        assert_eq!(acc.accumulated(), "");

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, UiEvent::ClassifierFault { .. })));

        // Reconnect recovers
        acc.session_started();
        assert!(matches!(acc.observe(obs("bb", 0.9)), HoldTimer::Arm(_)));
    }

    #[test]
    fn test_clear_keeps_faulted_phase() {
        let (mut acc, _rx, _srx) = create_accumulator();

        acc.fault("stream error".to_string());
        acc.clear();

        // Still faulted: observations stay ignored
        assert_eq!(acc.observe(obs("bb", 0.9)), HoldTimer::Keep);
    }

    #[test]
    fn test_unmapped_category_captured_as_name() {
        let (mut acc, _rx, _srx) = create_accumulator();

        acc.observe(obs("mystery", 0.9));
        acc.capture_held();
        assert_eq!(acc.accumulated(), "mystery");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_captures_after_hold_duration() {
        let (event_tx, mut event_rx) = broadcast::channel(64);
        let (submit_tx, _submit_rx) = mpsc::channel(8);
        let mut acc = Accumulator::new(
            RecognitionSettings::default(),
            LetterMap::arabic(),
            event_tx,
            submit_tx,
        );

        let (frame_tx, frame_rx) = mpsc::channel(8);
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let machine = tokio::spawn(async move {
            acc.run(frame_rx, cmd_rx).await;
        });

        frame_tx
            .send(ClassifierEvent::Observation(obs("bb", 0.9)))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(1600)).await;

        drop(frame_tx);
        machine.await.unwrap();

        let mut captured = Vec::new();
        while let Ok(event) = event_rx.try_recv() {
            if let UiEvent::LetterCaptured { letter, .. } = event {
                captured.push(letter);
            }
        }
        assert_eq!(captured, vec!["ب".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_interrupted_hold_never_captures() {
        let (event_tx, mut event_rx) = broadcast::channel(64);
        let (submit_tx, _submit_rx) = mpsc::channel(8);
        let mut acc = Accumulator::new(
            RecognitionSettings::default(),
            LetterMap::arabic(),
            event_tx,
            submit_tx,
        );

        let (frame_tx, frame_rx) = mpsc::channel(8);
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let machine = tokio::spawn(async move {
            acc.run(frame_rx, cmd_rx).await;
        });

        frame_tx
            .send(ClassifierEvent::Observation(obs("bb", 0.9)))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(1000)).await;
        // Interrupt the hold before the timer elapses
        frame_tx
            .send(ClassifierEvent::Observation(obs("bb", 0.3)))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(2000)).await;

        drop(frame_tx);
        machine.await.unwrap();

        while let Ok(event) = event_rx.try_recv() {
            assert!(
                !matches!(event, UiEvent::LetterCaptured { .. }),
                "no letter should be captured for an interrupted gesture"
            );
        }
    }
}
