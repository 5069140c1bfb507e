//! Wire format for the observation stream
//!
//! The front-end writes one JSON object per line. A frame either carries the
//! top-ranked gesture or reports that nothing was detected.

use serde::{Deserialize, Serialize};

use super::{ClassifierEvent, Landmark, Observation};

/// One line of the observation stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameMessage {
    /// Top gesture for this frame
    Gesture {
        category: String,
        confidence: f32,
        timestamp_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        landmarks: Option<Vec<Landmark>>,
    },
    /// No hand / no gesture this frame
    NoDetection { timestamp_ms: u64 },
}

impl From<FrameMessage> for ClassifierEvent {
    fn from(msg: FrameMessage) -> Self {
        match msg {
            FrameMessage::Gesture {
                category,
                confidence,
                timestamp_ms,
                landmarks,
            } => ClassifierEvent::Observation(Observation {
                category,
                confidence,
                timestamp_ms,
                landmarks,
            }),
            FrameMessage::NoDetection { .. } => ClassifierEvent::NoDetection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gesture_message_parses() {
        let json = r#"{"type":"gesture","category":"bb","confidence":0.91,"timestamp_ms":1000}"#;
        let msg: FrameMessage = serde_json::from_str(json).unwrap();
        match msg {
            FrameMessage::Gesture {
                category,
                confidence,
                landmarks,
                ..
            } => {
                assert_eq!(category, "bb");
                assert!((confidence - 0.91).abs() < f32::EPSILON);
                assert!(landmarks.is_none());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_no_detection_message_parses() {
        let json = r#"{"type":"no_detection","timestamp_ms":1000}"#;
        let msg: FrameMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, FrameMessage::NoDetection { timestamp_ms: 1000 }));
    }

    #[test]
    fn test_gesture_with_landmarks() {
        let json = r#"{"type":"gesture","category":"waw","confidence":0.7,"timestamp_ms":5,"landmarks":[{"x":0.1,"y":0.2,"z":0.0}]}"#;
        let msg: FrameMessage = serde_json::from_str(json).unwrap();
        let event: ClassifierEvent = msg.into();
        match event {
            ClassifierEvent::Observation(obs) => {
                assert_eq!(obs.landmarks.as_ref().map(Vec::len), Some(1));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"type":"blink","timestamp_ms":1}"#;
        assert!(serde_json::from_str::<FrameMessage>(json).is_err());
    }
}
