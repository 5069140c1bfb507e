//! Blocking HTTP client for the word prediction service

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Successful prediction payload from the service
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    /// Most likely intended word for the submitted letters
    pub most_likely_word: String,
    /// Alternative candidates, when the service offers them
    #[serde(default)]
    pub list_of_other_likely_words: Vec<String>,
    /// Whether the service judged the input a full sentence
    #[serde(default)]
    pub is_a_full_sentence: bool,
}

/// Top-level response envelope: either a prediction or an error message
#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    prediction: Option<Prediction>,
    #[serde(default)]
    error: Option<String>,
}

/// Errors from a prediction request
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("predict request failed: {0}")]
    Transport(Box<ureq::Error>),

    #[error("failed to decode predict response: {0}")]
    Decode(#[from] std::io::Error),

    #[error("predict service error: {0}")]
    Service(String),

    #[error("predict response missing prediction field")]
    MissingPrediction,
}

/// Client for `POST {url}` with body `{"gestures": "..."}`.
///
/// Blocking by design; callers run it on the blocking pool so the frame path
/// never waits on the network.
#[derive(Clone)]
pub struct PredictClient {
    agent: ureq::Agent,
    url: String,
}

impl PredictClient {
    /// Create a client with bounded connect/read/write timeouts
    pub fn new(url: String) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .build();
        Self { agent, url }
    }

    /// Submit an accumulated letter sequence for whole-word inference
    pub fn predict(&self, gestures: &str) -> Result<Prediction, PredictError> {
        let result = self
            .agent
            .post(&self.url)
            .send_json(json!({ "gestures": gestures }));

        let response = match result {
            Ok(response) => response,
            // The service reports failures as JSON with an `error` field and
            // a non-2xx status; read the body to surface that message.
            Err(ureq::Error::Status(_code, response)) => response,
            Err(e) => return Err(PredictError::Transport(Box::new(e))),
        };

        let body: PredictResponse = response.into_json()?;

        if let Some(message) = body.error {
            return Err(PredictError::Service(message));
        }

        body.prediction.ok_or(PredictError::MissingPrediction)
    }
}
