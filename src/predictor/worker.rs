//! Submission worker task
//!
//! Consumes accumulated letter strings from the state machine and runs one
//! prediction request per submission. Requests may overlap: each runs on its
//! own task and only reports back through the display event channel, so a
//! late response never blocks or reorders subsequent captures.

use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

use crate::events::UiEvent;

use super::PredictClient;

/// Drives prediction requests for submitted letter sequences
pub struct SubmissionWorker {
    client: PredictClient,
    event_tx: broadcast::Sender<UiEvent>,
}

impl SubmissionWorker {
    /// Create a new worker
    pub fn new(client: PredictClient, event_tx: broadcast::Sender<UiEvent>) -> Self {
        Self { client, event_tx }
    }

    /// Process submissions until the sending side is dropped
    pub async fn run(&self, mut submissions: mpsc::Receiver<String>) {
        info!("submission worker started");

        while let Some(gestures) = submissions.recv().await {
            let client = self.client.clone();
            let event_tx = self.event_tx.clone();

            tokio::spawn(async move {
                info!(chars = gestures.chars().count(), "prediction request started");
                let result =
                    tokio::task::spawn_blocking(move || client.predict(&gestures)).await;

                match result {
                    Ok(Ok(prediction)) => {
                        info!(word = %prediction.most_likely_word, "word predicted");
                        let _ = event_tx.send(UiEvent::WordPredicted {
                            word: prediction.most_likely_word,
                        });
                    }
                    // Prediction failures are logged only; accumulation is
                    // unaffected and there is no retry
                    Ok(Err(e)) => error!(%e, "word prediction failed"),
                    Err(e) => error!(?e, "prediction task failed"),
                }
            });
        }

        info!("submission worker stopped");
    }
}
