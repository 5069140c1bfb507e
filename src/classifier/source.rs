//! Observation socket listener
//!
//! Accepts the frame classifier's Unix-socket connection and forwards parsed
//! frames to the state machine. One session at a time: the stream is read to
//! completion (or to a fault) before the next connection is accepted.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{ClassifierError, ClassifierEvent, FrameMessage};

/// Unix-socket server for the observation stream
pub struct ObservationListener {
    socket_path: PathBuf,
    listener: UnixListener,
    event_tx: mpsc::Sender<ClassifierEvent>,
}

impl ObservationListener {
    /// Bind the observation socket.
    ///
    /// A bind failure is fatal to the daemon: without an observation source
    /// there is no session to run.
    pub fn bind(
        socket_path: &Path,
        event_tx: mpsc::Sender<ClassifierEvent>,
    ) -> Result<Self, ClassifierError> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(ClassifierError::Bind)?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).map_err(ClassifierError::Bind)?;
        }

        let listener = UnixListener::bind(socket_path).map_err(ClassifierError::Bind)?;

        info!(?socket_path, "observation socket listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            event_tx,
        })
    }

    /// Accept classifier connections and forward their frames.
    ///
    /// Runs until the state machine side of the channel is dropped.
    pub async fn run(&self) -> Result<(), ClassifierError> {
        loop {
            let (stream, _addr) = self.listener.accept().await?;
            info!("frame classifier connected");

            if self.event_tx.send(ClassifierEvent::SessionStarted).await.is_err() {
                return Ok(());
            }

            match forward_frames(stream, &self.event_tx).await {
                Ok(true) => {
                    info!("frame classifier disconnected");
                    // Camera stopped mid-hold: settle the machine instead of
                    // letting a pending capture fire against a dead stream.
                    if self.event_tx.send(ClassifierEvent::NoDetection).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(false) => return Ok(()),
                Err(e) => {
                    warn!(%e, "classifier session failed");
                    let fault = ClassifierEvent::Fault {
                        message: e.to_string(),
                    };
                    if self.event_tx.send(fault).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Remove the socket file.
    pub fn cleanup(&self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove observation socket");
            }
        }
    }
}

/// Read one session's frames and forward them as events.
///
/// Returns `Ok(true)` on clean end-of-stream, `Ok(false)` if the receiving
/// side is gone, and `Err` on a stream or decode failure (which faults the
/// session).
async fn forward_frames(
    stream: UnixStream,
    event_tx: &mpsc::Sender<ClassifierEvent>,
) -> Result<bool, ClassifierError> {
    let mut lines = BufReader::new(stream).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let msg: FrameMessage = serde_json::from_str(&line)?;
        debug!(?msg, "frame received");

        if event_tx.send(msg.into()).await.is_err() {
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn run_session(input: &str) -> (Result<bool, ClassifierError>, Vec<ClassifierEvent>) {
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let (mut writer, reader) = UnixStream::pair().unwrap();

        writer.write_all(input.as_bytes()).await.unwrap();
        drop(writer);

        let result = forward_frames(reader, &event_tx).await;
        drop(event_tx);

        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }
        (result, events)
    }

    #[tokio::test]
    async fn test_forwards_gesture_and_no_detection() {
        let input = concat!(
            r#"{"type":"gesture","category":"bb","confidence":0.9,"timestamp_ms":1}"#,
            "\n",
            r#"{"type":"no_detection","timestamp_ms":2}"#,
            "\n",
        );

        let (result, events) = run_session(input).await;
        assert!(matches!(result, Ok(true)));
        assert_eq!(events.len(), 2);
        assert!(
            matches!(&events[0], ClassifierEvent::Observation(obs) if obs.category == "bb")
        );
        assert!(matches!(events[1], ClassifierEvent::NoDetection));
    }

    #[tokio::test]
    async fn test_blank_lines_skipped() {
        let input = concat!(
            "\n",
            r#"{"type":"no_detection","timestamp_ms":2}"#,
            "\n\n",
        );

        let (result, events) = run_session(input).await;
        assert!(matches!(result, Ok(true)));
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_line_faults_session() {
        let input = "not json\n";

        let (result, events) = run_session(input).await;
        assert!(matches!(result, Err(ClassifierError::Decode(_))));
        assert!(events.is_empty());
    }
}
