//! Unix domain socket server for IPC
//!
//! Provides request-response communication for UI clients and push
//! notifications of display events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::accumulator::Command;
use crate::events::UiEvent;

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    /// Channel for routing control commands to the state machine
    cmd_tx: mpsc::Sender<Command>,
    /// Source of display events for subscribed clients
    event_tx: broadcast::Sender<UiEvent>,
}

/// Shared server state
struct ServerState {
    status: DaemonStatus,
    start_time: std::time::Instant,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        cmd_tx: mpsc::Sender<Command>,
        event_tx: broadcast::Sender<UiEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status: DaemonStatus::default(),
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            cmd_tx,
            event_tx,
        })
    }

    /// Fold a display event into the status snapshot
    pub async fn apply_event(&self, event: &UiEvent) {
        let mut state = self.state.write().await;
        match event {
            UiEvent::SessionStarted => {
                state.status.classifier_fault = None;
            }
            UiEvent::LowConfidenceShown => {
                state.status.low_confidence = true;
            }
            UiEvent::LowConfidenceCleared => {
                state.status.low_confidence = false;
            }
            UiEvent::LetterCaptured {
                accumulated,
                captured_count,
                ..
            } => {
                state.status.accumulated_text = accumulated.clone();
                state.status.captured_count = *captured_count;
            }
            UiEvent::WordPredicted { word } => {
                state.status.predicted_word = Some(word.clone());
            }
            UiEvent::Cleared => {
                state.status.accumulated_text.clear();
                state.status.captured_count = 0;
                state.status.predicted_word = None;
                state.status.low_confidence = false;
            }
            UiEvent::ClassifierFault { message } => {
                state.status.classifier_fault = Some(message.clone());
            }
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let cmd_tx = self.cmd_tx.clone();
                    let event_rx = self.event_tx.subscribe();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, cmd_tx, event_rx) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        mut stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        cmd_tx: mpsc::Sender<Command>,
        event_rx: broadcast::Receiver<UiEvent>,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match stream.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > 1024 * 1024 {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            stream.read_exact(&mut msg_buf).await?;

            // Parse request
            let request: Request =
                serde_json::from_slice(&msg_buf).context("failed to parse request")?;

            debug!(?request, "received request");

            if matches!(request, Request::Subscribe) {
                Self::send_message(&mut stream, &Response::Subscribed).await?;
                debug!("client subscribed to notifications");
                return Self::push_notifications(stream, event_rx).await;
            }

            let response = Self::process_request(request, &state, &cmd_tx).await;
            Self::send_message(&mut stream, &response).await?;
        }
    }

    /// Forward display events to a subscribed client until it disconnects
    async fn push_notifications(
        mut stream: UnixStream,
        mut event_rx: broadcast::Receiver<UiEvent>,
    ) -> Result<()> {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    let note = Notification::Event(event);
                    if Self::send_message(&mut stream, &note).await.is_err() {
                        debug!("subscriber disconnected");
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber lagged behind event stream");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        stream.write_all(&msg_len).await?;
        stream.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        cmd_tx: &mpsc::Sender<Command>,
    ) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => {
                let mut state = state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                Response::Status(state.status.clone())
            }

            Request::Clear => {
                info!("clear requested via IPC");
                match cmd_tx.send(Command::Clear).await {
                    Ok(()) => Response::Ack,
                    Err(_) => Response::Error {
                        code: "unavailable".to_string(),
                        message: "state machine is not running".to_string(),
                    },
                }
            }

            // Handled before dispatch; kept for exhaustiveness
            Request::Subscribe => Response::Subscribed,
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> Arc<RwLock<ServerState>> {
        Arc::new(RwLock::new(ServerState {
            status: DaemonStatus::default(),
            start_time: std::time::Instant::now(),
        }))
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let state = test_state();
        let (cmd_tx, _cmd_rx) = mpsc::channel(4);

        let response = Server::process_request(Request::Ping, &state, &cmd_tx).await;
        assert!(matches!(response, Response::Pong));
    }

    #[tokio::test]
    async fn test_clear_routes_command() {
        let state = test_state();
        let (cmd_tx, mut cmd_rx) = mpsc::channel(4);

        let response = Server::process_request(Request::Clear, &state, &cmd_tx).await;
        assert!(matches!(response, Response::Ack));
        assert_eq!(cmd_rx.try_recv().unwrap(), Command::Clear);
    }

    #[tokio::test]
    async fn test_clear_reports_unavailable_machine() {
        let state = test_state();
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        drop(cmd_rx);

        let response = Server::process_request(Request::Clear, &state, &cmd_tx).await;
        assert!(matches!(response, Response::Error { .. }));
    }

    #[tokio::test]
    async fn test_status_reflects_applied_events() {
        let (cmd_tx, _cmd_rx) = mpsc::channel(4);
        let (event_tx, _event_rx) = broadcast::channel(16);
        let dir = std::env::temp_dir().join(format!("ishara-test-{}", std::process::id()));
        let socket = dir.join("control.sock");
        let server = Server::new(&socket, cmd_tx, event_tx).unwrap();

        server
            .apply_event(&UiEvent::LetterCaptured {
                letter: "ب".to_string(),
                accumulated: "ب".to_string(),
                captured_count: 1,
            })
            .await;
        server
            .apply_event(&UiEvent::WordPredicted {
                word: "باب".to_string(),
            })
            .await;

        {
            let state = server.state.read().await;
            assert_eq!(state.status.accumulated_text, "ب");
            assert_eq!(state.status.captured_count, 1);
            assert_eq!(state.status.predicted_word.as_deref(), Some("باب"));
        }

        server.apply_event(&UiEvent::Cleared).await;
        let state = server.state.read().await;
        assert_eq!(state.status.accumulated_text, "");
        assert!(state.status.predicted_word.is_none());

        server.shutdown().await;
        let _ = std::fs::remove_dir_all(&dir);
    }
}
