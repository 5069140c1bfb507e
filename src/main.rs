//! ishara-daemon: Background daemon for Arabic sign-language translation
//!
//! The daemon runs the gesture accumulation pipeline:
//! - Observation socket receiving per-frame classifier results from the
//!   camera front-end
//! - Debouncing state machine mapping stabilized gestures to Arabic letters
//! - Word predictor submission every few captured letters
//! - IPC server for UI status queries and display notifications
//!
//! Gesture classification and word inference stay in external collaborators;
//! the daemon owns only the accumulation logic between them.

mod accumulator;
mod alphabet;
mod classifier;
mod config;
mod events;
mod ipc;
mod lifecycle;
mod predictor;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::accumulator::{Accumulator, Command};
use crate::alphabet::LetterMap;
use crate::classifier::{ClassifierEvent, ObservationListener};
use crate::config::Config;
use crate::events::UiEvent;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::predictor::{PredictClient, SubmissionWorker};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "ishara-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.control_socket,
        ?config.observation_socket,
        predict_url = %config.predict_url,
        "configuration loaded"
    );

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Create channels for inter-component communication
    // Observation listener -> state machine
    let (frame_tx, frame_rx) = mpsc::channel::<ClassifierEvent>(64);
    // IPC server -> state machine
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(8);
    // State machine -> predictor worker
    let (submit_tx, submit_rx) = mpsc::channel::<String>(8);
    // Display events for IPC clients and the status snapshot
    let (event_tx, _event_rx) = broadcast::channel::<UiEvent>(64);

    // Create the state machine
    let mut machine = Accumulator::new(
        config.recognition,
        LetterMap::arabic(),
        event_tx.clone(),
        submit_tx,
    );

    // Without an observation source there is no session to run, so a bind
    // failure is fatal
    let observation_listener = ObservationListener::bind(&config.observation_socket, frame_tx)
        .context("failed to start observation listener")?;

    // Create the predictor worker
    let predictor = SubmissionWorker::new(
        PredictClient::new(config.predict_url.clone()),
        event_tx.clone(),
    );

    // Create the IPC server
    let server = Server::new(&config.control_socket, cmd_tx, event_tx.clone())?;

    // Subscribe to display events for the status snapshot
    let mut status_event_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the state machine (processes classifier events and commands)
        _ = machine.run(frame_rx, cmd_rx) => {
            info!("state machine exited");
        }

        // Accept classifier connections and forward frames
        result = observation_listener.run() => {
            if let Err(e) = result {
                error!(?e, "observation listener error");
            }
        }

        // Run prediction submissions
        _ = predictor.run(submit_rx) => {
            info!("submission worker exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Fold display events into the IPC status snapshot
        _ = async {
            loop {
                match status_event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "display event");
                        server_for_events.apply_event(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "status event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("status event handler exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    observation_listener.cleanup();
    server.shutdown().await;

    info!("ishara-daemon stopped");

    Ok(())
}
