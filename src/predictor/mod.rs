//! Word predictor client
//!
//! The remote `/predict` endpoint turns an accumulated letter sequence into
//! the most likely intended word. Submissions are fire-and-forget: failures
//! are logged and never affect accumulation.

mod client;
mod worker;

pub use client::{PredictClient, PredictError, Prediction};
pub use worker::SubmissionWorker;
