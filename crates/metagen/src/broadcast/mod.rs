//! Broadcasting of run progress for real-time streaming.
//!
//! Any front end (the CLI, a desktop shell, a web socket) subscribes to the
//! broadcaster and renders events as they arrive.

pub mod run_progress;

pub use run_progress::{RunPhase, RunProgressBroadcaster, RunProgressEvent};
