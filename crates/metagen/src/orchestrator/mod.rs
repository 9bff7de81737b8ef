//! Batch generation and its resumable job lifecycle.

pub mod progress;
pub mod runner;
pub mod state;

pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{BatchOrchestrator, RestoredSession};
pub use state::{JobState, RunReport};
