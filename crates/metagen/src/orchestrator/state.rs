use serde::{Deserialize, Serialize};

/// Lifecycle of the batch orchestrator.
///
/// `Idle → Running → {Completed, Stopped, QuotaExceeded, Failed}`. Only
/// `Running` moves to a terminal state; only `Idle` or a terminal state may
/// move to `Running`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Completed,
    Stopped,
    QuotaExceeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Stopped | JobState::QuotaExceeded | JobState::Failed
        )
    }

    pub fn can_start(&self) -> bool {
        !matches!(self, JobState::Running)
    }

    /// Whether a run settling in this state leaves work that can be resumed.
    pub fn leaves_resumable(&self) -> bool {
        matches!(self, JobState::Stopped | JobState::QuotaExceeded)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Idle => write!(f, "Idle"),
            JobState::Running => write!(f, "Running"),
            JobState::Completed => write!(f, "Completed"),
            JobState::Stopped => write!(f, "Stopped"),
            JobState::QuotaExceeded => write!(f, "Quota exceeded"),
            JobState::Failed => write!(f, "Failed"),
        }
    }
}

/// Final report of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub job_id: String,
    pub outcome: JobState,
    /// Processed rows in the session after the run.
    pub processed: usize,
    /// Rows in the original upload.
    pub total: usize,
    /// Tokens consumed by this run only.
    pub tokens_used: u64,
    pub resumable: bool,
    /// User-facing summary.
    pub message: String,
}
