//! Pure translation of remote state codes into local status enums.
//!
//! The remote orchestration service reports states as free-form strings.
//! This module is the single place that interprets them; everything
//! downstream works with the local enums. No side effects.

use serde::{Deserialize, Serialize};

/// Remote state string for a finished-successful job or task.
pub const REMOTE_STATE_SUCCEEDED: &str = "Succeeded";
/// Remote state string for a finished-failed job or task.
pub const REMOTE_STATE_FAILED: &str = "Failed";
/// Remote state string for a running job or task.
pub const REMOTE_STATE_RUNNING: &str = "Running";

/// Returns true when the remote state string reports a finished job.
///
/// Finished here means the remote scheduler considers the job settled; the
/// reconciler additionally requires a populated end timestamp before
/// treating the job as truly complete.
#[must_use]
pub fn is_finished_state(state: &str) -> bool {
    state == REMOTE_STATE_SUCCEEDED || state == REMOTE_STATE_FAILED
}

/// Local job status.
///
/// `Pending → Running → {Succeeded, Failed}`; `Stopped` is reached only
/// through a deletion event and is terminal like the other finished states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created, not yet scheduled remotely.
    #[default]
    Pending,
    /// Actively executing tasks.
    Running,
    /// All tasks completed successfully.
    Succeeded,
    /// One or more tasks failed.
    Failed,
    /// Deleted remotely before finishing.
    Stopped,
}

impl JobStatus {
    /// Maps a remote job state string to the local status.
    ///
    /// Unknown states map to `Pending`; the remote service may introduce
    /// transient states this consumer has no use for.
    #[must_use]
    pub fn from_remote_state(state: &str) -> Self {
        match state {
            REMOTE_STATE_SUCCEEDED => Self::Succeeded,
            REMOTE_STATE_FAILED => Self::Failed,
            REMOTE_STATE_RUNNING => Self::Running,
            _ => Self::Pending,
        }
    }

    /// Returns true if this is a terminal status.
    ///
    /// Once terminal, no further status transition is applied to the job.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Stopped)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Local task status; mirrors the job state machine independently per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, not yet running.
    #[default]
    Pending,
    /// Actively executing.
    Running,
    /// Completed successfully.
    Succeeded,
    /// Failed on at least one party.
    Failed,
    /// Parent job was stopped before the task finished.
    Stopped,
}

impl TaskStatus {
    /// Maps a remote task state string to the local status.
    #[must_use]
    pub fn from_remote_state(state: &str) -> Self {
        match state {
            REMOTE_STATE_SUCCEEDED => Self::Succeeded,
            REMOTE_STATE_FAILED => Self::Failed,
            REMOTE_STATE_RUNNING => Self::Running,
            _ => Self::Pending,
        }
    }

    /// Returns true if this is a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Stopped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Status of a TEE exchange workflow job; mirrors [`JobStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeeJobStatus {
    /// Submitted, not yet finished.
    #[default]
    Running,
    /// The underlying remote job succeeded.
    Success,
    /// The underlying remote job failed.
    Failed,
}

impl TeeJobStatus {
    /// Maps a remote job state string to the local TEE job status.
    #[must_use]
    pub fn from_remote_state(state: &str) -> Self {
        match state {
            REMOTE_STATE_SUCCEEDED => Self::Success,
            REMOTE_STATE_FAILED => Self::Failed,
            _ => Self::Running,
        }
    }

    /// Returns true if this is a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for TeeJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}
