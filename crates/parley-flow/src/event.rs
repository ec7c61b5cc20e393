//! Job lifecycle events emitted by the remote orchestration service.
//!
//! The event stream is the only way job progress reaches this system. Each
//! event carries a full status snapshot of the remote job, including
//! per-task and per-party state. The snapshot shape is owned by the remote
//! service; this module mirrors it without reinterpretation.

use serde::{Deserialize, Serialize};

use parley_core::{JobId, NodeId, TaskId};

/// The kind of change a job event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A job appeared in the remote service.
    Added,
    /// A job's status snapshot changed.
    Modified,
    /// A job was deleted from the remote service.
    Deleted,
    /// A diagnostic event with no reconcilable payload.
    Error,
    /// An event kind this consumer does not understand.
    Unrecognized,
}

impl EventKind {
    /// Returns true for diagnostic kinds that carry no reconcilable payload.
    #[must_use]
    pub const fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Error | Self::Unrecognized)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Modified => write!(f, "MODIFIED"),
            Self::Deleted => write!(f, "DELETED"),
            Self::Error => write!(f, "ERROR"),
            Self::Unrecognized => write!(f, "UNRECOGNIZED"),
        }
    }
}

/// One job lifecycle event from the remote stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    /// What changed.
    pub kind: EventKind,
    /// The remote job this event describes.
    pub job_id: JobId,
    /// Full status snapshot of the remote job at event time.
    pub status: JobStatusSnapshot,
}

/// Snapshot of a remote job's overall status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusSnapshot {
    /// Overall remote state, e.g. `Pending`, `Running`, `Succeeded`, `Failed`.
    pub state: String,
    /// Remote error message; empty when none.
    #[serde(default)]
    pub err_msg: String,
    /// RFC 3339 end timestamp; empty until the job has truly finished.
    ///
    /// The remote service may report a terminal state before all task-level
    /// states have converged; only a populated end time marks real
    /// completion.
    #[serde(default)]
    pub end_time: String,
    /// Per-task state at event time.
    #[serde(default)]
    pub tasks: Vec<TaskStatusSnapshot>,
}

impl JobStatusSnapshot {
    /// Returns true when the snapshot carries a populated end timestamp.
    #[must_use]
    pub fn has_end_time(&self) -> bool {
        !self.end_time.is_empty()
    }
}

/// Snapshot of one task's remote status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusSnapshot {
    /// The task this snapshot describes.
    pub task_id: TaskId,
    /// Remote task state.
    pub state: String,
    /// Remote error message; empty when none.
    #[serde(default)]
    pub err_msg: String,
    /// Per-party execution state.
    #[serde(default)]
    pub parties: Vec<PartyStatus>,
}

/// Execution state of one participating party within a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyStatus {
    /// The party's node id.
    pub node_id: NodeId,
    /// Remote party state.
    pub state: String,
    /// Party error message; empty when none.
    #[serde(default)]
    pub err_msg: String,
}
