//! Job and task aggregates.
//!
//! A [`Job`] mirrors one remote orchestration job into local state. It
//! exclusively owns its [`Task`]s; results and TEE workflow records refer to
//! jobs and tasks by id only. Jobs are mutated solely by the reconciler,
//! one event at a time, and are never physically deleted — a remote deletion
//! transitions the job to `Stopped` instead.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_core::{JobId, NodeId, ProjectId, TaskId};

use crate::event::TaskStatusSnapshot;
use crate::status::{JobStatus, TaskStatus};

/// Remote party state string reported for a failed party.
const PARTY_STATE_FAILED: &str = "Failed";

/// A unit of work within a job, executed by one or more parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task id, scoped to the parent job.
    pub task_id: TaskId,
    /// Current local status.
    pub status: TaskStatus,
    /// Error message collected from the remote side; `None` when clean.
    pub err_msg: Option<String>,
    /// Participating node ids.
    pub parties: Vec<NodeId>,
    /// Logical artifact names the task promises to produce.
    pub outputs: Vec<String>,
}

impl Task {
    /// Creates a pending task with the given participants and outputs.
    #[must_use]
    pub fn new(task_id: TaskId, parties: Vec<NodeId>, outputs: Vec<String>) -> Self {
        Self {
            task_id,
            status: TaskStatus::Pending,
            err_msg: None,
            parties,
            outputs,
        }
    }
}

/// A local mirror of one remote orchestration job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Job id assigned by the remote orchestration service.
    pub job_id: JobId,
    /// The project this job belongs to.
    pub project_id: ProjectId,
    /// Current local status.
    pub status: JobStatus,
    /// Error message reported by the remote service; `None` when clean.
    pub err_msg: Option<String>,
    /// When the job truly finished, per the remote end timestamp.
    pub finished_at: Option<DateTime<Utc>>,
    /// Tasks owned by this job, keyed and ordered by task id.
    pub tasks: BTreeMap<TaskId, Task>,
    /// Job-level view of each task's last applied status.
    ///
    /// Kept alongside the task records so job-level queries never need to
    /// walk task internals.
    pub task_statuses: BTreeMap<TaskId, TaskStatus>,
}

impl Job {
    /// Creates a pending job with the given tasks.
    #[must_use]
    pub fn new(job_id: JobId, project_id: ProjectId, tasks: Vec<Task>) -> Self {
        let task_statuses = tasks
            .iter()
            .map(|t| (t.task_id.clone(), t.status))
            .collect();
        let tasks = tasks.into_iter().map(|t| (t.task_id.clone(), t)).collect();
        Self {
            job_id,
            project_id,
            status: JobStatus::Pending,
            err_msg: None,
            finished_at: None,
            tasks,
            task_statuses,
        }
    }

    /// Returns true once the job has reached a terminal status.
    ///
    /// Terminal jobs absorb replayed events without change.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Marks the job stopped in response to a remote deletion event.
    ///
    /// Task-level state is deliberately left untouched.
    pub fn stop(&mut self) {
        self.status = JobStatus::Stopped;
    }

    /// Applies a task status transition to the job's tracking structure and
    /// the task record itself.
    ///
    /// `failure_reason`, when present, replaces the task's error message.
    /// Unknown task ids are ignored; the caller decides whether that is
    /// worth reporting.
    pub fn transform_task_status(
        &mut self,
        task_id: &TaskId,
        status: TaskStatus,
        failure_reason: Option<String>,
    ) {
        self.task_statuses.insert(task_id.clone(), status);
        if let Some(task) = self.tasks.get_mut(task_id) {
            task.status = status;
            if let Some(reason) = failure_reason {
                task.err_msg = Some(reason);
            }
        }
    }
}

/// Concatenates the failure reasons of a failed task snapshot.
///
/// Each failed party contributes `party {node} failed msg: {msg}`, followed
/// by the task-level error message.
#[must_use]
pub fn task_failure_reason(snapshot: &TaskStatusSnapshot) -> String {
    let mut reasons: Vec<String> = snapshot
        .parties
        .iter()
        .filter(|party| party.state == PARTY_STATE_FAILED)
        .map(|party| format!("party {} failed msg: {}", party.node_id, party.err_msg))
        .collect();
    reasons.push(snapshot.err_msg.clone());
    reasons.join("; ")
}
