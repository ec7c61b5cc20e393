//! The TEE exchange workflow: records, parameters, and the orchestrator.
//!
//! Moving a dataset through the TEE node is a multi-step workflow:
//!
//! ```text
//! PushAuthorize -> Push -> (remote compute) -> Pull -> Delete / CancelAuthorize
//! ```
//!
//! Each step maps to one submitted remote job, tracked by a
//! [`TeeManagement`] record. Completion is observed through the same job
//! event stream the regular reconciler consumes; TEE jobs are identified by
//! the existence of their management record.

pub mod params;
mod workflow;

pub use params::{
    CancelAuthorizeParams, DeleteParams, PullParams, PushAuthorizeParams, PushParams,
    WorkflowParams, MOCK_APPROVAL_TOKEN,
};
pub use workflow::{PullResultRequest, PushDatasetRequest, TeeWorkflow};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_core::{DatasetId, JobId, NodeId};

use crate::status::TeeJobStatus;

/// The step of the TEE exchange workflow a management record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeeJobKind {
    /// Authorize the TEE node to read a dataset.
    PushAuthorize,
    /// Move a dataset into the TEE node.
    Push,
    /// Move a result out of the TEE node.
    Pull,
    /// Tear down a completed push.
    Delete,
    /// Revoke a previously issued authorization.
    CancelAuthorize,
}

impl std::fmt::Display for TeeJobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PushAuthorize => write!(f, "PUSH_AUTHORIZE"),
            Self::Push => write!(f, "PUSH"),
            Self::Pull => write!(f, "PULL"),
            Self::Delete => write!(f, "DELETE"),
            Self::CancelAuthorize => write!(f, "CANCEL_AUTHORIZE"),
        }
    }
}

/// Tracking record for one TEE workflow step.
///
/// Identity is the composite (node, tee node, dataset, job). A dataset has
/// at most one non-deleted `PushAuthorize` record and at most one active
/// record per kind at a time for a given (node, tee node, dataset) triple.
/// Records are soft-deleted by the cleanup cascade, never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeeManagement {
    /// The node moving data.
    pub node_id: NodeId,
    /// The TEE node data moves through.
    pub tee_node_id: NodeId,
    /// The dataset the step operates on.
    pub dataset_id: DatasetId,
    /// The remote job id this step runs under.
    pub job_id: JobId,
    /// Current status, mirroring the underlying remote job.
    pub status: TeeJobStatus,
    /// Error message collected from the remote side; `None` when clean.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
    /// The datasource staged data lives in.
    pub datasource_id: String,
    /// Typed workflow parameters; the variant decides the record's kind.
    pub params: WorkflowParams,
    /// Soft-delete flag set by the cleanup cascade.
    #[serde(default)]
    pub deleted: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record last changed; tracks the remote end time on finish.
    pub updated_at: DateTime<Utc>,
}

impl TeeManagement {
    /// Creates a new record for a freshly initiated workflow step.
    #[must_use]
    pub fn new(
        node_id: NodeId,
        tee_node_id: NodeId,
        dataset_id: DatasetId,
        job_id: JobId,
        status: TeeJobStatus,
        datasource_id: String,
        params: WorkflowParams,
    ) -> Self {
        let now = Utc::now();
        Self {
            node_id,
            tee_node_id,
            dataset_id,
            job_id,
            status,
            err_msg: None,
            datasource_id,
            params,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the workflow kind, derived from the parameters.
    #[must_use]
    pub const fn kind(&self) -> TeeJobKind {
        self.params.kind()
    }

    /// Returns true once the underlying remote job has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_kind_follows_params() {
        let record = TeeManagement::new(
            NodeId::new("alice"),
            NodeId::new("tee"),
            DatasetId::new("table-a"),
            JobId::new("j1"),
            TeeJobStatus::Running,
            "default-data-source".to_string(),
            WorkflowParams::Push(PushParams {
                relative_path: "tee-table-a".to_string(),
            }),
        );
        assert_eq!(record.kind(), TeeJobKind::Push);
        assert!(!record.is_finished());
        assert!(!record.deleted);
    }
}
