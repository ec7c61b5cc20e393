//! Typed workflow parameters for TEE exchange jobs.
//!
//! Each workflow kind carries a fixed parameter record, parsed and validated
//! once at initiation time. The tagged representation replaces a free-form
//! string map; completion callbacks read fields directly instead of
//! re-parsing keys.

use serde::{Deserialize, Serialize};

use parley_core::{GrantId, JobId, ProjectId, TaskId};

use crate::result::ResultKind;
use crate::tee::TeeJobKind;

/// Placeholder approval token used when no vote outcome accompanies a pull.
pub const MOCK_APPROVAL_TOKEN: &str = "mock-approval";

/// Parameters of one TEE workflow step, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowParams {
    /// Authorization grant backing later pushes of a dataset.
    PushAuthorize(PushAuthorizeParams),
    /// Move a dataset into the TEE node.
    Push(PushParams),
    /// Move a computed result out of the TEE node.
    Pull(PullParams),
    /// Tear down a completed push.
    Delete(DeleteParams),
    /// Revoke a previously issued authorization.
    CancelAuthorize(CancelAuthorizeParams),
}

impl WorkflowParams {
    /// Returns the workflow kind these parameters belong to.
    #[must_use]
    pub const fn kind(&self) -> TeeJobKind {
        match self {
            Self::PushAuthorize(_) => TeeJobKind::PushAuthorize,
            Self::Push(_) => TeeJobKind::Push,
            Self::Pull(_) => TeeJobKind::Pull,
            Self::Delete(_) => TeeJobKind::Delete,
            Self::CancelAuthorize(_) => TeeJobKind::CancelAuthorize,
        }
    }
}

/// Parameters of an authorization step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAuthorizeParams {
    /// The grant issued by the authorization service.
    pub grant_id: GrantId,
}

/// Parameters of a push step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushParams {
    /// Where the staged dataset lands, relative to the datasource root.
    pub relative_path: String,
}

/// Parameters of a pull step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullParams {
    /// Where the result is written, relative to the datasource root.
    pub relative_path: String,
    /// Vote/approval token authorizing the pull; absent when none was
    /// recorded (a mock token is substituted at initiation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_token: Option<String>,
    /// The project the result belongs to.
    pub project_id: ProjectId,
    /// The originating project job.
    pub project_job_id: JobId,
    /// The originating task within that job.
    pub project_task_id: TaskId,
    /// The result kind to synchronize on completion.
    pub result_kind: ResultKind,
}

/// Parameters of a push-teardown step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteParams {
    /// The job id of the push record being torn down.
    pub target_push_job_id: JobId,
}

/// Parameters of an authorization-revocation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAuthorizeParams {
    /// The job id of the authorization record being revoked.
    pub target_authorize_job_id: JobId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_round_trip_exactly() {
        let params = WorkflowParams::Pull(PullParams {
            relative_path: "tee/alice-table".to_string(),
            approval_token: None,
            project_id: ProjectId::new("p1"),
            project_job_id: JobId::new("j1"),
            project_task_id: TaskId::new("t1"),
            result_kind: ResultKind::Model,
        });
        let json = serde_json::to_string(&params).unwrap();
        // Absent optional keys stay absent rather than present-with-empty-value.
        assert!(!json.contains("approval_token"));
        let parsed: WorkflowParams = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn params_tag_matches_kind() {
        let params = WorkflowParams::Delete(DeleteParams {
            target_push_job_id: JobId::new("push-1"),
        });
        assert_eq!(params.kind(), TeeJobKind::Delete);
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"kind\":\"delete\""));
    }
}
