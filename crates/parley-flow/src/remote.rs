//! Collaborator interfaces consumed by the reconciliation domain.
//!
//! Everything external lives behind one of these seams: the remote
//! orchestration service, the dataset catalog, node connectivity, and the
//! authorization service. Implementations adapt concrete transports; the
//! domain only sees these traits.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use parley_core::{DatasetId, GrantId, JobId, NodeId};

use crate::error::{Error, Result};
use crate::event::JobEvent;

/// Status message the remote service returns for accepted submissions.
const SUCCESS_STATUS_MESSAGE: &str = "success";

/// A (node, dataset) pair addressing one node's view of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatasetHandle {
    /// The node holding the dataset.
    pub node_id: NodeId,
    /// The dataset id at that node.
    pub dataset_id: DatasetId,
}

impl DatasetHandle {
    /// Creates a handle for the given node and dataset.
    #[must_use]
    pub fn new(node_id: NodeId, dataset_id: DatasetId) -> Self {
        Self {
            node_id,
            dataset_id,
        }
    }
}

/// One column of a dataset's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Declared column type.
    pub col_type: String,
    /// Free-form comment; empty when none.
    #[serde(default)]
    pub comment: String,
}

/// Dataset metadata as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    /// The dataset id.
    pub dataset_id: DatasetId,
    /// The node owning the dataset.
    pub node_id: NodeId,
    /// Human-readable dataset name.
    #[serde(default)]
    pub name: String,
    /// Declared storage type, e.g. `table`, `model`, `report`.
    pub declared_type: String,
    /// The datasource the dataset lives in.
    #[serde(default)]
    pub datasource_id: String,
    /// Path of the dataset relative to its datasource.
    #[serde(default)]
    pub relative_path: String,
    /// Column schema.
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
    /// Free-form attributes attached by producers.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Batch lookup and listing against the dataset catalog.
#[async_trait]
pub trait DatasetCatalog: Send + Sync + 'static {
    /// Resolves metadata for each handle that exists.
    ///
    /// Handles with no backing dataset are absent from the returned map;
    /// that is not an error.
    async fn find_by_handles(
        &self,
        handles: &[DatasetHandle],
    ) -> Result<BTreeMap<DatasetHandle, DatasetMeta>>;

    /// Lists all datasets registered at one node.
    async fn list_by_node(&self, node_id: &NodeId) -> Result<Vec<DatasetMeta>>;
}

/// Status envelope returned by the remote job-submission call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEnvelope {
    /// Zero for accepted submissions.
    pub code: i32,
    /// Status message; anything other than "success" (or empty) is a failure.
    #[serde(default)]
    pub message: String,
}

impl StatusEnvelope {
    /// Checks the envelope and maps rejections to [`Error::JobCreationFailed`].
    ///
    /// # Errors
    ///
    /// Returns `JobCreationFailed` when the code is non-zero or the message
    /// is present and not "success" (case-insensitive).
    pub fn ensure_success(&self, job_id: &JobId) -> Result<()> {
        let message_ok =
            self.message.is_empty() || self.message.eq_ignore_ascii_case(SUCCESS_STATUS_MESSAGE);
        if self.code != 0 || !message_ok {
            return Err(Error::JobCreationFailed {
                job_id: job_id.clone(),
                message: self.message.clone(),
            });
        }
        Ok(())
    }
}

/// A job submission to the remote orchestration service.
///
/// The service translates the payload into an executable task graph; this
/// system never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSubmission {
    /// The job id the submission runs under.
    pub job_id: JobId,
    /// The node initiating the job.
    pub initiator: NodeId,
    /// All participating parties.
    pub parties: Vec<NodeId>,
    /// Opaque task-graph payload.
    pub payload: serde_json::Value,
}

/// The remote orchestration service.
#[async_trait]
pub trait OrchestratorClient: Send + Sync + 'static {
    /// Opens the job lifecycle event stream.
    ///
    /// The stream yields events strictly in delivery order. A transport
    /// failure surfaces as an `Err` item (or end of stream); reconnection is
    /// the supervisor's concern, not the stream's.
    async fn watch_jobs(&self) -> Result<BoxStream<'static, Result<JobEvent>>>;

    /// Submits a job synchronously, returning the service's status envelope.
    ///
    /// A response carrying no status envelope at all is a rejection;
    /// implementations map it to a non-zero code rather than a default.
    async fn create_job(&self, submission: &JobSubmission) -> Result<StatusEnvelope>;
}

/// Node connectivity checks.
#[async_trait]
pub trait NodeRoutes: Send + Sync + 'static {
    /// Returns true when a route from `source` to `target` is configured.
    async fn route_exists(&self, source: &NodeId, target: &NodeId) -> Result<bool>;
}

/// Data-sharing grants between a source node and the TEE node.
#[async_trait]
pub trait GrantService: Send + Sync + 'static {
    /// Creates a grant allowing `target` to read `dataset` from `source`.
    async fn create_grant(
        &self,
        source: &NodeId,
        target: &NodeId,
        dataset: &DatasetId,
    ) -> Result<GrantId>;

    /// Returns true when the grant still exists upstream.
    ///
    /// Callers treat a lookup failure the same as a missing grant; a stale
    /// or revoked grant must not abort the workflow.
    async fn query_grant(&self, source: &NodeId, grant: &GrantId) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_accepts_success_message_case_insensitively() {
        let envelope = StatusEnvelope {
            code: 0,
            message: "SUCCESS".to_string(),
        };
        assert!(envelope.ensure_success(&JobId::new("j1")).is_ok());
    }

    #[test]
    fn envelope_accepts_empty_message() {
        let envelope = StatusEnvelope {
            code: 0,
            message: String::new(),
        };
        assert!(envelope.ensure_success(&JobId::new("j1")).is_ok());
    }

    #[test]
    fn envelope_rejects_nonzero_code() {
        let envelope = StatusEnvelope {
            code: 11,
            message: "success".to_string(),
        };
        let err = envelope.ensure_success(&JobId::new("j1")).unwrap_err();
        assert!(matches!(err, Error::JobCreationFailed { .. }));
    }

    #[test]
    fn envelope_rejects_failure_message() {
        let envelope = StatusEnvelope {
            code: 0,
            message: "quota exceeded".to_string(),
        };
        assert!(envelope.ensure_success(&JobId::new("j1")).is_err());
    }
}
