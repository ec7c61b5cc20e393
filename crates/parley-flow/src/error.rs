//! Error types for the reconciliation domain.

use parley_core::{DatasetId, JobId, NodeId};

/// The result type used throughout parley-flow.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in reconciliation and workflow operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A materialized dataset's declared type maps to no known result kind.
    ///
    /// Fatal to that output's processing, not to the whole task.
    #[error("unsupported dataset type '{declared_type}' for dataset {dataset_id}")]
    UnsupportedDatasetType {
        /// The declared storage type reported by the catalog.
        declared_type: String,
        /// The dataset whose type could not be classified.
        dataset_id: DatasetId,
    },

    /// The remote orchestration service rejected a job submission.
    #[error("job creation failed for {job_id}: {message}")]
    JobCreationFailed {
        /// The job id the submission carried.
        job_id: JobId,
        /// The status message returned by the remote service.
        message: String,
    },

    /// No bidirectional route is configured between two nodes.
    ///
    /// Raised before any remote job is submitted; never retried silently.
    #[error("no route configured between {source_node} and {target_node}")]
    RouteNotConfigured {
        /// The source node of the missing route.
        source_node: NodeId,
        /// The target node of the missing route.
        target_node: NodeId,
    },

    /// A cross-node aggregate query failed as a whole.
    ///
    /// Individual node failures below the aggregate are absorbed and
    /// reported as partial results instead of raising this.
    #[error("concurrent aggregation failed: {message}")]
    ConcurrentAggregationFailed {
        /// Description of the failure.
        message: String,
    },

    /// A cross-node aggregate query exceeded its overall deadline.
    #[error("concurrent aggregation timed out after {timeout_secs}s")]
    ConcurrentAggregationTimeout {
        /// The deadline that elapsed, in seconds.
        timeout_secs: u64,
    },

    /// A cross-node aggregate query was interrupted before completion.
    #[error("concurrent aggregation interrupted: {message}")]
    ConcurrentAggregationInterrupted {
        /// Description of the interruption.
        message: String,
    },

    /// The requested record was not found.
    #[error("not found: {resource_type} with id {id}")]
    NotFound {
        /// The type of record that was not found.
        resource_type: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A persistence operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A replication forward to the center deployment failed.
    #[error("replication error: {message}")]
    Replication {
        /// Description of the replication failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A remote collaborator call failed.
    #[error("remote call failed: {message}")]
    Remote {
        /// Description of the remote failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A configuration value was missing or malformed.
    #[error(transparent)]
    Core(#[from] parley_core::Error),
}

impl Error {
    /// Creates a not-found error for the given resource type and id.
    #[must_use]
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a storage error wrapping an underlying cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a replication error wrapping an underlying cause.
    #[must_use]
    pub fn replication(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Replication {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a remote-call error with the given message.
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            source: None,
        }
    }
}
