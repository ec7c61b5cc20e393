//! Persistence seams for the reconciliation domain.
//!
//! Each aggregate gets its own narrow trait; components receive only the
//! stores they mutate. Implementations decide the technology — the domain
//! contract is create/read/update by identity plus the foreign-key lookups
//! the reconciler and TEE workflow need.
//!
//! All mutations happen under the unit-of-work boundary of a single
//! reconciling operation: one event in, one persisted update out. No
//! long-held locks; different jobs touch disjoint aggregates.

pub mod memory;

use async_trait::async_trait;

use parley_core::{DatasetId, JobId, NodeId};

use crate::error::Result;
use crate::job::Job;
use crate::result::{DatasetRegistration, FedTableRecord, OwnershipRecord, ResultRecord};
use crate::tee::{TeeJobKind, TeeManagement};

/// Persistence for job aggregates (jobs own their tasks).
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Looks up a job by the remote-assigned job id.
    async fn find_by_job_id(&self, job_id: &JobId) -> Result<Option<Job>>;

    /// Persists the full job aggregate, replacing any previous state.
    async fn save(&self, job: &Job) -> Result<()>;
}

/// Persistence for materialized results and their kind-specific side records.
#[async_trait]
pub trait ResultStore: Send + Sync + 'static {
    /// Persists one result record.
    async fn save_result(&self, record: &ResultRecord) -> Result<()>;

    /// Persists a federated table's join membership.
    async fn save_fed_table(&self, record: &FedTableRecord) -> Result<()>;

    /// Persists a per-node dataset registration.
    async fn save_registration(&self, record: &DatasetRegistration) -> Result<()>;

    /// Persists a bare ownership record for a rule or model.
    async fn save_ownership(&self, record: &OwnershipRecord) -> Result<()>;
}

/// Persistence for TEE workflow management records.
#[async_trait]
pub trait TeeStore: Send + Sync + 'static {
    /// Persists a record, replacing any previous state for the same job id.
    async fn save(&self, record: &TeeManagement) -> Result<()>;

    /// Looks up the record tracking the given remote job.
    async fn find_by_job_id(&self, job_id: &JobId) -> Result<Option<TeeManagement>>;

    /// Finds the newest non-deleted record of one kind for a
    /// (node, tee node, dataset) triple.
    async fn find_latest_by_kind(
        &self,
        node_id: &NodeId,
        tee_node_id: &NodeId,
        dataset_id: &DatasetId,
        kind: TeeJobKind,
    ) -> Result<Option<TeeManagement>>;

    /// Lists non-deleted push records for a batch of datasets.
    async fn list_push_records(
        &self,
        node_id: &NodeId,
        tee_node_id: &NodeId,
        dataset_ids: &[DatasetId],
    ) -> Result<Vec<TeeManagement>>;
}
