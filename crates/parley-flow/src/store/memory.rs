//! In-memory store implementations for testing and embedded use.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: no durability, single-process only
//! - State is lost when the process exits

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use parley_core::{DatasetId, JobId, NodeId};

use crate::error::{Error, Result};
use crate::job::Job;
use crate::result::{DatasetRegistration, FedTableRecord, OwnershipRecord, ResultRecord};
use crate::store::{JobStore, ResultStore, TeeStore};
use crate::tee::{TeeJobKind, TeeManagement};

fn poisoned<T>(_: PoisonError<T>) -> Error {
    Error::storage("store lock poisoned")
}

/// In-memory job store.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<BTreeMap<JobId, Job>>,
    saves: Mutex<u64>,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a job, without counting as a reconcile save.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn insert(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.job_id.clone(), job);
    }

    /// Returns how many times `save` has been called.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        *self.saves.lock().unwrap()
    }

    /// Returns a snapshot of the stored job, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.jobs.lock().unwrap().get(job_id).cloned()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn find_by_job_id(&self, job_id: &JobId) -> Result<Option<Job>> {
        Ok(self.jobs.lock().map_err(poisoned)?.get(job_id).cloned())
    }

    async fn save(&self, job: &Job) -> Result<()> {
        self.jobs
            .lock()
            .map_err(poisoned)?
            .insert(job.job_id.clone(), job.clone());
        *self.saves.lock().map_err(poisoned)? += 1;
        Ok(())
    }
}

/// In-memory result store collecting every write for inspection.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    results: Mutex<Vec<ResultRecord>>,
    fed_tables: Mutex<Vec<FedTableRecord>>,
    registrations: Mutex<Vec<DatasetRegistration>>,
    ownerships: Mutex<Vec<OwnershipRecord>>,
}

impl InMemoryResultStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all persisted result records.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn results(&self) -> Vec<ResultRecord> {
        self.results.lock().unwrap().clone()
    }

    /// Returns all persisted federated table records.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn fed_tables(&self) -> Vec<FedTableRecord> {
        self.fed_tables.lock().unwrap().clone()
    }

    /// Returns all persisted dataset registrations.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn registrations(&self) -> Vec<DatasetRegistration> {
        self.registrations.lock().unwrap().clone()
    }

    /// Returns all persisted ownership records.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn ownerships(&self) -> Vec<OwnershipRecord> {
        self.ownerships.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn save_result(&self, record: &ResultRecord) -> Result<()> {
        self.results.lock().map_err(poisoned)?.push(record.clone());
        Ok(())
    }

    async fn save_fed_table(&self, record: &FedTableRecord) -> Result<()> {
        self.fed_tables
            .lock()
            .map_err(poisoned)?
            .push(record.clone());
        Ok(())
    }

    async fn save_registration(&self, record: &DatasetRegistration) -> Result<()> {
        self.registrations
            .lock()
            .map_err(poisoned)?
            .push(record.clone());
        Ok(())
    }

    async fn save_ownership(&self, record: &OwnershipRecord) -> Result<()> {
        self.ownerships
            .lock()
            .map_err(poisoned)?
            .push(record.clone());
        Ok(())
    }
}

/// In-memory TEE management store keyed by workflow job id.
#[derive(Debug, Default)]
pub struct InMemoryTeeStore {
    records: Mutex<BTreeMap<JobId, TeeManagement>>,
}

impl InMemoryTeeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the stored record, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn get(&self, job_id: &JobId) -> Option<TeeManagement> {
        self.records.lock().unwrap().get(job_id).cloned()
    }

    /// Returns all stored records in job-id order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn all(&self) -> Vec<TeeManagement> {
        self.records.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl TeeStore for InMemoryTeeStore {
    async fn save(&self, record: &TeeManagement) -> Result<()> {
        self.records
            .lock()
            .map_err(poisoned)?
            .insert(record.job_id.clone(), record.clone());
        Ok(())
    }

    async fn find_by_job_id(&self, job_id: &JobId) -> Result<Option<TeeManagement>> {
        Ok(self.records.lock().map_err(poisoned)?.get(job_id).cloned())
    }

    async fn find_latest_by_kind(
        &self,
        node_id: &NodeId,
        tee_node_id: &NodeId,
        dataset_id: &DatasetId,
        kind: TeeJobKind,
    ) -> Result<Option<TeeManagement>> {
        Ok(self
            .records
            .lock()
            .map_err(poisoned)?
            .values()
            .filter(|r| {
                !r.deleted
                    && r.kind() == kind
                    && &r.node_id == node_id
                    && &r.tee_node_id == tee_node_id
                    && &r.dataset_id == dataset_id
            })
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn list_push_records(
        &self,
        node_id: &NodeId,
        tee_node_id: &NodeId,
        dataset_ids: &[DatasetId],
    ) -> Result<Vec<TeeManagement>> {
        Ok(self
            .records
            .lock()
            .map_err(poisoned)?
            .values()
            .filter(|r| {
                !r.deleted
                    && r.kind() == TeeJobKind::Push
                    && &r.node_id == node_id
                    && &r.tee_node_id == tee_node_id
                    && dataset_ids.contains(&r.dataset_id)
            })
            .cloned()
            .collect())
    }
}
