//! Result materialization for successfully finished tasks.
//!
//! When a task succeeds, every output it declared becomes a dataset in the
//! catalog under a deterministic id. The materializer resolves those
//! datasets for each participating party and persists one typed result
//! record per resolved (node, dataset) pair, plus the kind-specific side
//! records.
//!
//! An unsupported declared type fails that pair alone: the error is logged
//! and counted, the remaining pairs still materialize, and no partial
//! records are written for the failed pair.

use std::sync::Arc;

use metrics::counter;

use parley_core::{DatasetId, JobId, NodeId, PlatformConfig, PlatformRole, ProjectId};

use crate::error::{Error, Result};
use crate::job::Task;
use crate::metrics::{labels, names};
use crate::remote::{DatasetCatalog, DatasetHandle, DatasetMeta};
use crate::result::{
    DatasetRegistration, DatasetSource, FedTableRecord, JoinMember, OwnershipRecord, ResultKind,
    ResultRecord,
};
use crate::status::TaskStatus;
use crate::store::ResultStore;

/// Reserved attribute key carrying a report's inline content.
const REPORT_CONTENT_ATTR: &str = "content";

/// Materializes typed result records from finished-successful tasks.
pub struct ResultMaterializer {
    role: PlatformRole,
    local_node_id: NodeId,
    catalog: Arc<dyn DatasetCatalog>,
    results: Arc<dyn ResultStore>,
}

impl ResultMaterializer {
    /// Creates a materializer for this deployment.
    #[must_use]
    pub fn new(
        config: &PlatformConfig,
        catalog: Arc<dyn DatasetCatalog>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            role: config.role,
            local_node_id: config.local_node_id.clone(),
            catalog,
            results,
        }
    }

    /// Materializes all outputs of a finished-successful task.
    ///
    /// A task that is not succeeded, has no outputs, or has no parties is a
    /// no-op. Per-pair classification failures are absorbed; catalog and
    /// store failures propagate.
    ///
    /// # Errors
    ///
    /// Returns an error when the batch catalog lookup or a persistence
    /// write fails.
    pub async fn materialize_task(
        &self,
        project_id: &ProjectId,
        job_id: &JobId,
        task: &Task,
    ) -> Result<()> {
        if task.status != TaskStatus::Succeeded {
            return Ok(());
        }
        if task.parties.is_empty() || task.outputs.is_empty() {
            return Ok(());
        }

        // N outputs x M parties candidate pairs, before edge filtering.
        let mut handles = Vec::with_capacity(task.outputs.len() * task.parties.len());
        for output in &task.outputs {
            let dataset_id = DatasetId::for_output(job_id, output);
            for party in &task.parties {
                handles.push(DatasetHandle::new(party.clone(), dataset_id.clone()));
            }
        }

        // An edge only materializes its own node's view.
        if self.role == PlatformRole::Edge {
            handles.retain(|handle| handle.node_id == self.local_node_id);
        }
        if handles.is_empty() {
            return Ok(());
        }

        tracing::info!(
            job_id = %job_id,
            task_id = %task.task_id,
            candidates = handles.len(),
            "resolving task outputs from the dataset catalog"
        );
        let resolved = self.catalog.find_by_handles(&handles).await?;

        for (handle, meta) in &resolved {
            match self
                .materialize_pair(project_id, job_id, task, handle, meta)
                .await
            {
                Ok(kind) => {
                    counter!(names::RESULTS_TOTAL, labels::KIND => kind.as_str()).increment(1);
                }
                Err(err @ Error::UnsupportedDatasetType { .. }) => {
                    // Fatal to this pair only; the stream must keep flowing.
                    tracing::error!(
                        job_id = %job_id,
                        task_id = %task.task_id,
                        node_id = %handle.node_id,
                        dataset_id = %handle.dataset_id,
                        error = %err,
                        "skipping unmappable task output"
                    );
                    counter!(
                        names::RESULT_FAILURES_TOTAL,
                        labels::REASON => "unsupported_dataset_type"
                    )
                    .increment(1);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Classifies and persists one resolved (node, dataset) pair.
    ///
    /// Nothing is written until the kind is known, so an unmapped type
    /// leaves no partial records behind.
    async fn materialize_pair(
        &self,
        project_id: &ProjectId,
        job_id: &JobId,
        task: &Task,
        handle: &DatasetHandle,
        meta: &DatasetMeta,
    ) -> Result<ResultKind> {
        let kind = ResultKind::from_declared_type(&meta.declared_type).ok_or_else(|| {
            Error::UnsupportedDatasetType {
                declared_type: meta.declared_type.clone(),
                dataset_id: meta.dataset_id.clone(),
            }
        })?;

        let content = match kind {
            ResultKind::Report => meta.attributes.get(REPORT_CONTENT_ATTR).cloned(),
            _ => None,
        };
        self.results
            .save_result(&ResultRecord {
                project_id: project_id.clone(),
                kind,
                node_id: meta.node_id.clone(),
                dataset_id: meta.dataset_id.clone(),
                job_id: job_id.clone(),
                task_id: task.task_id.clone(),
                content,
            })
            .await?;

        match kind {
            ResultKind::FederatedTable => {
                let joins = task
                    .parties
                    .iter()
                    .map(|party| JoinMember {
                        node_id: party.clone(),
                        dataset_id: meta.dataset_id.clone(),
                    })
                    .collect();
                self.results
                    .save_fed_table(&FedTableRecord {
                        project_id: project_id.clone(),
                        dataset_id: meta.dataset_id.clone(),
                        joins,
                    })
                    .await?;
                self.results
                    .save_registration(&DatasetRegistration {
                        project_id: project_id.clone(),
                        node_id: handle.node_id.clone(),
                        dataset_id: meta.dataset_id.clone(),
                        source: DatasetSource::CreatedByPlatform,
                        columns: meta.columns.clone(),
                    })
                    .await?;
            }
            ResultKind::Rule | ResultKind::Model => {
                self.results
                    .save_ownership(&OwnershipRecord {
                        project_id: project_id.clone(),
                        dataset_id: meta.dataset_id.clone(),
                        kind,
                    })
                    .await?;
            }
            ResultKind::Report => {}
        }
        Ok(kind)
    }
}
