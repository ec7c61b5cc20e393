//! Orchestration of TEE exchange workflow steps.
//!
//! Initiation submits a remote job and persists the tracking record through
//! the replicator, so the same code path serves center, edge, and autonomy
//! deployments. Completion arrives through the shared job event stream and
//! is applied by [`TeeWorkflow::handle_event`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;

use parley_core::{DatasetId, JobId, NodeId, PlatformConfig, ProjectId, TaskId};

use crate::error::{Error, Result};
use crate::event::{EventKind, JobEvent, JobStatusSnapshot};
use crate::metrics::{labels, names};
use crate::remote::{GrantService, JobSubmission, NodeRoutes, OrchestratorClient};
use crate::replicate::Replicator;
use crate::result::{ResultKind, ResultRecord};
use crate::status::TeeJobStatus;
use crate::store::{ResultStore, TeeStore};
use crate::tee::{
    PullParams, PushAuthorizeParams, PushParams, TeeJobKind, TeeManagement, WorkflowParams,
    MOCK_APPROVAL_TOKEN,
};

/// Request to move a dataset into the TEE node.
#[derive(Debug, Clone)]
pub struct PushDatasetRequest {
    /// The node pushing its dataset.
    pub node_id: NodeId,
    /// The dataset to push, by its id at the source node.
    pub dataset_id: DatasetId,
    /// Target TEE node; defaults to the configured one.
    pub tee_node_id: Option<NodeId>,
    /// Datasource the staged copy lands in; defaults to the configured one.
    pub datasource_id: Option<String>,
    /// Path of the staged copy; defaults to the staged dataset id.
    pub relative_path: Option<String>,
}

/// Request to move a computed result out of the TEE node.
#[derive(Debug, Clone)]
pub struct PullResultRequest {
    /// The node receiving the result.
    pub node_id: NodeId,
    /// The result dataset, by its id at the TEE node.
    pub dataset_id: DatasetId,
    /// Source TEE node; defaults to the configured one.
    pub tee_node_id: Option<NodeId>,
    /// Datasource the result lands in; defaults to the configured one.
    pub datasource_id: Option<String>,
    /// Path of the pulled result; defaults to the staged dataset id.
    pub relative_path: Option<String>,
    /// Approval token from the vote that authorized the pull; a placeholder
    /// token is substituted when absent.
    pub approval_token: Option<String>,
    /// The project the result belongs to.
    pub project_id: ProjectId,
    /// The originating project job.
    pub project_job_id: JobId,
    /// The originating task within that job.
    pub project_task_id: TaskId,
    /// The result kind to synchronize once the pull completes.
    pub result_kind: ResultKind,
}

/// Orchestrates TEE exchange workflow steps end to end.
pub struct TeeWorkflow {
    config: PlatformConfig,
    store: Arc<dyn TeeStore>,
    results: Arc<dyn ResultStore>,
    routes: Arc<dyn NodeRoutes>,
    grants: Arc<dyn GrantService>,
    orchestrator: Arc<dyn OrchestratorClient>,
    replicator: Replicator,
}

impl TeeWorkflow {
    /// Wires the workflow orchestrator to its collaborators.
    #[must_use]
    pub fn new(
        config: PlatformConfig,
        store: Arc<dyn TeeStore>,
        results: Arc<dyn ResultStore>,
        routes: Arc<dyn NodeRoutes>,
        grants: Arc<dyn GrantService>,
        orchestrator: Arc<dyn OrchestratorClient>,
        replicator: Replicator,
    ) -> Self {
        Self {
            config,
            store,
            results,
            routes,
            grants,
            orchestrator,
            replicator,
        }
    }

    /// Initiates a push of a dataset into the TEE node.
    ///
    /// Requires a configured route in both directions. An existing
    /// authorization is reused when its grant is still valid upstream; a
    /// stale or unverifiable grant falls back to issuing a fresh one. The
    /// tracking records are persisted before the remote job is submitted.
    ///
    /// Returns the job id the push runs under.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RouteNotConfigured`] when either direction is
    /// missing, [`Error::JobCreationFailed`] when the remote service rejects
    /// the submission, and storage/replication errors from persistence.
    pub async fn push_dataset_to_tee(&self, request: PushDatasetRequest) -> Result<JobId> {
        let node = request.node_id;
        let tee = request
            .tee_node_id
            .unwrap_or_else(|| self.config.tee_node_id.clone());
        self.ensure_bidirectional_route(&node, &tee).await?;

        let staged = request.dataset_id.staged_at(&tee);
        let relative_path = request
            .relative_path
            .unwrap_or_else(|| staged.as_str().to_string());
        let datasource_id = request
            .datasource_id
            .unwrap_or_else(|| self.config.default_datasource_id.clone());

        if !self.has_valid_grant(&node, &tee, &request.dataset_id).await? {
            let grant_id = self
                .grants
                .create_grant(&node, &tee, &request.dataset_id)
                .await?;
            let authorize = TeeManagement::new(
                node.clone(),
                tee.clone(),
                request.dataset_id.clone(),
                JobId::generate(),
                TeeJobStatus::Success,
                datasource_id.clone(),
                WorkflowParams::PushAuthorize(PushAuthorizeParams { grant_id }),
            );
            self.replicator.save_management(&authorize).await?;
            counter!(names::TEE_JOBS_TOTAL, labels::KIND => "push_authorize").increment(1);
        }

        let push_job_id = JobId::generate();
        let push = TeeManagement::new(
            node.clone(),
            tee.clone(),
            staged.clone(),
            push_job_id.clone(),
            TeeJobStatus::Running,
            datasource_id,
            WorkflowParams::Push(PushParams {
                relative_path: relative_path.clone(),
            }),
        );
        self.replicator.save_management(&push).await?;

        self.submit(
            &push_job_id,
            &node,
            &tee,
            serde_json::json!({
                "action": "tee_push",
                "dataset_id": staged,
                "relative_path": relative_path,
            }),
        )
        .await?;
        counter!(names::TEE_JOBS_TOTAL, labels::KIND => "push").increment(1);
        tracing::info!(job_id = %push_job_id, node_id = %node, "initiated push to tee node");
        Ok(push_job_id)
    }

    /// Initiates a pull of a computed result out of the TEE node.
    ///
    /// The tracking record carries everything the completion callback needs
    /// to synchronize the result; no context is re-derived later.
    ///
    /// Returns the job id the pull runs under.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobCreationFailed`] when the remote service rejects
    /// the submission, and storage/replication errors from persistence.
    pub async fn pull_result_from_tee(&self, request: PullResultRequest) -> Result<JobId> {
        let node = request.node_id;
        let tee = request
            .tee_node_id
            .unwrap_or_else(|| self.config.tee_node_id.clone());

        let staged = request.dataset_id.staged_at(&node);
        let relative_path = request
            .relative_path
            .unwrap_or_else(|| staged.as_str().to_string());
        let datasource_id = request
            .datasource_id
            .unwrap_or_else(|| self.config.default_datasource_id.clone());
        let approval_token = request
            .approval_token
            .unwrap_or_else(|| MOCK_APPROVAL_TOKEN.to_string());

        let pull_job_id = JobId::generate();
        let record = TeeManagement::new(
            node.clone(),
            tee.clone(),
            staged.clone(),
            pull_job_id.clone(),
            TeeJobStatus::Running,
            datasource_id,
            WorkflowParams::Pull(PullParams {
                relative_path: relative_path.clone(),
                approval_token: Some(approval_token),
                project_id: request.project_id,
                project_job_id: request.project_job_id,
                project_task_id: request.project_task_id,
                result_kind: request.result_kind,
            }),
        );
        self.replicator.save_management(&record).await?;

        self.submit(
            &pull_job_id,
            &node,
            &tee,
            serde_json::json!({
                "action": "tee_pull",
                "dataset_id": staged,
                "relative_path": relative_path,
            }),
        )
        .await?;
        counter!(names::TEE_JOBS_TOTAL, labels::KIND => "pull").increment(1);
        tracing::info!(job_id = %pull_job_id, node_id = %node, "initiated pull from tee node");
        Ok(pull_job_id)
    }

    /// Applies a job event to the TEE management record tracking it.
    ///
    /// Returns `false` when no record tracks the event's job, leaving the
    /// event to the regular reconciler. Returns `true` once the event is
    /// claimed, whether or not it changed anything.
    ///
    /// # Errors
    ///
    /// Returns storage/replication errors from persistence; result
    /// synchronization failures on pull completion propagate as well.
    pub async fn handle_event(&self, event: &JobEvent) -> Result<bool> {
        let Some(mut record) = self.store.find_by_job_id(&event.job_id).await? else {
            return Ok(false);
        };
        if record.is_finished() {
            return Ok(true);
        }

        // Only added/modified snapshots carry state a workflow record can
        // act on; every other event kind is claimed without change.
        let status = match event.kind {
            EventKind::Added | EventKind::Modified => {
                TeeJobStatus::from_remote_state(&event.status.state)
            }
            EventKind::Deleted | EventKind::Error | EventKind::Unrecognized => return Ok(true),
        };
        if !status.is_terminal() {
            return Ok(true);
        }
        // The remote scheduler can report a settled state ahead of the end
        // timestamp; wait for the snapshot that carries it.
        if !event.status.has_end_time() {
            tracing::info!(
                job_id = %event.job_id,
                state = %event.status.state,
                "tee job reported finished without an end time, waiting"
            );
            return Ok(true);
        }

        record.status = status;
        record.err_msg = snapshot_error(&event.status);
        record.updated_at = parse_end_time(&event.status.end_time);
        self.replicator.save_management(&record).await?;
        counter!(
            names::TEE_JOBS_TOTAL,
            labels::KIND => record.kind().to_string(),
            labels::STATUS => status.to_string()
        )
        .increment(1);
        tracing::info!(
            job_id = %record.job_id,
            kind = %record.kind(),
            status = %status,
            "tee job finished"
        );

        if status == TeeJobStatus::Success {
            match &record.params {
                WorkflowParams::Pull(params) => self.sync_pull_result(&record, params).await?,
                WorkflowParams::Delete(params) => {
                    self.cascade_soft_delete(&params.target_push_job_id).await?;
                }
                WorkflowParams::CancelAuthorize(params) => {
                    self.cascade_soft_delete(&params.target_authorize_job_id)
                        .await?;
                }
                WorkflowParams::PushAuthorize(_) | WorkflowParams::Push(_) => {}
            }
        }
        Ok(true)
    }

    async fn ensure_bidirectional_route(&self, node: &NodeId, tee: &NodeId) -> Result<()> {
        if !self.routes.route_exists(node, tee).await? {
            return Err(Error::RouteNotConfigured {
                source_node: node.clone(),
                target_node: tee.clone(),
            });
        }
        if !self.routes.route_exists(tee, node).await? {
            return Err(Error::RouteNotConfigured {
                source_node: tee.clone(),
                target_node: node.clone(),
            });
        }
        Ok(())
    }

    /// Checks whether a reusable authorization exists for the dataset.
    ///
    /// A grant lookup failure counts as a missing grant; the workflow must
    /// recover from stale state rather than abort.
    async fn has_valid_grant(
        &self,
        node: &NodeId,
        tee: &NodeId,
        dataset: &DatasetId,
    ) -> Result<bool> {
        let Some(existing) = self
            .store
            .find_latest_by_kind(node, tee, dataset, TeeJobKind::PushAuthorize)
            .await?
        else {
            return Ok(false);
        };
        let WorkflowParams::PushAuthorize(params) = &existing.params else {
            return Ok(false);
        };
        match self.grants.query_grant(node, &params.grant_id).await {
            Ok(valid) => Ok(valid),
            Err(err) => {
                tracing::warn!(
                    node_id = %node,
                    grant_id = %params.grant_id,
                    error = %err,
                    "grant lookup failed, issuing a fresh grant"
                );
                Ok(false)
            }
        }
    }

    async fn submit(
        &self,
        job_id: &JobId,
        node: &NodeId,
        tee: &NodeId,
        payload: serde_json::Value,
    ) -> Result<()> {
        let submission = JobSubmission {
            job_id: job_id.clone(),
            initiator: node.clone(),
            parties: vec![node.clone(), tee.clone()],
            payload,
        };
        let envelope = self.orchestrator.create_job(&submission).await?;
        envelope.ensure_success(job_id)
    }

    /// Synchronizes the pulled result into the local result store.
    async fn sync_pull_result(&self, record: &TeeManagement, params: &PullParams) -> Result<()> {
        self.results
            .save_result(&ResultRecord {
                project_id: params.project_id.clone(),
                kind: params.result_kind,
                node_id: record.node_id.clone(),
                dataset_id: record.dataset_id.clone(),
                job_id: params.project_job_id.clone(),
                task_id: params.project_task_id.clone(),
                content: None,
            })
            .await?;
        tracing::info!(
            job_id = %record.job_id,
            dataset_id = %record.dataset_id,
            "synchronized pulled result"
        );
        Ok(())
    }

    /// Soft-deletes the record a teardown step targeted.
    ///
    /// Only the center holds the authoritative replica, so only the center
    /// cascades. A missing target is a no-op: the record may have been torn
    /// down by an earlier, replayed completion.
    async fn cascade_soft_delete(&self, target_job_id: &JobId) -> Result<()> {
        if !self.replicator.role().is_center() {
            return Ok(());
        }
        let Some(mut target) = self.store.find_by_job_id(target_job_id).await? else {
            tracing::info!(
                target_job_id = %target_job_id,
                "teardown target already gone, nothing to soft-delete"
            );
            return Ok(());
        };
        target.deleted = true;
        target.updated_at = Utc::now();
        self.store.save(&target).await?;
        tracing::info!(target_job_id = %target_job_id, "soft-deleted teardown target");
        Ok(())
    }
}

fn snapshot_error(snapshot: &JobStatusSnapshot) -> Option<String> {
    if !snapshot.err_msg.is_empty() {
        return Some(snapshot.err_msg.clone());
    }
    snapshot
        .tasks
        .iter()
        .find(|task| !task.err_msg.is_empty())
        .map(|task| task.err_msg.clone())
}

fn parse_end_time(end_time: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(end_time)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
