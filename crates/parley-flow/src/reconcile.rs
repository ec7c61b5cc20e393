//! The job reconciler: one event in, one persisted update out.
//!
//! Every event from the watch stream passes through [`JobReconciler::handle_event`].
//! The reconciler is the only writer of job aggregates; it applies the
//! event's full snapshot, folds per-task state, triggers result
//! materialization for newly succeeded tasks, and persists exactly one save
//! per applied event. TEE workflow jobs are dispatched to the workflow
//! orchestrator before any job lookup, identified solely by the existence of
//! their management record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};

use crate::error::Result;
use crate::event::{EventKind, JobEvent};
use crate::job::{task_failure_reason, Job};
use crate::materialize::ResultMaterializer;
use crate::metrics::{labels, names, TimingGuard};
use crate::status::{is_finished_state, JobStatus, TaskStatus};
use crate::store::JobStore;
use crate::tee::TeeWorkflow;

/// Reconciles remote job events into local job state.
pub struct JobReconciler {
    store: Arc<dyn JobStore>,
    materializer: Arc<ResultMaterializer>,
    tee: Arc<TeeWorkflow>,
}

impl JobReconciler {
    /// Wires the reconciler to its store and downstream processors.
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        materializer: Arc<ResultMaterializer>,
        tee: Arc<TeeWorkflow>,
    ) -> Self {
        Self {
            store,
            materializer,
            tee,
        }
    }

    /// Applies one job event.
    ///
    /// Diagnostic events and events for unknown jobs are discarded. Events
    /// for jobs tracked by a TEE management record go to the workflow
    /// orchestrator instead. Terminal jobs absorb replayed events without
    /// change. Everything else folds the snapshot into the aggregate and
    /// persists it once.
    ///
    /// # Errors
    ///
    /// Returns storage errors from lookup or save, and materialization or
    /// workflow errors from the downstream processors.
    pub async fn handle_event(&self, event: &JobEvent) -> Result<()> {
        let _timing = TimingGuard::new(|elapsed| {
            histogram!(names::RECONCILE_SECONDS, labels::PATH => "job")
                .record(elapsed.as_secs_f64());
        });

        if event.kind.is_diagnostic() {
            tracing::warn!(kind = %event.kind, job_id = %event.job_id, "discarding diagnostic event");
            self.count(event, "diagnostic");
            return Ok(());
        }

        // TEE workflow jobs never have a job aggregate; dispatch first.
        if self.tee.handle_event(event).await? {
            self.count(event, "tee");
            return Ok(());
        }

        let Some(mut job) = self.store.find_by_job_id(&event.job_id).await? else {
            tracing::info!(job_id = %event.job_id, "event for a job this deployment does not track");
            self.count(event, "dropped");
            return Ok(());
        };
        if job.is_finished() {
            self.count(event, "terminal");
            return Ok(());
        }

        if event.kind == EventKind::Deleted {
            job.stop();
            self.store.save(&job).await?;
            tracing::info!(job_id = %job.job_id, "job deleted remotely, stopped");
            self.count(event, "applied");
            return Ok(());
        }
        self.apply_snapshot(event, &mut job).await
    }

    /// Folds an added/modified snapshot into the job aggregate.
    async fn apply_snapshot(&self, event: &JobEvent, job: &mut Job) -> Result<()> {
        let snapshot = &event.status;

        // The remote scheduler can settle the job-level state before every
        // task has converged; only a populated end time marks completion.
        // Task state still folds in the meantime.
        let premature_finish = is_finished_state(&snapshot.state) && !snapshot.has_end_time();
        if premature_finish {
            tracing::info!(
                job_id = %job.job_id,
                state = %snapshot.state,
                "job reported finished without an end time, keeping job status"
            );
        } else {
            job.status = JobStatus::from_remote_state(&snapshot.state);
            if !snapshot.err_msg.is_empty() {
                job.err_msg = Some(snapshot.err_msg.clone());
            }
        }
        if snapshot.has_end_time() {
            job.finished_at = Some(parse_end_time(&snapshot.end_time));
        }

        for task_snapshot in &snapshot.tasks {
            if !job.tasks.contains_key(&task_snapshot.task_id) {
                tracing::warn!(
                    job_id = %job.job_id,
                    task_id = %task_snapshot.task_id,
                    "event references a task this job does not know, skipping"
                );
                continue;
            }
            let status = TaskStatus::from_remote_state(&task_snapshot.state);
            let previous = job.task_statuses.get(&task_snapshot.task_id).copied();
            let failure_reason =
                (status == TaskStatus::Failed).then(|| task_failure_reason(task_snapshot));
            job.transform_task_status(&task_snapshot.task_id, status, failure_reason);

            if status == TaskStatus::Succeeded && previous != Some(TaskStatus::Succeeded) {
                let task = job.tasks[&task_snapshot.task_id].clone();
                self.materializer
                    .materialize_task(&job.project_id, &job.job_id, &task)
                    .await?;
            }
        }

        self.store.save(job).await?;
        self.count(event, if premature_finish { "deferred" } else { "applied" });
        Ok(())
    }

    fn count(&self, event: &JobEvent, outcome: &'static str) {
        counter!(
            names::JOB_EVENTS_TOTAL,
            labels::KIND => event.kind.to_string(),
            labels::OUTCOME => outcome
        )
        .increment(1);
    }
}

fn parse_end_time(end_time: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(end_time)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use futures::StreamExt;

    use parley_core::{
        DatasetId, GrantId, JobId, NodeId, PlatformConfig, PlatformRole, ProjectId, TaskId,
    };

    use crate::event::{JobStatusSnapshot, PartyStatus, TaskStatusSnapshot};
    use crate::job::Task;
    use crate::remote::{
        DatasetCatalog, DatasetHandle, DatasetMeta, GrantService, JobSubmission, NodeRoutes,
        OrchestratorClient, StatusEnvelope,
    };
    use crate::replicate::Replicator;
    use crate::store::memory::{InMemoryJobStore, InMemoryResultStore, InMemoryTeeStore};
    use crate::store::TeeStore;
    use crate::tee::{PushParams, TeeManagement, WorkflowParams};
    use crate::status::TeeJobStatus;

    struct EmptyCatalog;

    #[async_trait]
    impl DatasetCatalog for EmptyCatalog {
        async fn find_by_handles(
            &self,
            _handles: &[DatasetHandle],
        ) -> Result<BTreeMap<DatasetHandle, DatasetMeta>> {
            Ok(BTreeMap::new())
        }

        async fn list_by_node(&self, _node_id: &NodeId) -> Result<Vec<DatasetMeta>> {
            Ok(Vec::new())
        }
    }

    struct AlwaysRouted;

    #[async_trait]
    impl NodeRoutes for AlwaysRouted {
        async fn route_exists(&self, _source: &NodeId, _target: &NodeId) -> Result<bool> {
            Ok(true)
        }
    }

    struct StaticGrants;

    #[async_trait]
    impl GrantService for StaticGrants {
        async fn create_grant(
            &self,
            _source: &NodeId,
            _target: &NodeId,
            _dataset: &DatasetId,
        ) -> Result<GrantId> {
            Ok(GrantId::new("g1"))
        }

        async fn query_grant(&self, _source: &NodeId, _grant: &GrantId) -> Result<bool> {
            Ok(true)
        }
    }

    struct AcceptingOrchestrator {
        submissions: Mutex<Vec<JobSubmission>>,
    }

    #[async_trait]
    impl OrchestratorClient for AcceptingOrchestrator {
        async fn watch_jobs(&self) -> Result<BoxStream<'static, Result<JobEvent>>> {
            Ok(futures::stream::empty().boxed())
        }

        async fn create_job(&self, submission: &JobSubmission) -> Result<StatusEnvelope> {
            self.submissions.lock().unwrap().push(submission.clone());
            Ok(StatusEnvelope {
                code: 0,
                message: "success".to_string(),
            })
        }
    }

    struct Harness {
        jobs: Arc<InMemoryJobStore>,
        results: Arc<InMemoryResultStore>,
        tee_store: Arc<InMemoryTeeStore>,
        reconciler: JobReconciler,
    }

    fn harness() -> Harness {
        let jobs = Arc::new(InMemoryJobStore::new());
        let results = Arc::new(InMemoryResultStore::new());
        let tee_store = Arc::new(InMemoryTeeStore::new());
        let config = PlatformConfig::new(PlatformRole::Center, NodeId::new("alice"));
        let materializer = Arc::new(ResultMaterializer::new(
            &config,
            Arc::new(EmptyCatalog),
            results.clone(),
        ));
        let tee = Arc::new(TeeWorkflow::new(
            config,
            tee_store.clone(),
            results.clone(),
            Arc::new(AlwaysRouted),
            Arc::new(StaticGrants),
            Arc::new(AcceptingOrchestrator {
                submissions: Mutex::new(Vec::new()),
            }),
            Replicator::new(PlatformRole::Center, tee_store.clone(), None),
        ));
        let reconciler = JobReconciler::new(jobs.clone(), materializer, tee);
        Harness {
            jobs,
            results,
            tee_store,
            reconciler,
        }
    }

    fn seeded_job(jobs: &InMemoryJobStore) -> JobId {
        let job_id = JobId::new("j1");
        jobs.insert(Job::new(
            job_id.clone(),
            ProjectId::new("p1"),
            vec![Task::new(
                TaskId::new("t1"),
                vec![NodeId::new("alice"), NodeId::new("bob")],
                vec!["out".to_string()],
            )],
        ));
        job_id
    }

    fn event(kind: EventKind, job_id: &JobId, snapshot: JobStatusSnapshot) -> JobEvent {
        JobEvent {
            kind,
            job_id: job_id.clone(),
            status: snapshot,
        }
    }

    fn running_snapshot() -> JobStatusSnapshot {
        JobStatusSnapshot {
            state: "Running".to_string(),
            err_msg: String::new(),
            end_time: String::new(),
            tasks: vec![TaskStatusSnapshot {
                task_id: TaskId::new("t1"),
                state: "Running".to_string(),
                err_msg: String::new(),
                parties: Vec::new(),
            }],
        }
    }

    #[tokio::test]
    async fn unknown_job_is_dropped_without_saving() {
        let h = harness();
        h.reconciler
            .handle_event(&event(
                EventKind::Modified,
                &JobId::new("ghost"),
                running_snapshot(),
            ))
            .await
            .unwrap();
        assert_eq!(h.jobs.save_count(), 0);
    }

    #[tokio::test]
    async fn applied_event_persists_exactly_once() {
        let h = harness();
        let job_id = seeded_job(&h.jobs);
        h.reconciler
            .handle_event(&event(EventKind::Modified, &job_id, running_snapshot()))
            .await
            .unwrap();
        assert_eq!(h.jobs.save_count(), 1);
        let job = h.jobs.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.task_statuses[&TaskId::new("t1")], TaskStatus::Running);
    }

    #[tokio::test]
    async fn premature_finish_folds_tasks_without_settling_the_job() {
        let h = harness();
        let job_id = seeded_job(&h.jobs);

        let mut premature = running_snapshot();
        premature.state = "Succeeded".to_string();
        premature.tasks[0].state = "Succeeded".to_string();
        h.reconciler
            .handle_event(&event(EventKind::Modified, &job_id, premature.clone()))
            .await
            .unwrap();
        // Task state and the save land; the job-level status waits for the
        // snapshot that carries the end time.
        assert_eq!(h.jobs.save_count(), 1);
        let job = h.jobs.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.finished_at.is_none());
        assert_eq!(job.task_statuses[&TaskId::new("t1")], TaskStatus::Succeeded);

        premature.end_time = "2026-08-26T10:00:00Z".to_string();
        h.reconciler
            .handle_event(&event(EventKind::Modified, &job_id, premature))
            .await
            .unwrap();
        assert_eq!(h.jobs.save_count(), 2);
        let job = h.jobs.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn terminal_job_absorbs_replayed_events() {
        let h = harness();
        let job_id = seeded_job(&h.jobs);
        let mut finished = running_snapshot();
        finished.state = "Succeeded".to_string();
        finished.end_time = "2026-08-26T10:00:00Z".to_string();

        let ev = event(EventKind::Modified, &job_id, finished);
        h.reconciler.handle_event(&ev).await.unwrap();
        h.reconciler.handle_event(&ev).await.unwrap();
        h.reconciler.handle_event(&ev).await.unwrap();
        assert_eq!(h.jobs.save_count(), 1);
    }

    #[tokio::test]
    async fn deletion_stops_the_job() {
        let h = harness();
        let job_id = seeded_job(&h.jobs);
        h.reconciler
            .handle_event(&event(EventKind::Deleted, &job_id, JobStatusSnapshot::default()))
            .await
            .unwrap();
        let job = h.jobs.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Stopped);
        assert!(job.is_finished());
    }

    #[tokio::test]
    async fn failed_task_collects_party_failure_reasons() {
        let h = harness();
        let job_id = seeded_job(&h.jobs);
        let snapshot = JobStatusSnapshot {
            state: "Failed".to_string(),
            err_msg: "job failed".to_string(),
            end_time: "2026-08-26T10:00:00Z".to_string(),
            tasks: vec![TaskStatusSnapshot {
                task_id: TaskId::new("t1"),
                state: "Failed".to_string(),
                err_msg: "task exploded".to_string(),
                parties: vec![PartyStatus {
                    node_id: NodeId::new("bob"),
                    state: "Failed".to_string(),
                    err_msg: "disk full".to_string(),
                }],
            }],
        };
        h.reconciler
            .handle_event(&event(EventKind::Modified, &job_id, snapshot))
            .await
            .unwrap();
        let job = h.jobs.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.err_msg.as_deref(), Some("job failed"));
        assert_eq!(
            job.tasks[&TaskId::new("t1")].err_msg.as_deref(),
            Some("party bob failed msg: disk full; task exploded")
        );
    }

    #[tokio::test]
    async fn unknown_task_in_snapshot_is_skipped() {
        let h = harness();
        let job_id = seeded_job(&h.jobs);
        let mut snapshot = running_snapshot();
        snapshot.tasks.push(TaskStatusSnapshot {
            task_id: TaskId::new("t-phantom"),
            state: "Running".to_string(),
            err_msg: String::new(),
            parties: Vec::new(),
        });
        h.reconciler
            .handle_event(&event(EventKind::Modified, &job_id, snapshot))
            .await
            .unwrap();
        let job = h.jobs.get(&job_id).unwrap();
        assert!(!job.task_statuses.contains_key(&TaskId::new("t-phantom")));
        assert_eq!(h.jobs.save_count(), 1);
    }

    #[tokio::test]
    async fn diagnostic_events_are_discarded() {
        let h = harness();
        let job_id = seeded_job(&h.jobs);
        h.reconciler
            .handle_event(&event(EventKind::Error, &job_id, JobStatusSnapshot::default()))
            .await
            .unwrap();
        assert_eq!(h.jobs.save_count(), 0);
    }

    #[tokio::test]
    async fn tee_tracked_jobs_bypass_the_job_path() {
        let h = harness();
        let tee_job_id = JobId::new("tee-j1");
        h.tee_store
            .save(&TeeManagement::new(
                NodeId::new("alice"),
                NodeId::new("tee"),
                DatasetId::new("tee-table-a"),
                tee_job_id.clone(),
                TeeJobStatus::Running,
                "default-data-source".to_string(),
                WorkflowParams::Push(PushParams {
                    relative_path: "tee-table-a".to_string(),
                }),
            ))
            .await
            .unwrap();

        let mut finished = JobStatusSnapshot::default();
        finished.state = "Succeeded".to_string();
        finished.end_time = "2026-08-26T10:00:00Z".to_string();
        h.reconciler
            .handle_event(&event(EventKind::Modified, &tee_job_id, finished))
            .await
            .unwrap();

        assert_eq!(h.jobs.save_count(), 0);
        assert_eq!(
            h.tee_store.get(&tee_job_id).unwrap().status,
            TeeJobStatus::Success
        );
        assert!(h.results.results().is_empty());
    }
}
