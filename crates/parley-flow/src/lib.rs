//! # parley-flow
//!
//! Control-plane reconciliation for the Parley multi-party computation
//! platform.
//!
//! This crate implements the reconciliation domain, providing:
//!
//! - **Job Reconciliation**: Remote job lifecycle events folded into local
//!   job and task aggregates
//! - **Result Materialization**: Typed result records derived from finished
//!   tasks and the dataset catalog
//! - **TEE Exchange Workflow**: Push/pull of datasets through a trusted
//!   execution node, with authorization reuse and teardown cascades
//! - **Center/Edge Replication**: One decision point routing globally-visible
//!   writes to the authoritative replica
//!
//! ## Core Concepts
//!
//! - **Job**: A local mirror of one remote orchestration job, exclusively
//!   owning its tasks
//! - **Event**: A full status snapshot delivered by the remote service; the
//!   only way job progress reaches this system
//! - **TEE management record**: Tracking state for one workflow step,
//!   identified by the remote job that executes it
//!
//! ## Guarantees
//!
//! - **Single writer**: Only the reconciler mutates job aggregates, one
//!   ordered event at a time
//! - **One save per event**: Each applied event persists exactly one update
//! - **Terminal absorption**: Finished jobs and workflow records absorb
//!   replayed events without change
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use parley_core::{NodeId, PlatformConfig, PlatformRole};
//! use parley_flow::error::Result;
//! use parley_flow::materialize::ResultMaterializer;
//! use parley_flow::reconcile::JobReconciler;
//! use parley_flow::replicate::Replicator;
//! use parley_flow::store::memory::{InMemoryJobStore, InMemoryResultStore, InMemoryTeeStore};
//! use parley_flow::tee::TeeWorkflow;
//! use parley_flow::watch::JobWatcher;
//!
//! # async fn wire(
//! #     catalog: Arc<dyn parley_flow::remote::DatasetCatalog>,
//! #     routes: Arc<dyn parley_flow::remote::NodeRoutes>,
//! #     grants: Arc<dyn parley_flow::remote::GrantService>,
//! #     orchestrator: Arc<dyn parley_flow::remote::OrchestratorClient>,
//! # ) -> Result<()> {
//! let config = PlatformConfig::new(PlatformRole::Center, NodeId::new("alice"));
//! let jobs = Arc::new(InMemoryJobStore::new());
//! let results = Arc::new(InMemoryResultStore::new());
//! let tee_store = Arc::new(InMemoryTeeStore::new());
//!
//! let materializer = Arc::new(ResultMaterializer::new(&config, catalog, results.clone()));
//! let replicator = Replicator::new(config.role, tee_store.clone(), None);
//! let tee = Arc::new(TeeWorkflow::new(
//!     config, tee_store, results, routes, grants, orchestrator.clone(), replicator,
//! ));
//! let reconciler = Arc::new(JobReconciler::new(jobs, materializer, tee));
//!
//! // Consume the remote event stream until it ends or fails.
//! let watcher = JobWatcher::new(orchestrator, reconciler);
//! watcher.run().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod dataset;
pub mod error;
pub mod event;
pub mod job;
pub mod materialize;
pub mod metrics;
pub mod reconcile;
pub mod remote;
pub mod replicate;
pub mod result;
pub mod status;
pub mod store;
pub mod tee;
pub mod watch;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::dataset::{DataSourceKind, DatasetAggregator, DatasetHandler, HandlerRegistry};
    pub use crate::error::{Error, Result};
    pub use crate::event::{EventKind, JobEvent, JobStatusSnapshot};
    pub use crate::job::{Job, Task};
    pub use crate::materialize::ResultMaterializer;
    pub use crate::reconcile::JobReconciler;
    pub use crate::remote::{
        DatasetCatalog, DatasetHandle, DatasetMeta, GrantService, NodeRoutes, OrchestratorClient,
    };
    pub use crate::replicate::{ReplicationClient, Replicator, SyncEnvelope};
    pub use crate::result::{ResultKind, ResultRecord};
    pub use crate::status::{JobStatus, TaskStatus, TeeJobStatus};
    pub use crate::store::{JobStore, ResultStore, TeeStore};
    pub use crate::tee::{PullResultRequest, PushDatasetRequest, TeeManagement, TeeWorkflow};
    pub use crate::watch::{JobWatcher, WatchState};
}
