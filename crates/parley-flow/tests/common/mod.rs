//! Shared fakes for parley-flow integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use parley_core::{DatasetId, GrantId, NodeId};
use parley_flow::error::Result;
use parley_flow::event::JobEvent;
use parley_flow::remote::{
    DatasetCatalog, DatasetHandle, DatasetMeta, GrantService, JobSubmission, NodeRoutes,
    OrchestratorClient, StatusEnvelope,
};
use parley_flow::replicate::{ReplicationClient, SyncEnvelope};

/// Orchestrator fake that plays a scripted event stream and accepts every
/// submission.
pub struct ScriptedOrchestrator {
    items: Mutex<Option<Vec<Result<JobEvent>>>>,
    submissions: Mutex<Vec<JobSubmission>>,
}

impl ScriptedOrchestrator {
    pub fn new(items: Vec<Result<JobEvent>>) -> Self {
        Self {
            items: Mutex::new(Some(items)),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(Vec::new())
    }

    pub fn submissions(&self) -> Vec<JobSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrchestratorClient for ScriptedOrchestrator {
    async fn watch_jobs(&self) -> Result<BoxStream<'static, Result<JobEvent>>> {
        let items = self.items.lock().unwrap().take().unwrap_or_default();
        Ok(futures::stream::iter(items).boxed())
    }

    async fn create_job(&self, submission: &JobSubmission) -> Result<StatusEnvelope> {
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(StatusEnvelope {
            code: 0,
            message: "success".to_string(),
        })
    }
}

/// Catalog fake backed by a fixed handle map.
pub struct StaticCatalog {
    datasets: BTreeMap<DatasetHandle, DatasetMeta>,
}

impl StaticCatalog {
    pub fn new(datasets: BTreeMap<DatasetHandle, DatasetMeta>) -> Self {
        Self { datasets }
    }

    pub fn empty() -> Self {
        Self {
            datasets: BTreeMap::new(),
        }
    }
}

#[async_trait]
impl DatasetCatalog for StaticCatalog {
    async fn find_by_handles(
        &self,
        handles: &[DatasetHandle],
    ) -> Result<BTreeMap<DatasetHandle, DatasetMeta>> {
        Ok(handles
            .iter()
            .filter_map(|h| self.datasets.get(h).map(|m| (h.clone(), m.clone())))
            .collect())
    }

    async fn list_by_node(&self, node_id: &NodeId) -> Result<Vec<DatasetMeta>> {
        Ok(self
            .datasets
            .values()
            .filter(|m| &m.node_id == node_id)
            .cloned()
            .collect())
    }
}

/// Route fake where every node pair is connected.
pub struct OpenRoutes;

#[async_trait]
impl NodeRoutes for OpenRoutes {
    async fn route_exists(&self, _source: &NodeId, _target: &NodeId) -> Result<bool> {
        Ok(true)
    }
}

/// Grant fake that issues deterministic grants and reports them valid.
pub struct StaticGrants;

#[async_trait]
impl GrantService for StaticGrants {
    async fn create_grant(
        &self,
        _source: &NodeId,
        _target: &NodeId,
        dataset: &DatasetId,
    ) -> Result<GrantId> {
        Ok(GrantId::new(format!("grant-{dataset}")))
    }

    async fn query_grant(&self, _source: &NodeId, _grant: &GrantId) -> Result<bool> {
        Ok(true)
    }
}

/// Replication client fake capturing every forwarded envelope.
#[derive(Default)]
pub struct CapturingReplicationClient {
    forwarded: Mutex<Vec<SyncEnvelope>>,
}

impl CapturingReplicationClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn forwarded(&self) -> Vec<SyncEnvelope> {
        self.forwarded.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplicationClient for CapturingReplicationClient {
    async fn forward(&self, envelope: &SyncEnvelope) -> Result<()> {
        self.forwarded.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

/// Builds catalog metadata for one node's dataset.
pub fn dataset_meta(node: &str, dataset: &str, declared_type: &str) -> DatasetMeta {
    DatasetMeta {
        dataset_id: DatasetId::new(dataset),
        node_id: NodeId::new(node),
        name: dataset.to_string(),
        declared_type: declared_type.to_string(),
        datasource_id: "default-data-source".to_string(),
        relative_path: dataset.to_string(),
        columns: Vec::new(),
        attributes: BTreeMap::new(),
    }
}
