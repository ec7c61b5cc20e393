//! Dataset handlers and cross-node aggregate queries.
//!
//! Every datasource technology gets a [`DatasetHandler`]; the closed
//! [`DataSourceKind`] enum routes to it through a registry built once at
//! startup. Lookups fail closed: an unregistered kind is an error, never a
//! silent fallthrough.
//!
//! Cross-node queries fan out with bounded concurrency under one overall
//! deadline. A node that fails or answers garbage is reported in a
//! partial-failure map; it never sinks the nodes that answered.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use metrics::counter;
use serde::{Deserialize, Serialize};

use parley_core::{DatasetId, NodeId, PlatformConfig};

use crate::error::{Error, Result};
use crate::metrics::{labels, names};
use crate::remote::{DatasetCatalog, DatasetHandle, DatasetMeta};
use crate::store::TeeStore;
use crate::tee::TeeManagement;

/// The datasource technology a dataset lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceKind {
    /// Node-local filesystem storage.
    Local,
    /// Object storage (S3-compatible).
    ObjectStorage,
    /// Datasets fetched over HTTP.
    Http,
    /// Relational database tables.
    Database,
}

impl std::fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "LOCAL"),
            Self::ObjectStorage => write!(f, "OBJECT_STORAGE"),
            Self::Http => write!(f, "HTTP"),
            Self::Database => write!(f, "DATABASE"),
        }
    }
}

/// Technology-specific dataset operations at a node.
#[async_trait]
pub trait DatasetHandler: Send + Sync + 'static {
    /// Registers a dataset at a node, returning its catalog id.
    async fn create_dataset(&self, node_id: &NodeId, meta: &DatasetMeta) -> Result<DatasetId>;

    /// Looks up one node's view of a dataset.
    async fn query_dataset(&self, handle: &DatasetHandle) -> Result<Option<DatasetMeta>>;

    /// Removes a dataset from a node's catalog.
    async fn delete_dataset(&self, handle: &DatasetHandle) -> Result<()>;
}

/// Explicit, startup-built routing table from kind to handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<DataSourceKind, Arc<dyn DatasetHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for a datasource kind, replacing any previous one.
    #[must_use]
    pub fn with_handler(mut self, kind: DataSourceKind, handler: Arc<dyn DatasetHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Resolves the handler for a kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no handler is registered for the
    /// kind.
    pub fn get(&self, kind: DataSourceKind) -> Result<Arc<dyn DatasetHandler>> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::not_found("dataset handler", kind.to_string()))
    }
}

/// One node's dataset, decorated with its latest push-to-TEE record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedDataset {
    /// Catalog metadata.
    pub meta: DatasetMeta,
    /// The newest non-deleted push record staging this dataset at the TEE
    /// node; `None` when it was never pushed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_push: Option<TeeManagement>,
}

/// Outcome of a cross-node listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateListing {
    /// Decorated datasets per node that answered.
    pub datasets: BTreeMap<NodeId, Vec<DecoratedDataset>>,
    /// Nodes that failed, with the reason.
    pub failed_nodes: BTreeMap<NodeId, String>,
}

/// Outcome of a multi-node dataset creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiNodeCreateOutcome {
    /// Catalog ids per node where creation succeeded.
    pub created: BTreeMap<NodeId, DatasetId>,
    /// Nodes where creation failed, with the reason.
    pub failed_nodes: BTreeMap<NodeId, String>,
}

/// Fans dataset queries out across nodes with bounded concurrency.
pub struct DatasetAggregator {
    tee_node_id: NodeId,
    aggregate_timeout: Duration,
    fan_out_concurrency: usize,
    catalog: Arc<dyn DatasetCatalog>,
    tee_store: Arc<dyn TeeStore>,
    registry: Arc<HandlerRegistry>,
}

impl DatasetAggregator {
    /// Creates an aggregator with the deployment's fan-out settings.
    #[must_use]
    pub fn new(
        config: &PlatformConfig,
        catalog: Arc<dyn DatasetCatalog>,
        tee_store: Arc<dyn TeeStore>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            tee_node_id: config.tee_node_id.clone(),
            aggregate_timeout: config.aggregate_timeout,
            fan_out_concurrency: config.fan_out_concurrency,
            catalog,
            tee_store,
            registry,
        }
    }

    /// Lists every node's datasets, decorated with their latest push record.
    ///
    /// Per-node failures land in `failed_nodes`; the nodes that answered are
    /// returned regardless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConcurrentAggregationTimeout`] when the whole
    /// fan-out misses the configured deadline.
    pub async fn list_across_nodes(&self, nodes: &[NodeId]) -> Result<AggregateListing> {
        let queries = futures::stream::iter(nodes.iter().cloned().map(|node| {
            let catalog = self.catalog.clone();
            let tee_store = self.tee_store.clone();
            let tee = self.tee_node_id.clone();
            async move {
                let outcome = Self::list_one_node(&node, &tee, catalog, tee_store).await;
                (node, outcome)
            }
        }))
        .buffer_unordered(self.fan_out_concurrency)
        .collect::<Vec<_>>();

        let outcomes = tokio::time::timeout(self.aggregate_timeout, queries)
            .await
            .map_err(|_| Error::ConcurrentAggregationTimeout {
                timeout_secs: self.aggregate_timeout.as_secs(),
            })?;

        let mut datasets = BTreeMap::new();
        let mut failed_nodes = BTreeMap::new();
        for (node, outcome) in outcomes {
            match outcome {
                Ok(decorated) => {
                    counter!(names::FAN_OUT_NODES_TOTAL, labels::OUTCOME => "ok").increment(1);
                    datasets.insert(node, decorated);
                }
                Err(err) => {
                    counter!(names::FAN_OUT_NODES_TOTAL, labels::OUTCOME => "failed").increment(1);
                    tracing::warn!(node_id = %node, error = %err, "node failed during fan-out listing");
                    failed_nodes.insert(node, err.to_string());
                }
            }
        }
        Ok(AggregateListing {
            datasets,
            failed_nodes,
        })
    }

    async fn list_one_node(
        node: &NodeId,
        tee: &NodeId,
        catalog: Arc<dyn DatasetCatalog>,
        tee_store: Arc<dyn TeeStore>,
    ) -> Result<Vec<DecoratedDataset>> {
        let metas = catalog.list_by_node(node).await?;

        // Push records live under the staged id the dataset takes on at the
        // TEE node.
        let staged_ids: Vec<DatasetId> = metas
            .iter()
            .map(|meta| meta.dataset_id.staged_at(tee))
            .collect();
        let push_records = tee_store.list_push_records(node, tee, &staged_ids).await?;
        let mut latest_by_staged: BTreeMap<DatasetId, TeeManagement> = BTreeMap::new();
        for record in push_records {
            let keep = latest_by_staged
                .get(&record.dataset_id)
                .map_or(true, |current| current.created_at < record.created_at);
            if keep {
                latest_by_staged.insert(record.dataset_id.clone(), record);
            }
        }

        Ok(metas
            .into_iter()
            .map(|meta| {
                let latest_push = latest_by_staged.remove(&meta.dataset_id.staged_at(tee));
                DecoratedDataset { meta, latest_push }
            })
            .collect())
    }

    /// Creates the same dataset at several nodes through one handler.
    ///
    /// Per-node failures are collected; a partial outcome is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no handler is registered for the
    /// kind, and [`Error::ConcurrentAggregationTimeout`] on deadline miss.
    pub async fn create_across_nodes(
        &self,
        kind: DataSourceKind,
        nodes: &[NodeId],
        meta: &DatasetMeta,
    ) -> Result<MultiNodeCreateOutcome> {
        let handler = self.registry.get(kind)?;

        let creations = futures::stream::iter(nodes.iter().cloned().map(|node| {
            let handler = handler.clone();
            let meta = meta.clone();
            async move {
                let outcome = handler.create_dataset(&node, &meta).await;
                (node, outcome)
            }
        }))
        .buffer_unordered(self.fan_out_concurrency)
        .collect::<Vec<_>>();

        let outcomes = tokio::time::timeout(self.aggregate_timeout, creations)
            .await
            .map_err(|_| Error::ConcurrentAggregationTimeout {
                timeout_secs: self.aggregate_timeout.as_secs(),
            })?;

        let mut created = BTreeMap::new();
        let mut failed_nodes = BTreeMap::new();
        for (node, outcome) in outcomes {
            match outcome {
                Ok(dataset_id) => {
                    created.insert(node, dataset_id);
                }
                Err(err) => {
                    tracing::warn!(node_id = %node, error = %err, "dataset creation failed at node");
                    failed_nodes.insert(node, err.to_string());
                }
            }
        }
        Ok(MultiNodeCreateOutcome {
            created,
            failed_nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use parley_core::{JobId, PlatformRole};

    use crate::status::TeeJobStatus;
    use crate::store::memory::InMemoryTeeStore;
    use crate::tee::{PushParams, WorkflowParams};

    struct FlakyCatalog {
        failing: Option<NodeId>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl DatasetCatalog for FlakyCatalog {
        async fn find_by_handles(
            &self,
            _handles: &[DatasetHandle],
        ) -> Result<BTreeMap<DatasetHandle, DatasetMeta>> {
            Ok(BTreeMap::new())
        }

        async fn list_by_node(&self, node_id: &NodeId) -> Result<Vec<DatasetMeta>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.as_ref() == Some(node_id) {
                return Err(Error::remote("node unreachable"));
            }
            Ok(vec![meta(node_id, &format!("{node_id}-data"))])
        }
    }

    fn meta(node: &NodeId, dataset: &str) -> DatasetMeta {
        DatasetMeta {
            dataset_id: DatasetId::new(dataset),
            node_id: node.clone(),
            name: dataset.to_string(),
            declared_type: "table".to_string(),
            datasource_id: "default-data-source".to_string(),
            relative_path: dataset.to_string(),
            columns: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    struct CountingHandler {
        failing: Option<NodeId>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl DatasetHandler for CountingHandler {
        async fn create_dataset(&self, node_id: &NodeId, meta: &DatasetMeta) -> Result<DatasetId> {
            *self.calls.lock().unwrap() += 1;
            if self.failing.as_ref() == Some(node_id) {
                return Err(Error::remote("bucket missing"));
            }
            Ok(meta.dataset_id.clone())
        }

        async fn query_dataset(&self, _handle: &DatasetHandle) -> Result<Option<DatasetMeta>> {
            Ok(None)
        }

        async fn delete_dataset(&self, _handle: &DatasetHandle) -> Result<()> {
            Ok(())
        }
    }

    fn aggregator(
        catalog: FlakyCatalog,
        tee_store: Arc<InMemoryTeeStore>,
        registry: HandlerRegistry,
        timeout: Duration,
    ) -> DatasetAggregator {
        let mut config = PlatformConfig::new(PlatformRole::Center, NodeId::new("alice"));
        config.aggregate_timeout = timeout;
        DatasetAggregator::new(
            &config,
            Arc::new(catalog),
            tee_store,
            Arc::new(registry),
        )
    }

    fn nodes(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| NodeId::new(*n)).collect()
    }

    #[test]
    fn registry_fails_closed_for_unregistered_kinds() {
        let registry = HandlerRegistry::new();
        let lookup = registry.get(DataSourceKind::Database);
        assert!(matches!(lookup.err(), Some(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn failing_node_becomes_a_partial_result() {
        let aggregator = aggregator(
            FlakyCatalog {
                failing: Some(NodeId::new("bob")),
                delay: None,
            },
            Arc::new(InMemoryTeeStore::new()),
            HandlerRegistry::new(),
            Duration::from_secs(5),
        );
        let listing = aggregator
            .list_across_nodes(&nodes(&["alice", "bob", "carol"]))
            .await
            .unwrap();

        assert_eq!(listing.datasets.len(), 2);
        assert!(listing.datasets.contains_key(&NodeId::new("alice")));
        assert!(listing.datasets.contains_key(&NodeId::new("carol")));
        assert_eq!(listing.failed_nodes.len(), 1);
        assert!(listing.failed_nodes[&NodeId::new("bob")].contains("node unreachable"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_miss_is_a_timeout_error() {
        let aggregator = aggregator(
            FlakyCatalog {
                failing: None,
                delay: Some(Duration::from_secs(60)),
            },
            Arc::new(InMemoryTeeStore::new()),
            HandlerRegistry::new(),
            Duration::from_secs(5),
        );
        let err = aggregator
            .list_across_nodes(&nodes(&["alice"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ConcurrentAggregationTimeout { timeout_secs: 5 }
        ));
    }

    #[tokio::test]
    async fn listing_carries_the_latest_push_record() {
        let tee_store = Arc::new(InMemoryTeeStore::new());
        let staged = DatasetId::new("tee-alice-data");
        let mut older = TeeManagement::new(
            NodeId::new("alice"),
            NodeId::new("tee"),
            staged.clone(),
            JobId::new("push-old"),
            TeeJobStatus::Success,
            "default-data-source".to_string(),
            WorkflowParams::Push(PushParams {
                relative_path: staged.as_str().to_string(),
            }),
        );
        older.created_at = older.created_at - chrono::Duration::hours(1);
        let newer = TeeManagement::new(
            NodeId::new("alice"),
            NodeId::new("tee"),
            staged,
            JobId::new("push-new"),
            TeeJobStatus::Running,
            "default-data-source".to_string(),
            WorkflowParams::Push(PushParams {
                relative_path: "tee-alice-data".to_string(),
            }),
        );
        tee_store.save(&older).await.unwrap();
        tee_store.save(&newer).await.unwrap();

        let aggregator = aggregator(
            FlakyCatalog {
                failing: None,
                delay: None,
            },
            tee_store,
            HandlerRegistry::new(),
            Duration::from_secs(5),
        );
        let listing = aggregator.list_across_nodes(&nodes(&["alice"])).await.unwrap();
        let decorated = &listing.datasets[&NodeId::new("alice")];
        assert_eq!(decorated.len(), 1);
        let push = decorated[0].latest_push.as_ref().unwrap();
        assert_eq!(push.job_id, JobId::new("push-new"));
    }

    #[tokio::test]
    async fn multi_node_create_collects_per_node_failures() {
        let handler = Arc::new(CountingHandler {
            failing: Some(NodeId::new("bob")),
            calls: Mutex::new(0),
        });
        let registry =
            HandlerRegistry::new().with_handler(DataSourceKind::ObjectStorage, handler.clone());
        let aggregator = aggregator(
            FlakyCatalog {
                failing: None,
                delay: None,
            },
            Arc::new(InMemoryTeeStore::new()),
            registry,
            Duration::from_secs(5),
        );

        let outcome = aggregator
            .create_across_nodes(
                DataSourceKind::ObjectStorage,
                &nodes(&["alice", "bob"]),
                &meta(&NodeId::new("alice"), "shared-table"),
            )
            .await
            .unwrap();
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(
            outcome.created[&NodeId::new("alice")],
            DatasetId::new("shared-table")
        );
        assert!(outcome.failed_nodes[&NodeId::new("bob")].contains("bucket missing"));
        assert_eq!(*handler.calls.lock().unwrap(), 2);
    }
}
