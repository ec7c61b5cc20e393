//! Center/edge replication of globally-visible state.
//!
//! TEE management records must be consistent across the center deployment
//! and every edge. All such writes go through a single decision point: the
//! [`Replicator`]. Edge deployments serialize the record into a
//! [`SyncEnvelope`] and forward it to the center's ingestion endpoint; any
//! other role commits locally. Result records are deliberately not routed
//! here — each deployment keeps its own node's results.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use parley_core::PlatformRole;

use crate::error::{Error, Result};
use crate::store::TeeStore;
use crate::tee::TeeManagement;

/// Envelope tag for TEE management replication.
pub const SYNC_TYPE_TEE_MANAGEMENT: &str = "TEE_NODE_DATASET_MANAGEMENT";

/// A tagged replication envelope forwarded from edge to center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    /// What the payload contains.
    pub sync_data_type: String,
    /// The serialized record.
    pub payload: serde_json::Value,
}

impl SyncEnvelope {
    /// Wraps a TEE management record for forwarding.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the record cannot be encoded.
    pub fn tee_management(record: &TeeManagement) -> Result<Self> {
        let payload = serde_json::to_value(record)
            .map_err(|e| Error::serialization(format!("encode tee management: {e}")))?;
        Ok(Self {
            sync_data_type: SYNC_TYPE_TEE_MANAGEMENT.to_string(),
            payload,
        })
    }

    /// Decodes a TEE management record from the envelope.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the tag or payload does not match.
    pub fn decode_tee_management(&self) -> Result<TeeManagement> {
        if self.sync_data_type != SYNC_TYPE_TEE_MANAGEMENT {
            return Err(Error::serialization(format!(
                "unexpected sync data type '{}'",
                self.sync_data_type
            )));
        }
        serde_json::from_value(self.payload.clone())
            .map_err(|e| Error::serialization(format!("decode tee management: {e}")))
    }
}

/// Transport to the center deployment's ingestion endpoint.
#[async_trait]
pub trait ReplicationClient: Send + Sync + 'static {
    /// Forwards one envelope to the center.
    async fn forward(&self, envelope: &SyncEnvelope) -> Result<()>;
}

/// HTTP replication client posting envelopes to the center endpoint.
pub struct HttpReplicationClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReplicationClient {
    /// Creates a client for the given center ingestion endpoint.
    ///
    /// # Errors
    ///
    /// Returns a replication error if the HTTP client cannot be constructed.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::replication("failed to create HTTP client", e))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ReplicationClient for HttpReplicationClient {
    async fn forward(&self, envelope: &SyncEnvelope) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(envelope)
            .send()
            .await
            .map_err(|e| Error::replication("failed to reach center endpoint", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Replication {
                message: format!("center endpoint returned {status}: {body}"),
                source: None,
            });
        }
        Ok(())
    }
}

/// The single decision point for globally-visible writes.
pub struct Replicator {
    role: PlatformRole,
    store: Arc<dyn TeeStore>,
    client: Option<Arc<dyn ReplicationClient>>,
}

impl Replicator {
    /// Creates a replicator for the given deployment role.
    ///
    /// Edge deployments must supply a replication client; other roles may
    /// pass `None`.
    #[must_use]
    pub fn new(
        role: PlatformRole,
        store: Arc<dyn TeeStore>,
        client: Option<Arc<dyn ReplicationClient>>,
    ) -> Self {
        Self {
            role,
            store,
            client,
        }
    }

    /// Returns the deployment role this replicator was built for.
    #[must_use]
    pub const fn role(&self) -> PlatformRole {
        self.role
    }

    /// Persists a TEE management record according to the deployment role.
    ///
    /// Edge forwards to the center instead of committing locally; any
    /// non-edge role commits to the local store.
    ///
    /// # Errors
    ///
    /// Returns a replication error when an edge deployment has no client
    /// configured or the forward fails, and a storage error when the local
    /// commit fails.
    pub async fn save_management(&self, record: &TeeManagement) -> Result<()> {
        if self.role.is_edge() {
            let client = self.client.as_ref().ok_or_else(|| Error::Replication {
                message: "edge deployment has no replication client configured".to_string(),
                source: None,
            })?;
            let envelope = SyncEnvelope::tee_management(record)?;
            tracing::debug!(
                job_id = %record.job_id,
                kind = %record.kind(),
                "forwarding tee management write to center"
            );
            client.forward(&envelope).await
        } else {
            self.store.save(record).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TeeJobStatus;
    use crate::store::memory::InMemoryTeeStore;
    use crate::tee::{PushParams, WorkflowParams};
    use parley_core::{DatasetId, JobId, NodeId};

    fn record() -> TeeManagement {
        TeeManagement::new(
            NodeId::new("alice"),
            NodeId::new("tee"),
            DatasetId::new("table-a"),
            JobId::new("j1"),
            TeeJobStatus::Running,
            "default-data-source".to_string(),
            WorkflowParams::Push(PushParams {
                relative_path: "tee-table-a".to_string(),
            }),
        )
    }

    #[test]
    fn envelope_round_trips_record() {
        let record = record();
        let envelope = SyncEnvelope::tee_management(&record).unwrap();
        assert_eq!(envelope.sync_data_type, SYNC_TYPE_TEE_MANAGEMENT);
        let decoded = envelope.decode_tee_management().unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn envelope_rejects_wrong_tag() {
        let envelope = SyncEnvelope {
            sync_data_type: "VOTE".to_string(),
            payload: serde_json::Value::Null,
        };
        assert!(envelope.decode_tee_management().is_err());
    }

    #[tokio::test]
    async fn center_commits_locally() {
        let store = Arc::new(InMemoryTeeStore::new());
        let replicator = Replicator::new(PlatformRole::Center, store.clone(), None);
        replicator.save_management(&record()).await.unwrap();
        assert!(store.get(&JobId::new("j1")).is_some());
    }

    #[tokio::test]
    async fn edge_without_client_fails_instead_of_committing() {
        let store = Arc::new(InMemoryTeeStore::new());
        let replicator = Replicator::new(PlatformRole::Edge, store.clone(), None);
        let err = replicator.save_management(&record()).await.unwrap_err();
        assert!(matches!(err, Error::Replication { .. }));
        assert!(store.get(&JobId::new("j1")).is_none());
    }
}
