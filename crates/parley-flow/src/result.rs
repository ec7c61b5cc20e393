//! Typed result records materialized from finished tasks.
//!
//! A result is the queryable footprint of one artifact a task produced. Its
//! kind is derived from the dataset's declared storage type at
//! materialization time and never changes afterwards; a resubmitted task
//! produces a new dataset id and hence a new result record.

use serde::{Deserialize, Serialize};

use parley_core::{DatasetId, JobId, NodeId, ProjectId, TaskId};

/// The kind of artifact a result record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultKind {
    /// A table split across participating parties, joined by dataset id.
    FederatedTable,
    /// A derived rule artifact (e.g. a binning rule).
    Rule,
    /// A trained model artifact.
    Model,
    /// A report with inline content.
    Report,
}

impl ResultKind {
    /// Classifies a dataset's declared storage type into a result kind.
    ///
    /// Returns `None` for types with no known mapping; the caller decides
    /// whether that is an error.
    #[must_use]
    pub fn from_declared_type(declared_type: &str) -> Option<Self> {
        match declared_type {
            "table" => Some(Self::FederatedTable),
            "rule" => Some(Self::Rule),
            "model" => Some(Self::Model),
            "report" => Some(Self::Report),
            _ => None,
        }
    }

    /// Returns the stable string form used in workflow parameters.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FederatedTable => "FEDERATED_TABLE",
            Self::Rule => "RULE",
            Self::Model => "MODEL",
            Self::Report => "REPORT",
        }
    }
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One materialized result.
///
/// Identity is the composite (project, kind, node, dataset); records are
/// created exactly once per (task, output) pair and never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// The project the producing job belongs to.
    pub project_id: ProjectId,
    /// Artifact kind, immutable once derived.
    pub kind: ResultKind,
    /// The node owning this view of the artifact.
    pub node_id: NodeId,
    /// The dataset backing the artifact.
    pub dataset_id: DatasetId,
    /// The job that produced the artifact.
    pub job_id: JobId,
    /// The task that produced the artifact.
    pub task_id: TaskId,
    /// Inline content payload; populated for reports only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Join membership of a federated table across participating parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FedTableRecord {
    /// The project the table belongs to.
    pub project_id: ProjectId,
    /// The federated table's dataset id.
    pub dataset_id: DatasetId,
    /// One member per participating party, all sharing the dataset id.
    pub joins: Vec<JoinMember>,
}

/// One party's membership in a federated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinMember {
    /// The participating node.
    pub node_id: NodeId,
    /// The dataset id the party holds its slice under.
    pub dataset_id: DatasetId,
}

/// How a dataset registration entered the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetSource {
    /// Imported by an operator.
    Imported,
    /// Created by the platform while materializing results.
    CreatedByPlatform,
}

/// Per-node registration of a dataset within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRegistration {
    /// The project the dataset is registered in.
    pub project_id: ProjectId,
    /// The node holding the dataset.
    pub node_id: NodeId,
    /// The registered dataset.
    pub dataset_id: DatasetId,
    /// Provenance tag.
    pub source: DatasetSource,
    /// Column schema captured from the catalog at registration time.
    pub columns: Vec<crate::remote::ColumnSchema>,
}

/// Bare ownership record for rule and model artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    /// The owning project.
    pub project_id: ProjectId,
    /// The owned dataset.
    pub dataset_id: DatasetId,
    /// Whether this is a rule or a model.
    pub kind: ResultKind,
}
