//! Strongly-typed identifiers for Parley entities.
//!
//! Most identifiers in this system are opaque strings assigned by external
//! collaborators: the remote orchestration service assigns job ids, the
//! dataset catalog assigns dataset ids, and operators assign node ids.
//! Wrapping them in newtypes prevents mixing them up at compile time while
//! keeping the wire representation untouched.
//!
//! Workflow jobs initiated locally (TEE push/pull and their teardown) need a
//! fresh job id before submission; those are generated as ULIDs, which are
//! lexicographically sortable by creation time and need no coordination.
//!
//! # Example
//!
//! ```rust
//! use parley_core::id::{JobId, NodeId};
//!
//! let job = JobId::new("secure-psi-20240101");
//! let node = NodeId::new("alice");
//!
//! // Ids are different types - this won't compile:
//! // let wrong: NodeId = job;
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! opaque_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier string.
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the raw string.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

opaque_id! {
    /// A job id assigned by the remote orchestration service, or generated
    /// locally for TEE workflow jobs before submission.
    JobId
}

opaque_id! {
    /// A task id, scoped to its parent job.
    TaskId
}

opaque_id! {
    /// The stable id of an autonomous participant (party) in a computation.
    NodeId
}

opaque_id! {
    /// A dataset id in the dataset catalog.
    DatasetId
}

opaque_id! {
    /// A project id grouping jobs and their results.
    ProjectId
}

opaque_id! {
    /// A data-sharing grant id issued by the authorization service.
    GrantId
}

impl JobId {
    /// Generates a fresh job id for a locally-initiated workflow job.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }
}

impl DatasetId {
    /// Derives the dataset id a task output materializes under.
    ///
    /// The remote orchestration service registers task outputs as
    /// `{job id}-{output name}`; result materialization relies on the same
    /// derivation to resolve them from the catalog.
    #[must_use]
    pub fn for_output(job_id: &JobId, output: &str) -> Self {
        Self(format!("{job_id}-{output}"))
    }

    /// Derives the id a dataset takes on once staged at another node.
    ///
    /// Datasets moved into a TEE node (and results pulled back out) are
    /// registered under `{target node}-{dataset id}` at the destination.
    #[must_use]
    pub fn staged_at(&self, node: &NodeId) -> Self {
        Self(format!("{node}-{}", self.0))
    }
}
