//! # parley-core
//!
//! Core abstractions for the Parley multi-party computation control plane.
//!
//! This crate provides the foundational types used across all Parley
//! components:
//!
//! - **Identifiers**: Strongly-typed ids for jobs, tasks, nodes, and datasets
//! - **Platform Configuration**: Deployment role (center/edge) and runtime limits
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Structured logging initialization
//!
//! ## Crate Boundary
//!
//! `parley-core` is the only crate allowed to define shared primitives.
//! Domain logic (reconciliation, materialization, TEE workflows) lives in
//! `parley-flow` and builds on the contracts defined here.
//!
//! ## Example
//!
//! ```rust
//! use parley_core::prelude::*;
//!
//! let node = NodeId::new("alice");
//! let job = JobId::generate();
//! assert_ne!(job.as_str(), "");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod id;
pub mod observability;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use parley_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{PlatformConfig, PlatformRole};
    pub use crate::error::{Error, Result};
    pub use crate::id::{DatasetId, GrantId, JobId, NodeId, ProjectId, TaskId};
}

pub use config::{PlatformConfig, PlatformRole};
pub use error::{Error, Result};
pub use id::{DatasetId, GrantId, JobId, NodeId, ProjectId, TaskId};
