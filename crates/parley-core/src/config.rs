//! Platform deployment configuration.
//!
//! A Parley deployment runs in one of three roles. The role decides where
//! globally-visible workflow state is committed: edge deployments forward
//! such writes to the center, everything else commits locally. The role is
//! threaded explicitly into the components that need it; nothing reads it
//! from ambient process state after startup.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::id::NodeId;

const ENV_PLATFORM_ROLE: &str = "PARLEY_PLATFORM_ROLE";
const ENV_LOCAL_NODE_ID: &str = "PARLEY_LOCAL_NODE_ID";
const ENV_TEE_NODE_ID: &str = "PARLEY_TEE_NODE_ID";
const ENV_DEFAULT_DATASOURCE_ID: &str = "PARLEY_DEFAULT_DATASOURCE_ID";
const ENV_CENTER_ENDPOINT: &str = "PARLEY_CENTER_ENDPOINT";
const ENV_AGGREGATE_TIMEOUT_SECS: &str = "PARLEY_AGGREGATE_TIMEOUT_SECS";
const ENV_FAN_OUT_CONCURRENCY: &str = "PARLEY_FAN_OUT_CONCURRENCY";

const DEFAULT_TEE_NODE_ID: &str = "tee";
const DEFAULT_DATASOURCE_ID: &str = "default-data-source";
const DEFAULT_AGGREGATE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_FAN_OUT_CONCURRENCY: usize = 8;

/// Deployment role of this Parley instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformRole {
    /// Holds the authoritative replica of cross-node workflow state.
    Center,
    /// Forwards globally-visible writes to the center deployment.
    Edge,
    /// Self-contained deployment spanning several locally-managed nodes.
    Autonomy,
}

impl PlatformRole {
    /// Returns true for the edge role, which must forward instead of commit.
    #[must_use]
    pub const fn is_edge(&self) -> bool {
        matches!(self, Self::Edge)
    }

    /// Returns true for the center role, which performs cross-record cleanup
    /// cascades on behalf of the whole platform.
    #[must_use]
    pub const fn is_center(&self) -> bool {
        matches!(self, Self::Center)
    }
}

impl std::str::FromStr for PlatformRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CENTER" => Ok(Self::Center),
            "EDGE" => Ok(Self::Edge),
            "AUTONOMY" => Ok(Self::Autonomy),
            other => Err(Error::configuration(format!(
                "unknown platform role '{other}', expected CENTER, EDGE or AUTONOMY"
            ))),
        }
    }
}

impl std::fmt::Display for PlatformRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Center => write!(f, "CENTER"),
            Self::Edge => write!(f, "EDGE"),
            Self::Autonomy => write!(f, "AUTONOMY"),
        }
    }
}

/// Runtime configuration for a Parley deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Deployment role.
    pub role: PlatformRole,
    /// The node this deployment acts for.
    pub local_node_id: NodeId,
    /// The TEE node used as the neutral compute venue.
    pub tee_node_id: NodeId,
    /// Datasource used for staged datasets when callers do not name one.
    pub default_datasource_id: String,
    /// Center ingestion endpoint; required when the role is edge.
    pub center_endpoint: Option<String>,
    /// Overall deadline for cross-node aggregate queries.
    pub aggregate_timeout: Duration,
    /// Maximum number of concurrent per-node queries during fan-out.
    pub fan_out_concurrency: usize,
}

impl PlatformConfig {
    /// Builds a config with defaults for the given role and local node.
    #[must_use]
    pub fn new(role: PlatformRole, local_node_id: NodeId) -> Self {
        Self {
            role,
            local_node_id,
            tee_node_id: NodeId::new(DEFAULT_TEE_NODE_ID),
            default_datasource_id: DEFAULT_DATASOURCE_ID.to_string(),
            center_endpoint: None,
            aggregate_timeout: Duration::from_secs(DEFAULT_AGGREGATE_TIMEOUT_SECS),
            fan_out_concurrency: DEFAULT_FAN_OUT_CONCURRENCY,
        }
    }

    /// Loads configuration from the process environment with strict validation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a required variable is missing,
    /// a numeric value is not a positive integer, or an edge deployment has
    /// no center endpoint configured.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration with a custom environment source.
    ///
    /// This entry point is test-friendly and accepts a key lookup function.
    ///
    /// # Errors
    ///
    /// Same contract as [`PlatformConfig::from_env`].
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let role: PlatformRole = get_env(ENV_PLATFORM_ROLE)
            .ok_or_else(|| Error::configuration(format!("{ENV_PLATFORM_ROLE} is not set")))?
            .parse()?;
        let local_node_id = get_env(ENV_LOCAL_NODE_ID)
            .ok_or_else(|| Error::configuration(format!("{ENV_LOCAL_NODE_ID} is not set")))?;
        if local_node_id.trim().is_empty() {
            return Err(Error::configuration(format!(
                "{ENV_LOCAL_NODE_ID} must not be empty"
            )));
        }

        let tee_node_id =
            get_env(ENV_TEE_NODE_ID).unwrap_or_else(|| DEFAULT_TEE_NODE_ID.to_string());
        let default_datasource_id =
            get_env(ENV_DEFAULT_DATASOURCE_ID).unwrap_or_else(|| DEFAULT_DATASOURCE_ID.to_string());
        let center_endpoint = get_env(ENV_CENTER_ENDPOINT);

        if role.is_edge() && center_endpoint.is_none() {
            return Err(Error::configuration(format!(
                "{ENV_CENTER_ENDPOINT} is required for edge deployments"
            )));
        }

        let aggregate_timeout_secs = parse_positive_u64_env(
            &get_env,
            ENV_AGGREGATE_TIMEOUT_SECS,
            DEFAULT_AGGREGATE_TIMEOUT_SECS,
        )?;
        let fan_out_concurrency = parse_positive_u64_env(
            &get_env,
            ENV_FAN_OUT_CONCURRENCY,
            DEFAULT_FAN_OUT_CONCURRENCY as u64,
        )?;
        let fan_out_concurrency = usize::try_from(fan_out_concurrency).map_err(|_| {
            Error::configuration(format!(
                "{ENV_FAN_OUT_CONCURRENCY} value {fan_out_concurrency} exceeds supported range"
            ))
        })?;

        Ok(Self {
            role,
            local_node_id: NodeId::new(local_node_id),
            tee_node_id: NodeId::new(tee_node_id),
            default_datasource_id,
            center_endpoint,
            aggregate_timeout: Duration::from_secs(aggregate_timeout_secs),
            fan_out_concurrency,
        })
    }
}

fn parse_positive_u64_env<F>(get_env: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match get_env(key) {
        None => Ok(default),
        Some(raw) => {
            let value: u64 = raw.trim().parse().map_err(|_| {
                Error::configuration(format!("{key} value '{raw}' is not a positive integer"))
            })?;
            if value == 0 {
                return Err(Error::configuration(format!("{key} must be positive")));
            }
            Ok(value)
        }
    }
}
