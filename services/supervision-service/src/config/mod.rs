//! Environment-backed configuration loading.
//!
//! `SupervisionConfiguration` (in `supervision-models`) carries the shape and
//! defaults; this module is the one place that actually reads the process
//! environment, following the same `envy::prefixed` pattern the rest of this
//! workspace's services use, just with the `L08_` prefix the original
//! configuration module reserves for the supervision layer.

use serde::Deserialize;

use supervision_common::error::{Result, SupervisionError};
use supervision_models::SupervisionConfiguration;

/// Bind address, separate from `SupervisionConfiguration` because the
/// latter is also loaded standalone by non-HTTP callers (tests, batch
/// jobs) that have no use for a host/port.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8108 }
    }
}

pub fn load_server() -> Result<ServerConfig> {
    envy::prefixed("L08_")
        .from_env::<ServerConfig>()
        .map_err(|e| SupervisionError::ConfigLoadFailed(e.to_string()))
}

pub fn load() -> Result<SupervisionConfiguration> {
    dotenv::dotenv().ok();
    // `SupervisionConfiguration` carries `#[serde(default)]`, so any
    // `L08_*` variable left unset falls back to `Default::default()`
    // rather than failing the whole load.
    envy::prefixed("L08_")
        .from_env::<SupervisionConfiguration>()
        .map_err(|e| SupervisionError::ConfigLoadFailed(e.to_string()))
}
