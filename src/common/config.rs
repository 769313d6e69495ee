//! Configuration for the tsgate gateway

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind address for the HTTP query/write surface
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Coordination store endpoints (etcd)
    #[serde(default = "default_store_endpoints")]
    pub store_endpoints: Vec<String>,

    /// Root namespace for cluster keys in the coordination store
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Number of tokens on the hash ring
    #[serde(default = "default_num_tokens")]
    pub num_tokens: u64,

    /// Per-shard query timeout in milliseconds
    #[serde(default = "default_shard_timeout_ms")]
    pub shard_timeout_ms: u64,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8086".parse().unwrap()
}
fn default_store_endpoints() -> Vec<String> {
    vec!["http://localhost:2379".to_string()]
}
fn default_namespace() -> String {
    "tsgate-cluster".to_string()
}
fn default_num_tokens() -> u64 {
    256
}
fn default_shard_timeout_ms() -> u64 {
    10_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            store_endpoints: default_store_endpoints(),
            namespace: default_namespace(),
            num_tokens: default_num_tokens(),
            shard_timeout_ms: default_shard_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Per-shard query timeout as a `Duration`
    pub fn shard_timeout(&self) -> Duration {
        Duration::from_millis(self.shard_timeout_ms)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.store_endpoints.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "at least one coordination store endpoint is required".into(),
            ));
        }
        if self.num_tokens == 0 {
            return Err(crate::Error::InvalidConfig(
                "num_tokens must be positive".into(),
            ));
        }
        Ok(())
    }
}
