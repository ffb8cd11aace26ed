//! Orchestrator configuration
//!
//! ## Configuration Sources
//! Values are loaded from:
//! 1. `.env` file in the current directory or parent directories (if present)
//! 2. System environment variables (`BULKLOAD_*`)
//!
//! Environment variables take precedence over .env file values. Anything not
//! set keeps its default. Durations are given in milliseconds.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{OrchestratorError, OrchestratorResult};

/// Tunables of the tick loop and the loading protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Sleep between two ticks
    #[serde(with = "duration_ms")]
    pub tick_interval: Duration,

    /// Share of the loading cores given to node loaders; relationship loaders get the rest
    pub node_core_share: f64,

    /// Queued handles promoted to running per pool per tick
    pub promotions_per_tick: usize,

    /// Drain orders allowed to wait for readiness at the same time
    pub max_outstanding_drains: usize,

    /// Hold back a drain-ready relationship loader while a running one shares a target node set
    pub serialize_overlapping_relationship_loads: bool,

    pub create_indexes: bool,
    pub create_unique_constraints: bool,

    /// Terminate still-running workers when a worker failure aborts the run
    pub terminate_on_failure: bool,

    #[serde(with = "duration_ms")]
    pub termination_grace: Duration,

    /// Max worker log records relayed per tick
    pub log_relay_batch: usize,

    #[serde(with = "duration_ms")]
    pub log_flush_poll_interval: Duration,

    #[serde(with = "duration_ms")]
    pub log_flush_timeout: Duration,

    /// Cache budget consulted by the cache-aware strategy
    pub cache_size_bytes: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            node_core_share: 0.6,
            promotions_per_tick: 1,
            max_outstanding_drains: 1,
            serialize_overlapping_relationship_loads: true,
            create_indexes: true,
            create_unique_constraints: false,
            terminate_on_failure: true,
            termination_grace: Duration::from_secs(5),
            log_relay_batch: 100,
            log_flush_poll_interval: Duration::from_millis(300),
            log_flush_timeout: Duration::from_secs(30),
            cache_size_bytes: 500 * 1000 * 1000,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from `.env` and `BULKLOAD_*` environment variables
    pub fn from_env() -> OrchestratorResult<Self> {
        // Silently ignored when no .env file exists
        let _ = dotenv::dotenv();

        let mut config = Self::default();
        if let Some(ms) = env_value::<u64>("BULKLOAD_TICK_INTERVAL_MS")? {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(share) = env_value("BULKLOAD_NODE_CORE_SHARE")? {
            config.node_core_share = share;
        }
        if let Some(n) = env_value("BULKLOAD_PROMOTIONS_PER_TICK")? {
            config.promotions_per_tick = n;
        }
        if let Some(n) = env_value("BULKLOAD_MAX_OUTSTANDING_DRAINS")? {
            config.max_outstanding_drains = n;
        }
        if let Some(flag) = env_value("BULKLOAD_SERIALIZE_OVERLAPPING_RELATIONSHIP_LOADS")? {
            config.serialize_overlapping_relationship_loads = flag;
        }
        if let Some(flag) = env_value("BULKLOAD_CREATE_INDEXES")? {
            config.create_indexes = flag;
        }
        if let Some(flag) = env_value("BULKLOAD_CREATE_UNIQUE_CONSTRAINTS")? {
            config.create_unique_constraints = flag;
        }
        if let Some(flag) = env_value("BULKLOAD_TERMINATE_ON_FAILURE")? {
            config.terminate_on_failure = flag;
        }
        if let Some(ms) = env_value::<u64>("BULKLOAD_TERMINATION_GRACE_MS")? {
            config.termination_grace = Duration::from_millis(ms);
        }
        if let Some(n) = env_value("BULKLOAD_LOG_RELAY_BATCH")? {
            config.log_relay_batch = n;
        }
        if let Some(ms) = env_value::<u64>("BULKLOAD_LOG_FLUSH_POLL_INTERVAL_MS")? {
            config.log_flush_poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_value::<u64>("BULKLOAD_LOG_FLUSH_TIMEOUT_MS")? {
            config.log_flush_timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = env_value("BULKLOAD_CACHE_SIZE_BYTES")? {
            config.cache_size_bytes = bytes;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.tick_interval.is_zero() {
            return Err(OrchestratorError::config("tick_interval", "must be greater than zero"));
        }
        if !(self.node_core_share > 0.0 && self.node_core_share < 1.0) {
            return Err(OrchestratorError::config(
                "node_core_share",
                format!("must be strictly between 0 and 1, got {}", self.node_core_share),
            ));
        }
        if self.promotions_per_tick == 0 {
            return Err(OrchestratorError::config("promotions_per_tick", "must be at least 1"));
        }
        if self.max_outstanding_drains == 0 {
            return Err(OrchestratorError::config("max_outstanding_drains", "must be at least 1"));
        }
        if self.log_flush_poll_interval.is_zero() {
            return Err(OrchestratorError::config("log_flush_poll_interval", "must be greater than zero"));
        }
        Ok(())
    }

    /// Split a loading budget into (node, relationship) cores, each at least 1
    pub fn split_loading_cores(&self, loading_cores: usize) -> (usize, usize) {
        let total = loading_cores as f64;
        let node = (total * self.node_core_share).round() as usize;
        let rel = (total * (1.0 - self.node_core_share)).round() as usize;
        (node.max(1), rel.max(1))
    }
}

fn env_value<T: FromStr>(name: &str) -> OrchestratorResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| OrchestratorError::config(name, format!("cannot parse '{raw}'"))),
        Err(_) => Ok(None),
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
