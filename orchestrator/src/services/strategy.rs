//! Core-allocation strategies

use crate::config::OrchestratorConfig;
use crate::traits::{PoolSnapshot, Strategy};

/// Constant budgets, whatever the state of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedStrategy {
    pub sourcing: usize,
    pub loading: usize,
}

impl FixedStrategy {
    pub fn new(sourcing: usize, loading: usize) -> Self {
        Self { sourcing, loading }
    }
}

impl Strategy for FixedStrategy {
    fn sourcing_cores(&self, _snapshot: &PoolSnapshot) -> usize {
        self.sourcing
    }

    fn loading_cores(&self, _snapshot: &PoolSnapshot) -> usize {
        self.loading
    }
}

/// Shares the machine between sourcing and loading, pausing sourcing while the cache is full
///
/// One core is left to the orchestrator and the cache. Loading is sized to its
/// current demand; sourcing gets whatever loading leaves over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheBudgetStrategy {
    total_cores: usize,
    cache_size_bytes: u64,
}

impl CacheBudgetStrategy {
    pub fn new(cache_size_bytes: u64) -> Self {
        let available = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self::with_total_cores(available.saturating_sub(1), cache_size_bytes)
    }

    /// Strategy over every available core, bounded by the configured cache budget
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.cache_size_bytes)
    }

    pub fn with_total_cores(total_cores: usize, cache_size_bytes: u64) -> Self {
        Self {
            total_cores: total_cores.max(1),
            cache_size_bytes,
        }
    }

    pub fn total_cores(&self) -> usize {
        self.total_cores
    }

    pub fn cache_size_bytes(&self) -> u64 {
        self.cache_size_bytes
    }
}

impl Strategy for CacheBudgetStrategy {
    fn sourcing_cores(&self, snapshot: &PoolSnapshot) -> usize {
        if snapshot.pending_bytes >= self.cache_size_bytes {
            return 0;
        }
        self.total_cores.saturating_sub(snapshot.loading_running).max(1)
    }

    fn loading_cores(&self, snapshot: &PoolSnapshot) -> usize {
        self.total_cores.min(snapshot.loading_demand()).max(1)
    }
}
