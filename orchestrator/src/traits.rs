//! Trait definitions with mockall annotations for testing
//!
//! The orchestrator core only talks to its collaborators through these traits:
//! the batch cache, the core-allocation strategy, and the launcher that turns a
//! job into a worker process. Real implementations live in `services`.

use async_trait::async_trait;
use std::time::Duration;

use shared::{DrainTicket, NodeSetDetail, RelSetDetail, SetKind, SetMeta, WorkerJob, WorkerLogRecord};

use crate::error::OrchestratorResult;

/// Batch cache shared between sourcing workers (append) and loading workers (drain/read)
#[mockall::automock]
#[async_trait]
pub trait Cache: Send + Sync {
    /// Whether the backend is reachable
    async fn test_connection(&self) -> bool;

    /// List pending batches, optionally restricted to one kind
    async fn list_sets_meta(&self, kind: Option<SetKind>) -> OrchestratorResult<Vec<SetMeta>>;

    /// Stop appends to a relationship batch and finalize it for consumption
    async fn order_drain(&self, rel_set: &SetMeta) -> OrchestratorResult<DrainTicket>;

    async fn is_drain_done(&self, ticket: &DrainTicket) -> OrchestratorResult<bool>;

    async fn rel_set_detail(&self, rel_set: &SetMeta) -> OrchestratorResult<RelSetDetail>;

    async fn node_set_detail(&self, node_set: &SetMeta) -> OrchestratorResult<NodeSetDetail>;

    /// Worker log records not yet relayed
    async fn pending_log_count(&self) -> OrchestratorResult<usize>;

    /// Pop up to `max` worker log records, oldest first
    async fn fetch_log_records(&self, max: usize) -> OrchestratorResult<Vec<WorkerLogRecord>>;
}

/// Per-tick view of the run handed to the strategy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub sourcing_running: usize,
    pub sourcing_waiting: usize,
    pub loading_running: usize,
    pub loading_queued: usize,
    pub pending_sets: usize,
    pub pending_bytes: u64,
}

impl PoolSnapshot {
    /// Loading handles that could use a core right now
    pub fn loading_demand(&self) -> usize {
        self.loading_running + self.loading_queued
    }
}

/// Core-allocation heuristic, consulted fresh every tick
#[mockall::automock]
pub trait Strategy: Send + Sync {
    /// Processes allowed to run concurrently for sourcing
    fn sourcing_cores(&self, snapshot: &PoolSnapshot) -> usize;

    /// Processes allowed to run concurrently for loading, split between node and relationship loaders
    fn loading_cores(&self, snapshot: &PoolSnapshot) -> usize;
}

/// One worker OS process
///
/// Created in the initial (not started) state. `exit_code` is `None` until the
/// process has been observed to exit; a process killed by signal N reports `-N`.
#[mockall::automock]
#[async_trait]
pub trait WorkerProcess: Send {
    fn start(&mut self) -> OrchestratorResult<()>;

    fn is_alive(&mut self) -> bool;

    fn exit_code(&self) -> Option<i32>;

    fn pid(&self) -> Option<u32>;

    /// Reap a process already observed to have exited
    async fn join(&mut self) -> OrchestratorResult<()>;

    /// Ask the process to stop, killing it if it outlives `grace`
    async fn terminate(&mut self, grace: Duration) -> OrchestratorResult<()>;
}

/// Turns a named job into a (not yet started) worker process
#[mockall::automock]
pub trait WorkerLauncher: Send + Sync {
    fn create(&self, name: &str, job: &WorkerJob) -> OrchestratorResult<Box<dyn WorkerProcess>>;
}
