//! Orchestrator library for bulk loading a graph from a batch cache
//!
//! Runs sourcing shards and node/relationship loaders as separate OS processes
//! and schedules them from a single-threaded tick loop. Relationship batches are
//! only loaded once their drain is done and every node loader for their
//! endpoint sets has finished.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::OrchestratorConfig;
pub use core::{BlockRegistry, LoadSettings, LoadingPoolManager, Progress, SourcingPoolManager, WorkerPool, WorkerStatus};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{Orchestrator, RunSummary};
pub use services::{CacheBudgetStrategy, ChildWorker, CommandLauncher, FixedStrategy, InMemoryCache, OutputMode};
pub use traits::{Cache, PoolSnapshot, Strategy, WorkerLauncher, WorkerProcess};

// Mocks for embedders' tests
pub use traits::{MockCache, MockStrategy, MockWorkerLauncher, MockWorkerProcess};
