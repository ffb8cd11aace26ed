//! Core scheduling logic
//!
//! This module contains the worker-pool bookkeeping and the loading protocol.
//! Nothing in here performs I/O directly: processes and the cache are reached
//! through the traits in `crate::traits`.

pub mod block_registry;
pub mod loading;
pub mod pool;
pub mod sourcing;
pub mod worker;

pub use block_registry::BlockRegistry;
pub use loading::{LoadSettings, LoadingPoolManager};
pub use pool::WorkerPool;
pub use sourcing::SourcingPoolManager;
pub use worker::{Progress, WorkerHandle, WorkerStatus};
