//! Payloads that cross the orchestrator/worker process boundary
//!
//! - `jobs`: what a worker process is asked to do
//! - `logs`: log records workers push into the cache for the orchestrator to relay

pub mod jobs;
pub mod logs;

pub use jobs::{LoadingJob, SourcingJob, WorkerJob, ENV_JOB, ENV_LOG_LEVEL, ENV_WORKER_NAME};
pub use logs::{LogLevel, WorkerLogRecord};
