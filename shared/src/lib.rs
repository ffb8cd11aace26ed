//! Shared types for the bulk-load system
//!
//! Contains the types that cross process boundaries: cached batch descriptors,
//! worker job payloads and relayed log records, plus the logging setup used by
//! the orchestrator and by worker programs.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use types::*;

pub use messages::{LoadingJob, LogLevel, SourcingJob, WorkerJob, WorkerLogRecord};
