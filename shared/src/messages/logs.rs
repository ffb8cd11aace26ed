//! Log records relayed from worker processes through the cache

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// One log line emitted by a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerLogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub worker: String,
    pub message: String,
}

impl WorkerLogRecord {
    pub fn new(level: LogLevel, worker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            worker: worker.into(),
            message: message.into(),
        }
    }
}
