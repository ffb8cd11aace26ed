//! Worker job payloads
//!
//! The orchestrator serializes a `WorkerJob` into the `BULKLOAD_JOB` environment
//! variable of every worker process it spawns. Worker programs read it back with
//! [`WorkerJob::from_env`].

use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};
use crate::types::{GraphParams, InsertMode, SetMeta, WorkerTag};

/// Environment variable carrying the JSON encoded job
pub const ENV_JOB: &str = "BULKLOAD_JOB";

/// Environment variable carrying the worker's assigned name
pub const ENV_WORKER_NAME: &str = "BULKLOAD_WORKER_NAME";

/// Environment variable carrying the orchestrator's log level
pub const ENV_LOG_LEVEL: &str = "BULKLOAD_LOG_LEVEL";

/// Parameters of one sourcing shard; the shape is defined by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourcingJob(pub serde_json::Value);

/// Parameters of one loading worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingJob {
    pub set_meta: SetMeta,
    pub graph_params: GraphParams,
    pub insert_mode: InsertMode,
    pub create_index: bool,
    pub create_unique_constraints: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum WorkerJob {
    Sourcing(SourcingJob),
    NodeLoad(LoadingJob),
    RelLoad(LoadingJob),
}

impl WorkerJob {
    pub fn tag(&self) -> WorkerTag {
        match self {
            WorkerJob::Sourcing(_) => WorkerTag::Sourcing,
            WorkerJob::NodeLoad(_) => WorkerTag::NodeLoad,
            WorkerJob::RelLoad(_) => WorkerTag::RelLoad,
        }
    }

    /// The batch this job loads, if it is a loading job
    pub fn set_meta(&self) -> Option<&SetMeta> {
        match self {
            WorkerJob::Sourcing(_) => None,
            WorkerJob::NodeLoad(job) | WorkerJob::RelLoad(job) => Some(&job.set_meta),
        }
    }

    pub fn to_json(&self) -> SharedResult<String> {
        serde_json::to_string(self).map_err(|e| SharedError::SerializationError { message: e.to_string() })
    }

    pub fn from_json(raw: &str) -> SharedResult<Self> {
        serde_json::from_str(raw).map_err(|e| SharedError::DeserializationError { message: e.to_string() })
    }

    /// Read the job assigned to the current worker process
    pub fn from_env() -> SharedResult<Self> {
        let raw = std::env::var(ENV_JOB).map_err(|_| SharedError::MissingEnv {
            name: ENV_JOB.to_string(),
        })?;
        Self::from_json(&raw)
    }
}
