//! Core shared types and identifiers
//!
//! These types cross the process boundary: the orchestrator hands them to
//! worker programs inside job payloads, and the cache hands them back to the
//! orchestrator when listing pending batches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use uuid::Uuid;

/// Global process ID singleton - set once at startup
static PROCESS_ID: OnceLock<ProcessId> = OnceLock::new();

/// Fallback used before any `init_*` call
static DEFAULT_PROCESS_ID: ProcessId = ProcessId::Orchestrator;

/// Process identifier for any component in the system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// Orchestrator process (singleton)
    Orchestrator,
    /// Worker process, identified by the name the orchestrator assigned it
    Worker(String),
}

impl ProcessId {
    /// Initialize the global process ID for orchestrator
    pub fn init_orchestrator() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Orchestrator)
    }

    /// Initialize the global process ID for a worker
    pub fn init_worker(name: impl Into<String>) -> &'static ProcessId {
        let name = name.into();
        PROCESS_ID.get_or_init(|| ProcessId::Worker(name))
    }

    /// Get the global process ID, defaulting to the orchestrator
    pub fn current() -> &'static ProcessId {
        PROCESS_ID.get().unwrap_or(&DEFAULT_PROCESS_ID)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Orchestrator => write!(f, "orchestrator"),
            ProcessId::Worker(name) => write!(f, "worker:{name}"),
        }
    }
}

/// Unique identifier for a worker handle
///
/// Doubles as the owner id of blocks in the node-set block registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(Uuid);

impl WorkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification used to filter a pool's worker handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerTag {
    Sourcing,
    NodeLoad,
    RelLoad,
}

impl fmt::Display for WorkerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerTag::Sourcing => write!(f, "SOURCING"),
            WorkerTag::NodeLoad => write!(f, "NODESET"),
            WorkerTag::RelLoad => write!(f, "RELSET"),
        }
    }
}

/// How loading workers write into the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    #[default]
    Create,
    Merge,
}

impl fmt::Display for InsertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertMode::Create => write!(f, "create"),
            InsertMode::Merge => write!(f, "merge"),
        }
    }
}

/// Graph database connection parameters, passed through to loading workers untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphParams(BTreeMap<String, serde_json::Value>);

impl GraphParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Kind of a cached batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetKind {
    NodeBatch,
    RelationshipBatch,
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetKind::NodeBatch => write!(f, "nodes"),
            SetKind::RelationshipBatch => write!(f, "relationships"),
        }
    }
}

/// Stable identity of a cached batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetId(String);

impl SetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity of the node batch for a label set, e.g. `(Person:Employee)`
    pub fn for_nodes<S: AsRef<str>>(labels: &[S]) -> Self {
        Self(format!("({})", join_labels(labels)))
    }

    /// Identity of a relationship batch, e.g. `(Person)-[KNOWS]->(Person)`
    pub fn for_relationships<S: AsRef<str>>(start_labels: &[S], rel_type: &str, end_labels: &[S]) -> Self {
        Self(format!(
            "({})-[{}]->({})",
            join_labels(start_labels),
            rel_type,
            join_labels(end_labels)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn join_labels<S: AsRef<str>>(labels: &[S]) -> String {
    labels.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(":")
}

/// Structural description of a cached batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetDescriptor {
    Nodes {
        labels: Vec<String>,
    },
    Relationships {
        rel_type: String,
        start_labels: Vec<String>,
        end_labels: Vec<String>,
    },
}

/// Cache-resident descriptor of one pending, homogeneous batch
///
/// Equality and hashing only consider `id`: the size grows while sourcing
/// workers keep appending, but the batch stays the same batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetMeta {
    pub id: SetId,
    pub descriptor: SetDescriptor,
    pub total_size_bytes: u64,
}

impl SetMeta {
    pub fn nodes<S: AsRef<str>>(labels: &[S], total_size_bytes: u64) -> Self {
        Self {
            id: SetId::for_nodes(labels),
            descriptor: SetDescriptor::Nodes {
                labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
            },
            total_size_bytes,
        }
    }

    pub fn relationships<S: AsRef<str>>(
        start_labels: &[S],
        rel_type: &str,
        end_labels: &[S],
        total_size_bytes: u64,
    ) -> Self {
        Self {
            id: SetId::for_relationships(start_labels, rel_type, end_labels),
            descriptor: SetDescriptor::Relationships {
                rel_type: rel_type.to_string(),
                start_labels: start_labels.iter().map(|l| l.as_ref().to_string()).collect(),
                end_labels: end_labels.iter().map(|l| l.as_ref().to_string()).collect(),
            },
            total_size_bytes,
        }
    }

    pub fn kind(&self) -> SetKind {
        match self.descriptor {
            SetDescriptor::Nodes { .. } => SetKind::NodeBatch,
            SetDescriptor::Relationships { .. } => SetKind::RelationshipBatch,
        }
    }

    /// Node batch metas for the start and end label sets of a relationship batch
    ///
    /// Returns an empty list for node batches. Both ends are returned even when
    /// they share a label set; callers dedupe by identity.
    pub fn endpoint_node_sets(&self) -> Vec<SetMeta> {
        match &self.descriptor {
            SetDescriptor::Nodes { .. } => Vec::new(),
            SetDescriptor::Relationships {
                start_labels, end_labels, ..
            } => vec![SetMeta::nodes(start_labels, 0), SetMeta::nodes(end_labels, 0)],
        }
    }
}

impl PartialEq for SetMeta {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SetMeta {}

impl Hash for SetMeta {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for SetMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.id, self.total_size_bytes)
    }
}

/// Opaque handle for a drain order issued by the cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrainTicket(String);

impl DrainTicket {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DrainTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relationship batch details as reported by the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelSetDetail {
    pub rel_type: String,
    pub target_node_sets: Vec<SetMeta>,
}

/// Node batch details as reported by the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSetDetail {
    pub labels: Vec<String>,
}
