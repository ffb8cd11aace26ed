//! In-process batch cache
//!
//! Cloning yields another handle onto the same state, so a sourcing side (or a
//! test) can keep registering batches while the orchestrator owns its copy.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use shared::{
    DrainTicket, NodeSetDetail, RelSetDetail, SetDescriptor, SetId, SetKind, SetMeta, WorkerLogRecord,
};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::Cache;

#[derive(Debug)]
struct CacheState {
    reachable: bool,
    /// Pending batches in registration order
    sets: Vec<SetMeta>,
    /// Remaining `is_drain_done` polls before a drain reports done
    drains: HashMap<DrainTicket, usize>,
    drain_order: Vec<SetId>,
    drain_latency: usize,
    next_ticket: u64,
    logs: VecDeque<WorkerLogRecord>,
}

#[derive(Debug, Clone)]
pub struct InMemoryCache {
    state: Arc<Mutex<CacheState>>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                reachable: true,
                sets: Vec::new(),
                drains: HashMap::new(),
                drain_order: Vec::new(),
                drain_latency: 0,
                next_ticket: 1,
                logs: VecDeque::new(),
            })),
        }
    }

    /// Number of polls a drain stays pending after it was ordered
    pub fn with_drain_latency(self, polls: usize) -> Self {
        self.lock().drain_latency = polls;
        self
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // State stays consistent across a panicking holder; keep serving
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Register a batch, or grow the size of an already pending one
    pub fn add_set(&self, meta: SetMeta) -> SetMeta {
        let mut state = self.lock();
        match state.sets.iter_mut().find(|m| **m == meta) {
            Some(existing) => {
                existing.total_size_bytes += meta.total_size_bytes;
                existing.clone()
            }
            None => {
                state.sets.push(meta.clone());
                meta
            }
        }
    }

    pub fn add_node_set(&self, labels: &[&str], size_bytes: u64) -> SetMeta {
        self.add_set(SetMeta::nodes(labels, size_bytes))
    }

    pub fn add_rel_set(&self, start_labels: &[&str], rel_type: &str, end_labels: &[&str], size_bytes: u64) -> SetMeta {
        self.add_set(SetMeta::relationships(start_labels, rel_type, end_labels, size_bytes))
    }

    /// Drop a batch once it has been consumed; returns false if it was not pending
    pub fn remove_set(&self, meta: &SetMeta) -> bool {
        let mut state = self.lock();
        let before = state.sets.len();
        state.sets.retain(|m| m != meta);
        state.sets.len() != before
    }

    pub fn pending_sets(&self) -> Vec<SetMeta> {
        self.lock().sets.clone()
    }

    /// Relationship batches in the order their drains were requested
    pub fn drain_order(&self) -> Vec<SetId> {
        self.lock().drain_order.clone()
    }

    pub fn push_log(&self, record: WorkerLogRecord) {
        self.lock().logs.push_back(record);
    }

    fn pending(&self, meta: &SetMeta) -> OrchestratorResult<SetMeta> {
        self.lock()
            .sets
            .iter()
            .find(|m| *m == meta)
            .cloned()
            .ok_or_else(|| OrchestratorError::cache(format!("no pending batch {}", meta.id)))
    }

    fn ensure_reachable(&self) -> OrchestratorResult<()> {
        if self.lock().reachable {
            Ok(())
        } else {
            Err(OrchestratorError::cache("in-memory cache marked unreachable"))
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn test_connection(&self) -> bool {
        self.lock().reachable
    }

    async fn list_sets_meta(&self, kind: Option<SetKind>) -> OrchestratorResult<Vec<SetMeta>> {
        self.ensure_reachable()?;
        Ok(self
            .lock()
            .sets
            .iter()
            .filter(|m| kind.map_or(true, |k| m.kind() == k))
            .cloned()
            .collect())
    }

    async fn order_drain(&self, rel_set: &SetMeta) -> OrchestratorResult<DrainTicket> {
        self.ensure_reachable()?;
        let meta = self.pending(rel_set)?;
        if meta.kind() != SetKind::RelationshipBatch {
            return Err(OrchestratorError::cache(format!("{} is not a relationship batch", meta.id)));
        }

        let mut state = self.lock();
        let ticket = DrainTicket::new(format!("drain-{}", state.next_ticket));
        state.next_ticket += 1;
        let latency = state.drain_latency;
        state.drains.insert(ticket.clone(), latency);
        state.drain_order.push(meta.id);
        Ok(ticket)
    }

    async fn is_drain_done(&self, ticket: &DrainTicket) -> OrchestratorResult<bool> {
        self.ensure_reachable()?;
        let mut state = self.lock();
        let remaining = state
            .drains
            .get_mut(ticket)
            .ok_or_else(|| OrchestratorError::cache(format!("unknown drain ticket {ticket}")))?;
        if *remaining == 0 {
            return Ok(true);
        }
        *remaining -= 1;
        Ok(false)
    }

    async fn rel_set_detail(&self, rel_set: &SetMeta) -> OrchestratorResult<RelSetDetail> {
        self.ensure_reachable()?;
        let rel_type = match &rel_set.descriptor {
            SetDescriptor::Relationships { rel_type, .. } => rel_type.clone(),
            SetDescriptor::Nodes { .. } => {
                return Err(OrchestratorError::cache(format!("{} is not a relationship batch", rel_set.id)));
            }
        };

        let mut target_node_sets: Vec<SetMeta> = Vec::new();
        for target in rel_set.endpoint_node_sets() {
            if !target_node_sets.contains(&target) {
                target_node_sets.push(target);
            }
        }
        Ok(RelSetDetail {
            rel_type,
            target_node_sets,
        })
    }

    async fn node_set_detail(&self, node_set: &SetMeta) -> OrchestratorResult<NodeSetDetail> {
        self.ensure_reachable()?;
        match &node_set.descriptor {
            SetDescriptor::Nodes { labels } => Ok(NodeSetDetail { labels: labels.clone() }),
            SetDescriptor::Relationships { .. } => {
                Err(OrchestratorError::cache(format!("{} is not a node batch", node_set.id)))
            }
        }
    }

    async fn pending_log_count(&self) -> OrchestratorResult<usize> {
        self.ensure_reachable()?;
        Ok(self.lock().logs.len())
    }

    async fn fetch_log_records(&self, max: usize) -> OrchestratorResult<Vec<WorkerLogRecord>> {
        self.ensure_reachable()?;
        let mut state = self.lock();
        let take = max.min(state.logs.len());
        let records = state.logs.drain(..take).collect();
        Ok(records)
    }
}
