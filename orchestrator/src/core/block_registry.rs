//! Registry of node sets that must not receive new loaders
//!
//! A relationship loader whose drain is done blocks the node sets it points
//! at until it finishes or fails. Keys are the owning worker's id.

use std::collections::{BTreeMap, HashSet};

use shared::{SetMeta, WorkerId};

#[derive(Debug, Default)]
pub struct BlockRegistry {
    blocks: BTreeMap<WorkerId, HashSet<SetMeta>>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block a node set on behalf of `owner`; returns false if it already held that block
    pub fn block(&mut self, owner: WorkerId, node_set: SetMeta) -> bool {
        self.blocks.entry(owner).or_default().insert(node_set)
    }

    /// Drop every block held by `owner`
    pub fn release(&mut self, owner: &WorkerId) -> Option<HashSet<SetMeta>> {
        self.blocks.remove(owner)
    }

    /// Flattened, de-duplicated view across all owners, ordered by set id
    pub fn blocked_node_sets(&self) -> Vec<SetMeta> {
        let unique: HashSet<&SetMeta> = self.blocks.values().flatten().collect();
        let mut blocked: Vec<SetMeta> = unique.into_iter().cloned().collect();
        blocked.sort_by(|a, b| a.id.cmp(&b.id));
        blocked
    }

    pub fn is_blocked(&self, node_set: &SetMeta) -> bool {
        self.blocks.values().any(|sets| sets.contains(node_set))
    }

    pub fn holds_block(&self, owner: &WorkerId) -> bool {
        self.blocks.contains_key(owner)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}
