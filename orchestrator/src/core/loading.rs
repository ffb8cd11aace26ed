//! Loading pool: node-batch and relationship-batch loaders
//!
//! Both sub-pools are fed from the cache listing every tick. Relationship
//! loaders go through a drain gate before they may start:
//!
//! 1. the oldest queued relationship handle gets a drain order (at most one per
//!    tick, and only while fewer than `max_outstanding_drains` are waiting);
//! 2. once the cache reports the drain done, the target node sets are blocked
//!    in the registry so no new node loader is queued for them;
//! 3. node loaders for those sets that were already queued or running must
//!    finish first;
//! 4. only then does the handle join the drain-ready FIFO, whose head starts
//!    when a relationship core is free.
//!
//! A relationship batch is therefore never written while a node loader for one
//! of its endpoint sets that existed at drain time is still in flight.

use std::collections::{HashSet, VecDeque};

use shared::{
    process_debug, process_info, GraphParams, InsertMode, LoadingJob, ProcessId, SetKind, SetMeta, WorkerId,
    WorkerJob, WorkerTag,
};

use super::block_registry::BlockRegistry;
use super::pool::WorkerPool;
use super::worker::{Progress, WorkerStatus};
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorResult;
use crate::traits::{Cache, WorkerLauncher};

/// Run-wide parameters forwarded to every loading worker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSettings {
    pub graph_params: GraphParams,
    pub insert_mode: InsertMode,
    pub create_index: bool,
    pub create_unique_constraints: bool,
}

pub struct LoadingPoolManager {
    pool: WorkerPool,
    settings: LoadSettings,
    config: OrchestratorConfig,
    /// Drain ordered, not yet ready; in order of issue
    drain_waiting: Vec<WorkerId>,
    drain_ready: VecDeque<WorkerId>,
}

impl LoadingPoolManager {
    pub const POOL_NAME: &'static str = "LoadingPool";

    pub fn new(settings: LoadSettings, config: OrchestratorConfig) -> Self {
        Self {
            pool: WorkerPool::new(Self::POOL_NAME),
            settings,
            config,
            drain_waiting: Vec::new(),
            drain_ready: VecDeque::new(),
        }
    }

    /// One tick: split the loading budget and manage both sub-pools
    pub async fn manage(
        &mut self,
        cache: &dyn Cache,
        launcher: &dyn WorkerLauncher,
        blocks: &mut BlockRegistry,
        loading_cores: usize,
    ) -> OrchestratorResult<()> {
        let (node_cores, rel_cores) = self.config.split_loading_cores(loading_cores);
        self.manage_node_loading(cache, launcher, blocks, node_cores).await?;
        self.manage_rel_loading(cache, launcher, blocks, rel_cores).await
    }

    pub async fn manage_node_loading(
        &mut self,
        cache: &dyn Cache,
        launcher: &dyn WorkerLauncher,
        blocks: &mut BlockRegistry,
        cores: usize,
    ) -> OrchestratorResult<()> {
        let cached = cache.list_sets_meta(Some(SetKind::NodeBatch)).await?;
        let worked_on = self.active_sets(WorkerTag::NodeLoad);

        let candidates: Vec<SetMeta> = cached
            .into_iter()
            .filter(|meta| !worked_on.contains(meta) && !blocks.is_blocked(meta))
            .collect();

        if !candidates.is_empty() {
            let mut names = Vec::with_capacity(candidates.len());
            for meta in &candidates {
                names.push(cache.node_set_detail(meta).await?.labels.join(":"));
            }
            let jobs = candidates
                .into_iter()
                .map(|meta| WorkerJob::NodeLoad(self.loading_job(meta)))
                .collect();
            self.pool.init_workers(launcher, jobs, Some(names), WorkerTag::NodeLoad)?;
        }

        let running = self.pool.count(&[WorkerStatus::Running], Some(WorkerTag::NodeLoad))?;
        let free = cores.saturating_sub(running);
        let queued = self.queued(WorkerTag::NodeLoad);

        let mut started = 0;
        for id in queued.iter().take(free.min(self.config.promotions_per_tick)) {
            self.pool.start(id)?;
            started += 1;
        }

        let reaped = self.pool.reap(Some(WorkerTag::NodeLoad), blocks).await?;
        if reaped > 0 || started > 0 {
            self.log_counts("LOADING-NODESETS", cores)?;
        }
        Ok(())
    }

    pub async fn manage_rel_loading(
        &mut self,
        cache: &dyn Cache,
        launcher: &dyn WorkerLauncher,
        blocks: &mut BlockRegistry,
        cores: usize,
    ) -> OrchestratorResult<()> {
        let cached = cache.list_sets_meta(Some(SetKind::RelationshipBatch)).await?;
        let worked_on = self.active_sets(WorkerTag::RelLoad);

        let fresh: Vec<SetMeta> = cached.into_iter().filter(|meta| !worked_on.contains(meta)).collect();
        if !fresh.is_empty() {
            let mut names = Vec::with_capacity(fresh.len());
            for meta in &fresh {
                names.push(cache.rel_set_detail(meta).await?.rel_type);
            }
            let jobs = fresh
                .into_iter()
                .map(|meta| WorkerJob::RelLoad(self.loading_job(meta)))
                .collect();
            self.pool.init_workers(launcher, jobs, Some(names), WorkerTag::RelLoad)?;
        }

        self.advance_drains(cache, blocks).await?;

        let running = self.pool.count(&[WorkerStatus::Running], Some(WorkerTag::RelLoad))?;
        let free = cores.saturating_sub(running);

        let mut started = 0;
        while started < free.min(self.config.promotions_per_tick) {
            let Some(head) = self.drain_ready.front().copied() else {
                break;
            };
            if self.config.serialize_overlapping_relationship_loads && self.overlaps_running_rel_load(&head) {
                process_debug!(
                    ProcessId::current(),
                    "Drain-ready head {} shares target node sets with a running relationship loader; holding",
                    head
                );
                break;
            }
            self.drain_ready.pop_front();
            self.pool.start(&head)?;
            started += 1;
        }

        let reaped = self.pool.reap(Some(WorkerTag::RelLoad), blocks).await?;
        if reaped > 0 || started > 0 {
            self.log_counts("LOADING-RELSETS", cores)?;
        }
        Ok(())
    }

    /// Issue the next drain order and promote drained handles whose targets are clear
    pub async fn advance_drains(&mut self, cache: &dyn Cache, blocks: &mut BlockRegistry) -> OrchestratorResult<()> {
        if self.drain_waiting.len() < self.config.max_outstanding_drains {
            let next = self
                .pool
                .handles()
                .find(|h| h.tag == WorkerTag::RelLoad && h.progress == Progress::Queued)
                .and_then(|h| h.set_meta().cloned().map(|meta| (h.id, meta)));

            if let Some((id, meta)) = next {
                let ticket = cache.order_drain(&meta).await?;
                process_debug!(ProcessId::current(), "Ordered drain {} for {}", ticket, meta.id);
                if let Some(handle) = self.pool.handle_mut(&id) {
                    handle.progress = Progress::DrainOrdered { ticket };
                }
                self.drain_waiting.push(id);
            }
        }

        let nodes_in_flight = self.active_sets(WorkerTag::NodeLoad);
        let mut still_waiting = Vec::with_capacity(self.drain_waiting.len());

        for id in self.drain_waiting.clone() {
            let Some(handle) = self.pool.handle(&id) else {
                continue;
            };
            let (Progress::DrainOrdered { ticket }, Some(meta)) = (handle.progress.clone(), handle.set_meta().cloned())
            else {
                continue;
            };

            if !cache.is_drain_done(&ticket).await? {
                still_waiting.push(id);
                continue;
            }

            // From here on no new node loader may be queued for the targets
            let detail = cache.rel_set_detail(&meta).await?;
            for target in &detail.target_node_sets {
                blocks.block(id, target.clone());
            }

            // Node loaders queued or running before the block still have to finish
            let pending: Vec<&SetMeta> = detail
                .target_node_sets
                .iter()
                .filter(|target| nodes_in_flight.contains(*target))
                .collect();
            if !pending.is_empty() {
                process_debug!(
                    ProcessId::current(),
                    "Drain {} done but {} still has node loaders in flight: {:?}",
                    ticket,
                    meta.id,
                    pending.iter().map(|m| m.id.as_str()).collect::<Vec<_>>()
                );
                still_waiting.push(id);
                continue;
            }

            process_info!(ProcessId::current(), "Drain {} finished, {} is ready to load", ticket, meta.id);
            if let Some(handle) = self.pool.handle_mut(&id) {
                handle.progress = Progress::DrainReady;
                handle.target_node_sets = detail.target_node_sets;
            }
            self.drain_ready.push_back(id);
        }

        self.drain_waiting = still_waiting;
        Ok(())
    }

    /// Sourcing is done, the cache is empty and every loader has been reaped
    ///
    /// A loader that exited after this tick's reap still counts as busy, so its
    /// exit code is seen by the next tick.
    pub async fn is_done(&mut self, sourcing_done: bool, cache: &dyn Cache) -> OrchestratorResult<bool> {
        if !sourcing_done {
            return Ok(false);
        }
        if !cache.list_sets_meta(None).await?.is_empty() {
            return Ok(false);
        }
        let busy = self.pool.count(
            &[
                WorkerStatus::Running,
                WorkerStatus::Initial,
                WorkerStatus::Exited,
                WorkerStatus::Failed,
            ],
            None,
        )?;
        Ok(busy == 0)
    }

    fn loading_job(&self, set_meta: SetMeta) -> LoadingJob {
        LoadingJob {
            set_meta,
            graph_params: self.settings.graph_params.clone(),
            insert_mode: self.settings.insert_mode,
            create_index: self.settings.create_index,
            create_unique_constraints: self.settings.create_unique_constraints,
        }
    }

    /// Batches owned by queued, draining or running handles of `tag`
    fn active_sets(&self, tag: WorkerTag) -> HashSet<SetMeta> {
        self.pool
            .handles()
            .filter(|h| h.tag == tag && h.progress.is_active())
            .filter_map(|h| h.set_meta().cloned())
            .collect()
    }

    fn queued(&self, tag: WorkerTag) -> Vec<WorkerId> {
        self.pool
            .handles()
            .filter(|h| h.tag == tag && h.progress == Progress::Queued)
            .map(|h| h.id)
            .collect()
    }

    fn overlaps_running_rel_load(&self, candidate: &WorkerId) -> bool {
        let Some(candidate) = self.pool.handle(candidate) else {
            return false;
        };
        self.pool
            .handles()
            .filter(|h| h.tag == WorkerTag::RelLoad && h.id != candidate.id && h.progress == Progress::Started)
            .any(|running| {
                running
                    .target_node_sets()
                    .iter()
                    .any(|t| candidate.target_node_sets().contains(t))
            })
    }

    fn log_counts(&mut self, label: &str, cores: usize) -> OrchestratorResult<()> {
        process_debug!(
            ProcessId::current(),
            "{}: {} Workers finished / {} Workers running / {} Workers waiting / {} Workers failed / {} Max loading workers running simultaneously",
            label,
            self.pool.finished_count(None) + self.pool.failed_count(),
            self.pool.count(&[WorkerStatus::Running], None)?,
            self.pool.count(&[WorkerStatus::Initial], None)?,
            self.pool.failed_count(),
            cores
        );
        Ok(())
    }

    pub fn drain_waiting(&self) -> &[WorkerId] {
        &self.drain_waiting
    }

    pub fn drain_ready(&self) -> impl Iterator<Item = &WorkerId> {
        self.drain_ready.iter()
    }

    pub fn settings(&self) -> &LoadSettings {
        &self.settings
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut WorkerPool {
        &mut self.pool
    }
}
