//! Sourcing pool: independent extraction shards run up to the sourcing budget

use shared::{process_debug, ProcessId, SourcingJob, WorkerJob, WorkerTag};

use super::block_registry::BlockRegistry;
use super::pool::WorkerPool;
use super::worker::WorkerStatus;
use crate::error::OrchestratorResult;
use crate::traits::WorkerLauncher;

pub struct SourcingPoolManager {
    pool: WorkerPool,
    promotions_per_tick: usize,
}

impl SourcingPoolManager {
    pub const POOL_NAME: &'static str = "SourcingPool";

    /// Create one queued handle per shard
    pub fn new(
        launcher: &dyn WorkerLauncher,
        shards: Vec<SourcingJob>,
        names: Option<Vec<String>>,
        promotions_per_tick: usize,
    ) -> OrchestratorResult<Self> {
        let mut pool = WorkerPool::new(Self::POOL_NAME);
        let jobs = shards.into_iter().map(WorkerJob::Sourcing).collect();
        pool.init_workers(launcher, jobs, names, WorkerTag::Sourcing)?;
        Ok(Self {
            pool,
            promotions_per_tick,
        })
    }

    /// One tick: promote queued shards while under budget, then reap
    pub async fn manage(&mut self, available_cores: usize, blocks: &mut BlockRegistry) -> OrchestratorResult<()> {
        let running = self.pool.count(&[WorkerStatus::Running], Some(WorkerTag::Sourcing))?;
        let waiting = self.pool.workers(Some(&[WorkerStatus::Initial]), Some(WorkerTag::Sourcing))?;

        let free = available_cores.saturating_sub(running);
        let mut started = 0;
        for id in waiting.iter().take(free.min(self.promotions_per_tick)) {
            self.pool.start(id)?;
            started += 1;
        }

        let reaped = self.pool.reap(Some(WorkerTag::Sourcing), blocks).await?;
        if reaped > 0 || started > 0 {
            process_debug!(
                ProcessId::current(),
                "SOURCING: {} Workers finished / {} Workers running / {} Workers waiting / {} Workers failed / {} Max sourcing workers running simultaneously",
                self.pool.finished_count(None) + self.pool.failed_count(),
                self.pool.count(&[WorkerStatus::Running], None)?,
                self.pool.count(&[WorkerStatus::Initial], None)?,
                self.pool.failed_count(),
                available_cores
            );
        }
        Ok(())
    }

    /// Every shard reached finished or failed
    pub fn is_done(&self) -> bool {
        self.pool.all_settled()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut WorkerPool {
        &mut self.pool
    }
}
