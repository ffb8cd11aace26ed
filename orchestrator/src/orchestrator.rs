//! Top-level orchestrator
//!
//! Owns the block registry and both pool managers and drives them from a
//! single-threaded tick loop. Collaborators (cache, strategy, worker launcher)
//! are injected so the whole loop can be exercised against in-memory doubles.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use shared::{
    logging, process_debug, process_info, process_warn, GraphParams, InsertMode, ProcessId, SetMeta, SourcingJob,
    WorkerTag,
};

use crate::config::OrchestratorConfig;
use crate::core::{BlockRegistry, LoadSettings, LoadingPoolManager, SourcingPoolManager, WorkerStatus};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{Cache, PoolSnapshot, Strategy, WorkerLauncher};

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub insert_mode: InsertMode,
    pub ticks: u64,
    pub sourcing_finished: usize,
    pub node_loads_finished: usize,
    pub rel_loads_finished: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// False when the shutdown log flush gave up before the cache reported empty
    pub logs_flushed: bool,
}

pub struct Orchestrator<C, S, L>
where
    C: Cache,
    S: Strategy,
    L: WorkerLauncher,
{
    config: OrchestratorConfig,

    /// Injected services
    cache: C,
    strategy: S,
    launcher: L,

    sourcing_jobs: Vec<SourcingJob>,
    sourcing_names: Option<Vec<String>>,

    /// Node sets closed to new loaders, keyed by the owning relationship loader
    blocks: BlockRegistry,

    /// Built by `prepare`
    sourcing: Option<SourcingPoolManager>,
    loading: Option<LoadingPoolManager>,

    insert_mode: InsertMode,
    ticks: u64,
    started: Option<(DateTime<Utc>, Instant)>,
    aborted: bool,
}

impl<C, S, L> Orchestrator<C, S, L>
where
    C: Cache,
    S: Strategy,
    L: WorkerLauncher,
{
    /// Create new orchestrator with injected dependencies
    pub fn new(config: OrchestratorConfig, cache: C, strategy: S, launcher: L, sourcing_jobs: Vec<SourcingJob>) -> Self {
        Self {
            config,
            cache,
            strategy,
            launcher,
            sourcing_jobs,
            sourcing_names: None,
            blocks: BlockRegistry::new(),
            sourcing: None,
            loading: None,
            insert_mode: InsertMode::default(),
            ticks: 0,
            started: None,
            aborted: false,
        }
    }

    /// Name the sourcing shards instead of deriving names from their parameters
    pub fn with_sourcing_names(mut self, names: Vec<String>) -> Self {
        self.sourcing_names = Some(names);
        self
    }

    /// Load everything with plain creates
    pub async fn create(&mut self, graph_params: GraphParams) -> OrchestratorResult<RunSummary> {
        self.run(InsertMode::Create, graph_params).await
    }

    /// Load everything with merges against existing data
    pub async fn merge(&mut self, graph_params: GraphParams) -> OrchestratorResult<RunSummary> {
        self.run(InsertMode::Merge, graph_params).await
    }

    /// Prepare, tick until both pools are done, then flush the worker logs
    pub async fn run(&mut self, insert_mode: InsertMode, graph_params: GraphParams) -> OrchestratorResult<RunSummary> {
        logging::log_startup(ProcessId::current(), &format!("bulk load ({insert_mode})"));
        self.prepare(insert_mode, graph_params).await?;

        loop {
            match self.tick().await {
                Ok(true) => break,
                Ok(false) => tokio::time::sleep(self.config.tick_interval).await,
                Err(e) => {
                    logging::log_error(ProcessId::current(), "Bulk load", &e);
                    if self.config.terminate_on_failure {
                        let terminated = self.terminate_workers().await;
                        logging::log_shutdown(
                            ProcessId::current(),
                            &format!("terminated {terminated} still-running workers after fatal error"),
                        );
                    }
                    return Err(e);
                }
            }
        }

        let logs_flushed = self.flush_worker_logs().await?;
        let summary = self.summary(logs_flushed);
        logging::log_success(
            ProcessId::current(),
            &format!(
                "Bulk load finished after {} ticks in {:.1}s: {} sourcing shards, {} node sets, {} relationship sets",
                summary.ticks,
                summary.elapsed.as_secs_f64(),
                summary.sourcing_finished,
                summary.node_loads_finished,
                summary.rel_loads_finished
            ),
        );
        Ok(summary)
    }

    /// Check the cache and build both pool managers; no worker is started here
    pub async fn prepare(&mut self, insert_mode: InsertMode, graph_params: GraphParams) -> OrchestratorResult<()> {
        self.config.validate()?;

        if !self.cache.test_connection().await {
            return Err(OrchestratorError::CacheUnavailable {
                message: "connection test failed before any worker was started".to_string(),
            });
        }

        let settings = LoadSettings {
            graph_params,
            insert_mode,
            create_index: self.config.create_indexes,
            create_unique_constraints: self.config.create_unique_constraints,
        };

        let sourcing = SourcingPoolManager::new(
            &self.launcher,
            self.sourcing_jobs.clone(),
            self.sourcing_names.clone(),
            self.config.promotions_per_tick,
        )?;

        self.sourcing = Some(sourcing);
        self.loading = Some(LoadingPoolManager::new(settings, self.config.clone()));
        self.blocks.clear();
        self.insert_mode = insert_mode;
        self.ticks = 0;
        self.aborted = false;
        self.started = Some((Utc::now(), Instant::now()));

        process_info!(
            ProcessId::current(),
            "Prepared {} sourcing shards, insert mode {}",
            self.sourcing_jobs.len(),
            insert_mode
        );
        Ok(())
    }

    /// One pass over both pools; returns true once everything is done
    ///
    /// After a fatal error every later call fails without touching any worker.
    pub async fn tick(&mut self) -> OrchestratorResult<bool> {
        if self.aborted {
            return Err(OrchestratorError::process("run was aborted by an earlier fatal error"));
        }
        let result = self.advance().await;
        if result.is_err() {
            self.aborted = true;
        }
        result
    }

    async fn advance(&mut self) -> OrchestratorResult<bool> {
        let (Some(sourcing), Some(loading)) = (self.sourcing.as_mut(), self.loading.as_mut()) else {
            return Err(OrchestratorError::config("orchestrator", "tick called before prepare"));
        };
        self.ticks += 1;

        let snapshot = snapshot(sourcing, loading, &self.cache).await?;
        let sourcing_cores = self.strategy.sourcing_cores(&snapshot);
        let loading_cores = self.strategy.loading_cores(&snapshot);

        sourcing.manage(sourcing_cores, &mut self.blocks).await?;
        loading
            .manage(&self.cache, &self.launcher, &mut self.blocks, loading_cores)
            .await?;

        if !self.blocks.is_empty() {
            process_debug!(
                ProcessId::current(),
                "Blocked node sets: {:?}",
                self.blocks
                    .blocked_node_sets()
                    .iter()
                    .map(|m| m.id.as_str().to_string())
                    .collect::<Vec<_>>()
            );
        }

        relay_worker_logs(&self.cache, self.config.log_relay_batch).await?;
        loading.is_done(sourcing.is_done(), &self.cache).await
    }

    /// Relay worker logs until the cache reports none pending or the flush timeout passes
    pub async fn flush_worker_logs(&self) -> OrchestratorResult<bool> {
        let deadline = Instant::now() + self.config.log_flush_timeout;
        loop {
            relay_worker_logs(&self.cache, self.config.log_relay_batch).await?;
            let pending = self.cache.pending_log_count().await?;
            if pending == 0 {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                process_warn!(
                    ProcessId::current(),
                    "⚠️ Gave up waiting for worker logs after {:?}; {} records not relayed",
                    self.config.log_flush_timeout,
                    pending
                );
                return Ok(false);
            }
            tokio::time::sleep(self.config.log_flush_poll_interval).await;
        }
    }

    /// Terminate every worker still running in either pool
    pub async fn terminate_workers(&mut self) -> usize {
        let grace = self.config.termination_grace;
        let mut terminated = 0;
        if let Some(sourcing) = self.sourcing.as_mut() {
            terminated += sourcing.pool_mut().terminate_running(grace).await;
        }
        if let Some(loading) = self.loading.as_mut() {
            terminated += loading.pool_mut().terminate_running(grace).await;
        }
        terminated
    }

    /// Node sets currently closed to new loaders
    pub fn blocked_node_sets(&self) -> Vec<SetMeta> {
        self.blocks.blocked_node_sets()
    }

    pub fn summary(&self, logs_flushed: bool) -> RunSummary {
        let (started_at, elapsed) = match self.started {
            Some((at, instant)) => (at, instant.elapsed()),
            None => (Utc::now(), Duration::ZERO),
        };
        RunSummary {
            insert_mode: self.insert_mode,
            ticks: self.ticks,
            sourcing_finished: self.sourcing.as_ref().map_or(0, |s| s.pool().finished_count(None)),
            node_loads_finished: self
                .loading
                .as_ref()
                .map_or(0, |l| l.pool().finished_count(Some(WorkerTag::NodeLoad))),
            rel_loads_finished: self
                .loading
                .as_ref()
                .map_or(0, |l| l.pool().finished_count(Some(WorkerTag::RelLoad))),
            started_at,
            elapsed,
            logs_flushed,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn insert_mode(&self) -> InsertMode {
        self.insert_mode
    }

    pub fn sourcing(&self) -> Option<&SourcingPoolManager> {
        self.sourcing.as_ref()
    }

    pub fn loading(&self) -> Option<&LoadingPoolManager> {
        self.loading.as_ref()
    }
}

/// Per-tick state handed to the strategy
async fn snapshot(
    sourcing: &mut SourcingPoolManager,
    loading: &mut LoadingPoolManager,
    cache: &dyn Cache,
) -> OrchestratorResult<PoolSnapshot> {
    let pending = cache.list_sets_meta(None).await?;
    Ok(PoolSnapshot {
        sourcing_running: sourcing.pool_mut().count(&[WorkerStatus::Running], None)?,
        sourcing_waiting: sourcing.pool_mut().count(&[WorkerStatus::Initial], None)?,
        loading_running: loading.pool_mut().count(&[WorkerStatus::Running], None)?,
        loading_queued: loading.pool_mut().count(&[WorkerStatus::Initial], None)?,
        pending_sets: pending.len(),
        pending_bytes: pending.iter().map(|m| m.total_size_bytes).sum(),
    })
}

/// Re-emit up to `max` worker log records through tracing
async fn relay_worker_logs(cache: &dyn Cache, max: usize) -> OrchestratorResult<usize> {
    let records = cache.fetch_log_records(max).await?;
    for record in &records {
        logging::relay_worker_record(record);
    }
    Ok(records.len())
}
