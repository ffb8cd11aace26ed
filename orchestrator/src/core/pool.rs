//! Generic lifecycle bookkeeping shared by the sourcing and loading pools
//!
//! Handles are never removed or reused: once reaped they stay in `workers`
//! and their id moves into `finished` or `failed`.

use std::collections::HashSet;
use std::time::Duration;

use shared::{process_debug, process_error, process_info, process_warn, ProcessId, WorkerId, WorkerJob, WorkerTag};

use super::block_registry::BlockRegistry;
use super::worker::{worker_name, Progress, WorkerHandle, WorkerStatus};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::WorkerLauncher;

pub struct WorkerPool {
    pool_name: &'static str,
    workers: Vec<WorkerHandle>,
    finished: HashSet<WorkerId>,
    failed: HashSet<WorkerId>,
}

impl WorkerPool {
    pub fn new(pool_name: &'static str) -> Self {
        Self {
            pool_name,
            workers: Vec::new(),
            finished: HashSet::new(),
            failed: HashSet::new(),
        }
    }

    pub fn pool_name(&self) -> &'static str {
        self.pool_name
    }

    /// Create one queued handle per job
    ///
    /// `names` must line up with `jobs` when given; otherwise names are derived
    /// from a hash of each job.
    pub fn init_workers(
        &mut self,
        launcher: &dyn WorkerLauncher,
        jobs: Vec<WorkerJob>,
        names: Option<Vec<String>>,
        tag: WorkerTag,
    ) -> OrchestratorResult<Vec<WorkerId>> {
        if let Some(names) = &names {
            if names.len() != jobs.len() {
                return Err(OrchestratorError::config(
                    "worker names",
                    format!("{} names supplied for {} jobs", names.len(), jobs.len()),
                ));
            }
        }

        let mut created = Vec::with_capacity(jobs.len());
        for (i, job) in jobs.into_iter().enumerate() {
            let supplied = names.as_ref().map(|n| n[i].as_str());
            let name = worker_name(self.pool_name, tag, supplied, &job);
            let process = launcher.create(&name, &job)?;
            let handle = WorkerHandle::new(name, tag, job, process);
            process_info!(ProcessId::current(), "INIT WORKER {}", handle.name);
            created.push(handle.id);
            self.workers.push(handle);
        }
        Ok(created)
    }

    /// Map the process state of the handle at `idx` onto a pool status
    ///
    /// A reaped handle reports `Finished` forever after, so an exit or failure
    /// is only ever observed once. Anything outside the mapping aborts the run.
    fn status_at(&mut self, idx: usize) -> OrchestratorResult<WorkerStatus> {
        let handle = &mut self.workers[idx];
        let settled = self.finished.contains(&handle.id) || self.failed.contains(&handle.id);
        let started = handle.was_started();
        let alive = handle.process.is_alive();

        let status = match (alive, handle.process.exit_code(), settled, started) {
            (true, _, false, true) => Some(WorkerStatus::Running),
            (false, None, false, false) => Some(WorkerStatus::Initial),
            (false, Some(0), false, true) => Some(WorkerStatus::Exited),
            (false, Some(_), false, true) => Some(WorkerStatus::Failed),
            (false, Some(_), true, true) => Some(WorkerStatus::Finished),
            _ => None,
        };

        status.ok_or_else(|| OrchestratorError::StatusContractViolation {
            name: handle.name.clone(),
            details: format!(
                "alive={alive} exit_code={:?} settled={settled} started={started}",
                handle.process.exit_code()
            ),
        })
    }

    /// Current status of the handle with `id`
    pub fn status(&mut self, id: &WorkerId) -> OrchestratorResult<Option<WorkerStatus>> {
        match self.index_of(id) {
            Some(idx) => self.status_at(idx).map(Some),
            None => Ok(None),
        }
    }

    /// Indices of handles matching the optional status and tag filters, in creation order
    fn indices(&mut self, status: Option<&[WorkerStatus]>, tag: Option<WorkerTag>) -> OrchestratorResult<Vec<usize>> {
        let mut matching = Vec::new();
        for idx in 0..self.workers.len() {
            if tag.is_some_and(|t| self.workers[idx].tag != t) {
                continue;
            }
            if let Some(wanted) = status {
                let current = self.status_at(idx)?;
                if !wanted.contains(&current) {
                    continue;
                }
            }
            matching.push(idx);
        }
        Ok(matching)
    }

    /// Ids of handles matching the filters
    pub fn workers(&mut self, status: Option<&[WorkerStatus]>, tag: Option<WorkerTag>) -> OrchestratorResult<Vec<WorkerId>> {
        let indices = self.indices(status, tag)?;
        Ok(indices.into_iter().map(|idx| self.workers[idx].id).collect())
    }

    pub fn count(&mut self, status: &[WorkerStatus], tag: Option<WorkerTag>) -> OrchestratorResult<usize> {
        Ok(self.indices(Some(status), tag)?.len())
    }

    pub fn handles(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.workers.iter()
    }

    pub fn handle(&self, id: &WorkerId) -> Option<&WorkerHandle> {
        self.workers.iter().find(|h| h.id == *id)
    }

    pub(crate) fn handle_mut(&mut self, id: &WorkerId) -> Option<&mut WorkerHandle> {
        self.workers.iter_mut().find(|h| h.id == *id)
    }

    fn index_of(&self, id: &WorkerId) -> Option<usize> {
        self.workers.iter().position(|h| h.id == *id)
    }

    /// Start the process of a queued or drain-ready handle
    pub fn start(&mut self, id: &WorkerId) -> OrchestratorResult<()> {
        let handle = self
            .handle_mut(id)
            .ok_or_else(|| OrchestratorError::process(format!("unknown worker {id}")))?;
        handle.process.start()?;
        handle.start_timer();
        handle.progress = Progress::Started;
        process_debug!(
            ProcessId::current(),
            "▶️  Started {} (pid {:?})",
            handle.name,
            handle.process.pid()
        );
        Ok(())
    }

    /// Reap exited and failed handles of `tag`
    ///
    /// Exited handles are joined, their timer closed, any block they own is
    /// released and they move to `finished`. The first failed handle is treated
    /// the same way, moves to `failed`, and aborts with `WorkerFailed`.
    /// Returns the number of handles reaped.
    pub async fn reap(&mut self, tag: Option<WorkerTag>, blocks: &mut BlockRegistry) -> OrchestratorResult<usize> {
        let mut reaped = 0;

        for idx in self.indices(Some(&[WorkerStatus::Exited]), tag)? {
            let handle = &mut self.workers[idx];
            handle.process.join().await?;
            let elapsed = handle.stop_timer();
            blocks.release(&handle.id);
            handle.progress = Progress::Settled;
            self.finished.insert(handle.id);
            reaped += 1;
            process_debug!(
                ProcessId::current(),
                "Exit worker '{}' after {:.3}s",
                handle.name,
                elapsed.unwrap_or_default().as_secs_f64()
            );
        }

        if let Some(idx) = self.indices(Some(&[WorkerStatus::Failed]), tag)?.into_iter().next() {
            let handle = &mut self.workers[idx];
            handle.process.join().await?;
            handle.stop_timer();
            blocks.release(&handle.id);
            handle.progress = Progress::Settled;
            self.failed.insert(handle.id);

            let name = handle.name.clone();
            let worker_tag = handle.tag;
            let exit_code = handle.process.exit_code().unwrap_or(-1);
            let still_running = self.running_names()?;
            process_error!(
                ProcessId::current(),
                "❌ Exit failed worker '{}' (exit code {}); other workers currently running are {:?}",
                name,
                exit_code,
                still_running
            );
            return Err(OrchestratorError::WorkerFailed {
                name,
                tag: worker_tag,
                exit_code,
            });
        }

        Ok(reaped)
    }

    pub fn running_names(&mut self) -> OrchestratorResult<Vec<String>> {
        let indices = self.indices(Some(&[WorkerStatus::Running]), None)?;
        Ok(indices.into_iter().map(|idx| self.workers[idx].name.clone()).collect())
    }

    /// Every handle has been reaped into finished or failed
    pub fn all_settled(&self) -> bool {
        self.workers.len() == self.finished.len() + self.failed.len()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn finished_count(&self, tag: Option<WorkerTag>) -> usize {
        self.workers
            .iter()
            .filter(|h| tag.map_or(true, |t| h.tag == t) && self.finished.contains(&h.id))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Terminate every process that is still running; errors are logged, not returned
    pub async fn terminate_running(&mut self, grace: Duration) -> usize {
        let mut terminated = 0;
        for handle in self.workers.iter_mut() {
            if !handle.was_started() || handle.progress == Progress::Settled || !handle.process.is_alive() {
                continue;
            }
            match handle.process.terminate(grace).await {
                Ok(()) => {
                    terminated += 1;
                    process_warn!(ProcessId::current(), "🛑 Terminated worker '{}'", handle.name);
                }
                Err(e) => {
                    process_error!(ProcessId::current(), "⚠️ Could not terminate worker '{}': {}", handle.name, e);
                }
            }
        }
        terminated
    }
}
