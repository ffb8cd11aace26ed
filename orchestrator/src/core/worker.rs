//! Worker handles and their lifecycle states

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use shared::{process_debug, DrainTicket, ProcessId, SetMeta, WorkerId, WorkerJob, WorkerTag};

use crate::traits::WorkerProcess;

/// Process-level state of a handle as seen by a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerStatus {
    /// Created, never started
    Initial,
    Running,
    /// Exited with code 0, not yet reaped
    Exited,
    /// Exited non-zero, not yet reaped
    Failed,
    /// Already reaped into the finished or failed collection
    Finished,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerStatus::Initial => "initial",
            WorkerStatus::Running => "running",
            WorkerStatus::Exited => "exited",
            WorkerStatus::Failed => "failed",
            WorkerStatus::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Scheduling progress of a handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Queued,
    /// Relationship loaders only: waiting for the cache drain and older node loaders
    DrainOrdered { ticket: DrainTicket },
    /// Relationship loaders only: cleared to start once a core is free
    DrainReady,
    Started,
    Settled,
}

impl Progress {
    /// Queued, draining or running: the handle still owns its batch
    pub fn is_active(&self) -> bool {
        !matches!(self, Progress::Settled)
    }
}

/// Wall-clock timer attached to a worker
///
/// Entered when the process starts and exited when the pool reaps it.
struct WorkerTimer {
    span: tracing::Span,
    started_at: Option<Instant>,
}

impl WorkerTimer {
    fn new(name: &str) -> Self {
        Self {
            span: tracing::info_span!("worker", name = %name),
            started_at: None,
        }
    }

    fn enter(&mut self) {
        self.started_at = Some(Instant::now());
        self.span.in_scope(|| process_debug!(ProcessId::current(), "⏱️  timer started"));
    }

    fn exit(&mut self) -> Option<Duration> {
        let elapsed = self.started_at.take().map(|t| t.elapsed());
        if let Some(elapsed) = elapsed {
            self.span
                .in_scope(|| process_debug!(ProcessId::current(), "⏱️  timer stopped after {:.3}s", elapsed.as_secs_f64()));
        }
        elapsed
    }
}

/// One worker OS process plus everything the pools know about it
pub struct WorkerHandle {
    pub id: WorkerId,
    pub name: String,
    pub tag: WorkerTag,
    pub job: WorkerJob,
    pub(crate) progress: Progress,
    /// Node sets a relationship loader waits on, known once its drain is done
    pub(crate) target_node_sets: Vec<SetMeta>,
    pub(crate) process: Box<dyn WorkerProcess>,
    timer: WorkerTimer,
}

impl WorkerHandle {
    pub(crate) fn new(name: String, tag: WorkerTag, job: WorkerJob, process: Box<dyn WorkerProcess>) -> Self {
        let timer = WorkerTimer::new(&name);
        Self {
            id: WorkerId::new(),
            name,
            tag,
            job,
            progress: Progress::Queued,
            target_node_sets: Vec::new(),
            process,
            timer,
        }
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn set_meta(&self) -> Option<&SetMeta> {
        self.job.set_meta()
    }

    pub fn target_node_sets(&self) -> &[SetMeta] {
        &self.target_node_sets
    }

    pub fn was_started(&self) -> bool {
        matches!(self.progress, Progress::Started | Progress::Settled)
    }

    pub(crate) fn start_timer(&mut self) {
        self.timer.enter();
    }

    pub(crate) fn stop_timer(&mut self) -> Option<Duration> {
        self.timer.exit()
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("progress", &self.progress)
            .field("pid", &self.process.pid())
            .finish()
    }
}

/// Build a worker name from pool, tag and either the supplied name or a hash of the job
pub fn worker_name(pool_name: &str, tag: WorkerTag, name: Option<&str>, job: &WorkerJob) -> String {
    match name {
        Some(name) => format!("{pool_name}-{tag}-{name}"),
        None => format!("{pool_name}-{tag}-{}", job_hash(job)),
    }
}

fn job_hash(job: &WorkerJob) -> String {
    let mut hasher = DefaultHasher::new();
    // Fall back to Debug if serialization fails
    match serde_json::to_string(job) {
        Ok(json) => json.hash(&mut hasher),
        Err(_) => format!("{job:?}").hash(&mut hasher),
    }
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::SourcingJob;

    #[test]
    fn test_worker_name_uses_supplied_name() {
        let job = WorkerJob::Sourcing(SourcingJob(serde_json::json!({"shard": 1})));
        assert_eq!(
            worker_name("SourcingPool", WorkerTag::Sourcing, Some("shard-1"), &job),
            "SourcingPool-SOURCING-shard-1"
        );
    }

    #[test]
    fn test_worker_name_hashes_parameters_deterministically() {
        let a = WorkerJob::Sourcing(SourcingJob(serde_json::json!({"shard": 1})));
        let b = WorkerJob::Sourcing(SourcingJob(serde_json::json!({"shard": 2})));

        let name_a = worker_name("SourcingPool", WorkerTag::Sourcing, None, &a);
        assert_eq!(name_a, worker_name("SourcingPool", WorkerTag::Sourcing, None, &a));
        assert_ne!(name_a, worker_name("SourcingPool", WorkerTag::Sourcing, None, &b));
        assert!(name_a.starts_with("SourcingPool-SOURCING-"));
    }

    #[test]
    fn test_settled_progress_is_inactive() {
        assert!(Progress::Queued.is_active());
        assert!(Progress::DrainReady.is_active());
        assert!(!Progress::Settled.is_active());
    }
}
