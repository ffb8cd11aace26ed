//! Test helpers and builder patterns for orchestrator tests
//!
//! `ScriptedLauncher` hands out in-process stand-ins for worker processes. A
//! scripted worker exits when the test says so (or after a number of polls),
//! and on a clean exit it has the side effect the real program would have on
//! the cache: a sourcing shard publishes its batches, a loader consumes its batch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orchestrator::{
    FixedStrategy, InMemoryCache, Orchestrator, OrchestratorConfig, OrchestratorResult, Progress, WorkerLauncher,
    WorkerProcess,
};
use shared::{InsertMode, SetId, SetMeta, WorkerJob, WorkerTag};

use super::fixtures::TestFixtures;

/// How a scripted worker behaves once started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Runs until the test calls `finish`
    Manual,
    /// Exits with `code` once it has been polled more than `polls` times
    ExitAfter { polls: usize, code: i32 },
    /// Claims to be alive before it was ever started
    Broken,
}

#[derive(Debug, Default)]
struct ProcState {
    started: bool,
    polls: usize,
    exit: Option<i32>,
}

struct WorkerCell {
    name: String,
    job: WorkerJob,
    script: Script,
    outputs: Vec<SetMeta>,
    cache: InMemoryCache,
    events: Arc<Mutex<Vec<String>>>,
    state: Mutex<ProcState>,
}

impl WorkerCell {
    fn exit(&self, state: &mut ProcState, code: i32) {
        state.exit = Some(code);
        self.events.lock().unwrap().push(format!("exit:{}:{code}", self.name));
        if code != 0 {
            return;
        }
        match &self.job {
            WorkerJob::Sourcing(_) => {
                for set in &self.outputs {
                    self.cache.add_set(set.clone());
                }
            }
            WorkerJob::NodeLoad(job) | WorkerJob::RelLoad(job) => {
                self.cache.remove_set(&job.set_meta);
            }
        }
    }
}

pub struct ScriptedWorker {
    cell: Arc<WorkerCell>,
}

#[async_trait]
impl WorkerProcess for ScriptedWorker {
    fn start(&mut self) -> OrchestratorResult<()> {
        let mut state = self.cell.state.lock().unwrap();
        assert!(!state.started, "{} started twice", self.cell.name);
        state.started = true;
        self.cell.events.lock().unwrap().push(format!("start:{}", self.cell.name));
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        let mut state = self.cell.state.lock().unwrap();
        if self.cell.script == Script::Broken {
            return true;
        }
        if !state.started || state.exit.is_some() {
            return false;
        }
        if let Script::ExitAfter { polls, code } = self.cell.script {
            state.polls += 1;
            if state.polls > polls {
                self.cell.exit(&mut state, code);
                return false;
            }
        }
        true
    }

    fn exit_code(&self) -> Option<i32> {
        self.cell.state.lock().unwrap().exit
    }

    fn pid(&self) -> Option<u32> {
        None
    }

    async fn join(&mut self) -> OrchestratorResult<()> {
        self.cell.events.lock().unwrap().push(format!("join:{}", self.cell.name));
        Ok(())
    }

    async fn terminate(&mut self, _grace: Duration) -> OrchestratorResult<()> {
        let mut state = self.cell.state.lock().unwrap();
        self.cell.events.lock().unwrap().push(format!("terminate:{}", self.cell.name));
        if state.exit.is_none() {
            state.exit = Some(-15);
        }
        Ok(())
    }
}

/// Launcher producing scripted workers that share one event log
#[derive(Clone)]
pub struct ScriptedLauncher {
    cache: InMemoryCache,
    default_script: Script,
    scripts: HashMap<String, Script>,
    outputs: HashMap<String, Vec<SetMeta>>,
    cells: Arc<Mutex<Vec<Arc<WorkerCell>>>>,
    events: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLauncher {
    pub fn new(cache: InMemoryCache) -> Self {
        Self {
            cache,
            default_script: Script::Manual,
            scripts: HashMap::new(),
            outputs: HashMap::new(),
            cells: Arc::new(Mutex::new(Vec::new())),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_default_script(mut self, script: Script) -> Self {
        self.default_script = script;
        self
    }

    pub fn with_script(mut self, name: &str, script: Script) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }

    /// Batches the named sourcing shard publishes when it exits cleanly
    pub fn with_output(mut self, name: &str, sets: Vec<SetMeta>) -> Self {
        self.outputs.insert(name.to_string(), sets);
        self
    }

    fn cell(&self, name: &str) -> Arc<WorkerCell> {
        self.cells
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("no worker named {name}"))
    }

    /// Let a started manual worker exit with `code`
    pub fn finish(&self, name: &str, code: i32) {
        let cell = self.cell(name);
        let mut state = cell.state.lock().unwrap();
        assert!(state.started, "{name} was never started");
        assert!(state.exit.is_none(), "{name} already exited");
        cell.exit(&mut state, code);
    }

    /// Names of every worker created so far, in creation order
    pub fn created(&self) -> Vec<String> {
        self.cells.lock().unwrap().iter().map(|c| c.name.clone()).collect()
    }

    /// Names of started workers, in start order
    pub fn started(&self) -> Vec<String> {
        self.events_with("start:")
    }

    pub fn terminated(&self) -> Vec<String> {
        self.events_with("terminate:")
    }

    pub fn is_running(&self, name: &str) -> bool {
        let cell = self.cell(name);
        let state = cell.state.lock().unwrap();
        state.started && state.exit.is_none()
    }

    pub fn job(&self, name: &str) -> WorkerJob {
        self.cell(name).job.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Position of `event` in the event log
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    fn events_with(&self, prefix: &str) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

impl WorkerLauncher for ScriptedLauncher {
    fn create(&self, name: &str, job: &WorkerJob) -> OrchestratorResult<Box<dyn WorkerProcess>> {
        let cell = Arc::new(WorkerCell {
            name: name.to_string(),
            job: job.clone(),
            script: self.scripts.get(name).copied().unwrap_or(self.default_script),
            outputs: self.outputs.get(name).cloned().unwrap_or_default(),
            cache: self.cache.clone(),
            events: Arc::clone(&self.events),
            state: Mutex::new(ProcState::default()),
        });
        self.cells.lock().unwrap().push(Arc::clone(&cell));
        Ok(Box::new(ScriptedWorker { cell }))
    }
}

/// Type alias for the orchestrator driven by the harness
pub type TestOrchestrator = Orchestrator<InMemoryCache, FixedStrategy, ScriptedLauncher>;

/// Builder for a prepared orchestrator with sensible test defaults
pub struct HarnessBuilder {
    shards: usize,
    strategy: FixedStrategy,
    config: OrchestratorConfig,
    cache: InMemoryCache,
    launcher: Option<ScriptedLauncher>,
    insert_mode: InsertMode,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            shards: 0,
            strategy: FixedStrategy::new(1, 2),
            config: TestFixtures::config(),
            cache: InMemoryCache::new(),
            launcher: None,
            insert_mode: InsertMode::Create,
        }
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn with_strategy(mut self, sourcing: usize, loading: usize) -> Self {
        self.strategy = FixedStrategy::new(sourcing, loading);
        self
    }

    pub fn with_config<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut OrchestratorConfig),
    {
        setup(&mut self.config);
        self
    }

    pub fn with_cache(mut self, cache: InMemoryCache) -> Self {
        self.cache = cache;
        self
    }

    /// Configure the launcher, which always shares the harness cache
    pub fn with_launcher<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(ScriptedLauncher) -> ScriptedLauncher,
    {
        self.launcher = Some(setup(ScriptedLauncher::new(self.cache.clone())));
        self
    }

    pub fn with_insert_mode(mut self, insert_mode: InsertMode) -> Self {
        self.insert_mode = insert_mode;
        self
    }

    /// Build without preparing, for tests that drive `create`/`merge`
    pub fn build_orchestrator(self) -> (TestOrchestrator, InMemoryCache, ScriptedLauncher) {
        let launcher = self
            .launcher
            .unwrap_or_else(|| ScriptedLauncher::new(self.cache.clone()));
        let orchestrator = Orchestrator::new(
            self.config,
            self.cache.clone(),
            self.strategy,
            launcher.clone(),
            TestFixtures::shards(self.shards),
        )
        .with_sourcing_names(TestFixtures::shard_names(self.shards));
        (orchestrator, self.cache, launcher)
    }

    /// Build and prepare, ready to be ticked
    pub async fn build(self) -> Harness {
        let insert_mode = self.insert_mode;
        let (mut orchestrator, cache, launcher) = self.build_orchestrator();
        orchestrator
            .prepare(insert_mode, TestFixtures::graph_params())
            .await
            .unwrap();
        Harness {
            orchestrator,
            cache,
            launcher,
        }
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A prepared orchestrator plus handles onto its cache and launcher
pub struct Harness {
    pub orchestrator: TestOrchestrator,
    pub cache: InMemoryCache,
    pub launcher: ScriptedLauncher,
}

impl Harness {
    /// One tick that must succeed; returns whether the run is done
    pub async fn tick(&mut self) -> bool {
        self.orchestrator.tick().await.unwrap()
    }

    pub async fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick().await;
        }
    }

    pub fn blocked(&self) -> Vec<SetId> {
        self.orchestrator.blocked_node_sets().into_iter().map(|m| m.id).collect()
    }

    /// Progress of the most recent loading handle with `name`
    pub fn progress(&self, name: &str) -> Option<Progress> {
        self.orchestrator
            .loading()?
            .pool()
            .handles()
            .filter(|h| h.name == name)
            .last()
            .map(|h| h.progress().clone())
    }

    /// Loading handles named `name`, in creation order
    pub fn loaders_named(&self, name: &str) -> usize {
        self.orchestrator
            .loading()
            .map_or(0, |l| l.pool().handles().filter(|h| h.name == name).count())
    }

    /// Set ids of every loading handle still holding its batch, per tag
    pub fn active_sets(&self, tag: WorkerTag) -> Vec<SetId> {
        self.orchestrator.loading().map_or_else(Vec::new, |l| {
            l.pool()
                .handles()
                .filter(|h| h.tag == tag && h.progress().is_active())
                .filter_map(|h| h.set_meta().map(|m| m.id.clone()))
                .collect()
        })
    }
}
