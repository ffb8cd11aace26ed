//! Real worker processes
//!
//! Every worker is an external program spawned with `tokio::process`. The job
//! travels as JSON in the `BULKLOAD_JOB` environment variable, so any program
//! that can read its environment can be a worker.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::{Child, Command};

use shared::messages::jobs::{ENV_JOB, ENV_LOG_LEVEL, ENV_WORKER_NAME};
use shared::{process_debug, process_error, ProcessId, WorkerJob};

use super::process_output_handler::{configure_child_stdio, spawn_output_relays, OutputMode};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{WorkerLauncher, WorkerProcess};

/// Launches every worker as `program args...`
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    output: OutputMode,

    /// Log level to pass to spawned processes
    log_level: String,
}

impl CommandLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            output: OutputMode::default(),
            log_level: "info".to_string(),
        }
    }

    /// Configure extra arguments (fluent API)
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Configure an extra environment variable (fluent API)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Configure how worker stdout/stderr is handled (fluent API)
    pub fn with_output_mode(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Configure log level (fluent API)
    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }
}

impl WorkerLauncher for CommandLauncher {
    fn create(&self, name: &str, job: &WorkerJob) -> OrchestratorResult<Box<dyn WorkerProcess>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(ENV_JOB, job.to_json()?)
            .env(ENV_WORKER_NAME, name)
            .env(ENV_LOG_LEVEL, &self.log_level)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true);
        configure_child_stdio(&mut cmd, self.output);

        Ok(Box::new(ChildWorker::new(name, cmd)))
    }
}

/// One worker OS process, spawned on `start`
#[derive(Debug)]
pub struct ChildWorker {
    name: String,
    command: Option<Command>,
    child: Option<Child>,
    exit_code: Option<i32>,
}

impl ChildWorker {
    pub fn new(name: impl Into<String>, command: Command) -> Self {
        Self {
            name: name.into(),
            command: Some(command),
            child: None,
            exit_code: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl WorkerProcess for ChildWorker {
    fn start(&mut self) -> OrchestratorResult<()> {
        let mut cmd = self
            .command
            .take()
            .ok_or_else(|| OrchestratorError::process(format!("worker '{}' was already started", self.name)))?;
        let mut child = cmd
            .spawn()
            .map_err(|e| OrchestratorError::process(format!("Failed to spawn worker '{}': {e}", self.name)))?;
        process_debug!(
            ProcessId::current(),
            "🏭 Spawned worker '{}' (PID: {})",
            self.name,
            child.id().unwrap_or(0)
        );
        spawn_output_relays(&mut child, &self.name);
        self.child = Some(child);
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        if self.exit_code.is_some() {
            return false;
        }
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit_code = Some(exit_code_of(status));
                false
            }
            Err(e) => {
                process_error!(ProcessId::current(), "⚠️ Could not poll worker '{}': {}", self.name, e);
                false
            }
        }
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    async fn join(&mut self) -> OrchestratorResult<()> {
        if let Some(child) = self.child.as_mut() {
            let status = child.wait().await?;
            self.exit_code = Some(exit_code_of(status));
        }
        Ok(())
    }

    async fn terminate(&mut self, grace: Duration) -> OrchestratorResult<()> {
        if self.exit_code.is_some() {
            return Ok(());
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
                .map_err(|e| OrchestratorError::process(format!("Failed to signal worker '{}': {e}", self.name)))?;
        }

        let status = match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                process_debug!(
                    ProcessId::current(),
                    "Worker '{}' outlived its {:?} grace period; killing",
                    self.name,
                    grace
                );
                child.kill().await?;
                child.wait().await?
            }
        };
        self.exit_code = Some(exit_code_of(status));
        Ok(())
    }
}

/// Exit code, or `-N` for a process killed by signal N
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
