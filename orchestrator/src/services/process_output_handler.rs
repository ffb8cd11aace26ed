//! Helper to handle worker stdout/stderr output
//!
//! Workers either write straight to the orchestrator's terminal, or their
//! output is piped and re-emitted line by line through tracing, tagged with
//! the worker's name.

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use shared::{process_info, process_warn, ProcessId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Inherit,
    /// Pipe stdout/stderr and relay every line through tracing
    Relay,
}

/// Configure stdio for a worker process
pub fn configure_child_stdio(cmd: &mut Command, mode: OutputMode) {
    cmd.stdin(Stdio::null());
    match mode {
        OutputMode::Inherit => cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit()),
        OutputMode::Relay => cmd.stdout(Stdio::piped()).stderr(Stdio::piped()),
    };
}

/// Spawn tasks draining whatever output was piped
///
/// The pipes must be drained either way or the child blocks once they fill up.
pub fn spawn_output_relays(child: &mut Child, worker_name: &str) {
    if let Some(stdout) = child.stdout.take() {
        let process = ProcessId::Worker(worker_name.to_string());
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                process_info!(process, "{}", line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let process = ProcessId::Worker(worker_name.to_string());
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                process_warn!(process, "{}", line);
            }
        });
    }
}
