//! Service-specific tests
//!
//! Each service has its own test file with dedicated fixtures and helpers.


// Common test utilities for services
pub mod common {
    use std::time::Duration;
    use tokio::time::timeout;

    use shared::{SourcingJob, WorkerJob};

    use crate::traits::WorkerProcess;

    /// Upper bound for a short-lived child process to exit
    pub const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Poll `is_alive` until the process has exited
    pub async fn wait_for_exit(worker: &mut dyn WorkerProcess) -> Option<i32> {
        timeout(EXIT_TIMEOUT, async {
            while worker.is_alive() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("worker did not exit in time");
        worker.exit_code()
    }

    pub fn shard(n: u32) -> WorkerJob {
        WorkerJob::Sourcing(SourcingJob(serde_json::json!({ "shard": n })))
    }
}
