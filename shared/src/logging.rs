//! Shared logging utilities for consistent tracing across all processes

use crate::messages::{LogLevel, WorkerLogRecord};
use crate::types::ProcessId;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, trace, warn};

/// Build the env filter directive for the current process
fn level_filter(log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");

    match ProcessId::current() {
        ProcessId::Orchestrator => format!("orchestrator={base_level},shared={base_level},worker_log={base_level}"),
        ProcessId::Worker(_) => base_level.to_string(),
    }
}

/// Initialize tracing subscriber with an optional log level
///
/// Uses the global process ID, so call `ProcessId::init_*` first. Safe to call
/// more than once; later calls are ignored.
pub fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::new(level_filter(log_level)))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for process-aware info logging
#[macro_export]
macro_rules! process_info {
    ($process_id:expr, $($arg:tt)*) => {
        tracing::info!(
            process = %$process_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for process-aware warning logging
#[macro_export]
macro_rules! process_warn {
    ($process_id:expr, $($arg:tt)*) => {
        tracing::warn!(
            process = %$process_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for process-aware error logging
#[macro_export]
macro_rules! process_error {
    ($process_id:expr, $($arg:tt)*) => {
        tracing::error!(
            process = %$process_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for process-aware debug logging
#[macro_export]
macro_rules! process_debug {
    ($process_id:expr, $($arg:tt)*) => {
        tracing::debug!(
            process = %$process_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Re-emit a log record that a worker pushed into the cache
///
/// Records are emitted under the `worker_log` target so they can be filtered
/// independently of the orchestrator's own output.
pub fn relay_worker_record(record: &WorkerLogRecord) {
    let ts = record.timestamp.format("%H:%M:%S%.3f").to_string();
    match record.level {
        LogLevel::Trace => trace!(target: "worker_log", process = %record.worker, timestamp = ts, "{}", record.message),
        LogLevel::Debug => debug!(target: "worker_log", process = %record.worker, timestamp = ts, "{}", record.message),
        LogLevel::Info => info!(target: "worker_log", process = %record.worker, timestamp = ts, "{}", record.message),
        LogLevel::Warn => warn!(target: "worker_log", process = %record.worker, timestamp = ts, "{}", record.message),
        LogLevel::Error => error!(target: "worker_log", process = %record.worker, timestamp = ts, "{}", record.message),
    }
}

/// Contextual logging helper for startup messages
pub fn log_startup(process_id: &ProcessId, details: &str) {
    info!(
        process = %process_id,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(process_id: &ProcessId, reason: &str) {
    info!(
        process = %process_id,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(process_id: &ProcessId, context: &str, error: &dyn std::fmt::Display) {
    error!(
        process = %process_id,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(process_id: &ProcessId, message: &str) {
    info!(
        process = %process_id,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}
