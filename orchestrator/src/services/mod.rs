//! Service implementations
//!
//! Real implementations of the collaborator traits: worker processes spawned
//! from a command, an in-process batch cache, and core-allocation strategies.

pub mod memory_cache;
pub mod process_launcher;
pub mod process_output_handler;
pub mod strategy;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use memory_cache::InMemoryCache;
pub use process_launcher::{ChildWorker, CommandLauncher};
pub use process_output_handler::OutputMode;
pub use strategy::{CacheBudgetStrategy, FixedStrategy};
