//! Test fixtures and data for orchestrator tests

use std::time::Duration;

use orchestrator::OrchestratorConfig;
use shared::{GraphParams, SetMeta, SourcingJob};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Worker names as assigned by the pools
    pub const SHARD_1: &'static str = "SourcingPool-SOURCING-shard-1";
    pub const SHARD_2: &'static str = "SourcingPool-SOURCING-shard-2";
    pub const PERSON_LOADER: &'static str = "LoadingPool-NODESET-Person";
    pub const CITY_LOADER: &'static str = "LoadingPool-NODESET-City";
    pub const KNOWS_LOADER: &'static str = "LoadingPool-RELSET-KNOWS";
    pub const LIKES_LOADER: &'static str = "LoadingPool-RELSET-LIKES";
    pub const LIVES_IN_LOADER: &'static str = "LoadingPool-RELSET-LIVES_IN";

    /// Fast ticks and short waits; everything else at its default
    pub fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            tick_interval: Duration::from_millis(1),
            termination_grace: Duration::from_millis(50),
            log_flush_poll_interval: Duration::from_millis(5),
            log_flush_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    pub fn shards(count: usize) -> Vec<SourcingJob> {
        (1..=count)
            .map(|n| SourcingJob(serde_json::json!({ "shard": n })))
            .collect()
    }

    pub fn shard_names(count: usize) -> Vec<String> {
        (1..=count).map(|n| format!("shard-{n}")).collect()
    }

    pub fn graph_params() -> GraphParams {
        GraphParams::new()
            .with("uri", "bolt://localhost:7687")
            .with("database", "neo4j")
    }

    pub fn person() -> SetMeta {
        SetMeta::nodes(&["Person"], 1_024)
    }

    pub fn city() -> SetMeta {
        SetMeta::nodes(&["City"], 256)
    }

    pub fn knows() -> SetMeta {
        SetMeta::relationships(&["Person"], "KNOWS", &["Person"], 2_048)
    }

    pub fn likes() -> SetMeta {
        SetMeta::relationships(&["Person"], "LIKES", &["Person"], 512)
    }

    pub fn lives_in() -> SetMeta {
        SetMeta::relationships(&["Person"], "LIVES_IN", &["City"], 512)
    }
}
