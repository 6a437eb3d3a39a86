use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use tiered_execution_scheduler::config::{DiskPoolConfig, JobProfileConfig, RamPoolConfig, RamPoolFullBehavior, SchedulerConfig, TierSelectionStrategy};
use tiered_execution_scheduler::domain::profile::Tier;
use tiered_execution_scheduler::domain::submission::ExecuteRequest;
use tiered_execution_scheduler::external::catalog::Catalog;
use tiered_execution_scheduler::external::event_stream::EventPublisher;
use tiered_execution_scheduler::external::record_store::JobRecordStore;
use tiered_execution_scheduler::external::runner::Runner;
use tiered_execution_scheduler::ids::Id;
use tiered_execution_scheduler::logger;
use tiered_execution_scheduler::mocks::{CountingEventPublisher, InMemoryRecordStore, InstantRunner, PermissiveCatalog};
use tiered_execution_scheduler::scheduler::Scheduler;

/// Demo binary: wires an in-memory `Scheduler` from a JSON config file (or
/// a small built-in default) and mock collaborators, submits one sample
/// job, and prints its terminal status. Not part of the library's public
/// contract — a real deployment supplies its own catalog/record-store/
/// runner/event-stream implementations.
#[derive(Parser)]
#[command(about = "Tiered execution scheduler demo")]
struct Cli {
    /// Path to a JSON scheduler configuration file.
    #[arg(long)]
    config: Option<String>,
}

fn default_config() -> SchedulerConfig {
    let mut job_profiles = HashMap::new();
    job_profiles.insert("standard".to_string(), JobProfileConfig { preferred_tier: Tier::Ram, ram_capacity_cost_gb: 0.5 });

    SchedulerConfig {
        enable_tiered_execution: true,
        ram_pool: RamPoolConfig { total_capacity_gb: 2.0, max_concurrent_jobs: 4 },
        disk_pool: DiskPoolConfig { max_concurrent_jobs: 2 },
        tier_selection_strategy: TierSelectionStrategy {
            fallback_to_disk: true,
            ram_pool_full_behavior: RamPoolFullBehavior::Queue,
            max_queue_depth: 16,
            queue_timeout_minutes: 10,
        },
        job_profiles,
        default_job_profile: "standard".to_string(),
        default_max_cpu_percentage: 100.0,
        default_max_memory_mb: 512,
        default_max_disk_mb: 1024,
        default_max_execution_time_minutes: 30,
        default_max_concurrent_executions: 4,
        max_concurrent_executions: 64,
        max_concurrent_executions_per_user: 8,
        max_concurrent_executions_per_program: 16,
        max_allowed_memory_mb: 8192,
        max_allowed_execution_time_minutes: 120,
        stale_reservation_max_age: Duration::from_secs(600),
        sweeper_interval: Duration::from_secs(30),
    }
}

fn load_config(path: &str) -> SchedulerConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                log::error!("failed to parse scheduler config at '{path}': {err}; using the built-in default configuration");
                default_config()
            }
        },
        Err(err) => {
            log::error!("failed to read scheduler config at '{path}': {err}; using the built-in default configuration");
            default_config()
        }
    }
}

#[tokio::main]
async fn main() {
    logger::init();

    let cli = Cli::parse();
    let config = cli.config.as_deref().map(load_config).unwrap_or_else(default_config);

    let catalog: Arc<dyn Catalog> = Arc::new(PermissiveCatalog);
    let record_store: Arc<dyn JobRecordStore> = Arc::new(InMemoryRecordStore::new());
    let runner: Arc<dyn Runner> = Arc::new(InstantRunner::new());
    let events: Arc<dyn EventPublisher> = Arc::new(CountingEventPublisher::default());

    let scheduler = Scheduler::new(config, catalog, record_store, runner, Some(events));

    let program_id = Id::generate();
    let version_id = Id::generate();
    let user_id = Id::generate();

    let request = ExecuteRequest {
        parameters: serde_json::json!({ "entrypoint": "main.py" }),
        environment: serde_json::json!({}),
        resource_limits: Default::default(),
        save_results: true,
        job_profile: None,
    };

    log::info!("submitting sample job for program {program_id:?} version {version_id:?}");

    match scheduler.execute_version(program_id, version_id, user_id, request, CancellationToken::new()).await {
        Ok(job_id) => {
            tokio::time::sleep(Duration::from_millis(100)).await;
            match scheduler.get_status(job_id).await {
                Ok(status) => log::info!("job {job_id:?} finished with status {status:?}"),
                Err(err) => log::error!("failed to read back job status: {err}"),
            }
        }
        Err(err) => log::error!("submission rejected: {err}"),
    }

    scheduler.shutdown().await;
}
