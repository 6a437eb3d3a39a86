//! End-to-end scenario tests, one per §8 "Scenarios (literal)" of the
//! scheduler spec. Uses the in-memory mock collaborators from
//! `tiered_execution_scheduler::mocks` so every scenario exercises the
//! real `Scheduler`/`Dispatcher`/`ResourcePools`/`WaitQueue` code paths
//! without a real sandbox or database behind them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio_util::sync::CancellationToken;

use tiered_execution_scheduler::config::{DiskPoolConfig, JobProfileConfig, RamPoolConfig, RamPoolFullBehavior, SchedulerConfig, TierSelectionStrategy};
use tiered_execution_scheduler::dispatcher::Dispatcher;
use tiered_execution_scheduler::domain::job::{ExecutionKind, JobRecord, JobResult, JobStatus, ResourceUsage};
use tiered_execution_scheduler::domain::profile::Tier;
use tiered_execution_scheduler::domain::submission::{ExecuteRequest, QueueEntry, ResourceLimits, Submission};
use tiered_execution_scheduler::events::EventSink;
use tiered_execution_scheduler::external::record_store::JobRecordStore;
use tiered_execution_scheduler::ids::Id;
use tiered_execution_scheduler::mocks::{CountingEventPublisher, InMemoryRecordStore, InstantRunner, PermissiveCatalog};
use tiered_execution_scheduler::pools::ResourcePools;
use tiered_execution_scheduler::queue::WaitQueue;
use tiered_execution_scheduler::scheduler::{Scheduler, Viewer};

fn config(ram_gb: f64, ram_max_concurrent: u32, disk_max_concurrent: u32, fallback_to_disk: bool, full_behavior: RamPoolFullBehavior, max_queue_depth: u32) -> SchedulerConfig {
    let mut job_profiles = HashMap::new();
    job_profiles.insert("standard".to_string(), JobProfileConfig { preferred_tier: Tier::Ram, ram_capacity_cost_gb: 0.5 });

    SchedulerConfig {
        enable_tiered_execution: true,
        ram_pool: RamPoolConfig { total_capacity_gb: ram_gb, max_concurrent_jobs: ram_max_concurrent },
        disk_pool: DiskPoolConfig { max_concurrent_jobs: disk_max_concurrent },
        tier_selection_strategy: TierSelectionStrategy { fallback_to_disk, ram_pool_full_behavior: full_behavior, max_queue_depth, queue_timeout_minutes: 1 },
        job_profiles,
        default_job_profile: "standard".to_string(),
        default_max_cpu_percentage: 100.0,
        default_max_memory_mb: 512,
        default_max_disk_mb: 1024,
        default_max_execution_time_minutes: 30,
        default_max_concurrent_executions: 8,
        max_concurrent_executions: 64,
        max_concurrent_executions_per_user: 32,
        max_concurrent_executions_per_program: 32,
        max_allowed_memory_mb: 8192,
        max_allowed_execution_time_minutes: 120,
        stale_reservation_max_age: Duration::from_secs(3600),
        sweeper_interval: Duration::from_secs(3600),
    }
}

fn request() -> ExecuteRequest {
    ExecuteRequest { parameters: json!({}), environment: json!({}), resource_limits: ResourceLimits::default(), save_results: true, job_profile: None }
}

/// Scenario 1: RAM happy path.
#[tokio::test(flavor = "multi_thread")]
async fn ram_happy_path_completes_with_capacity_restored() {
    let cfg = config(2.0, 4, 2, true, RamPoolFullBehavior::Queue, 8);
    let record_store: Arc<dyn JobRecordStore> = Arc::new(InMemoryRecordStore::new());
    let runner = Arc::new(InstantRunner::with_delay(Duration::from_millis(80)));
    let scheduler = Scheduler::new(cfg, Arc::new(PermissiveCatalog), record_store, runner, None);

    let program_id = Id::generate();
    let version_id = Id::generate();
    let user_id = Id::generate();

    let job_id = scheduler.execute_version(program_id, version_id, user_id, request(), CancellationToken::new()).await.expect("submission should be admitted");

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(scheduler.get_status(job_id).await.unwrap(), JobStatus::Running);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(scheduler.get_status(job_id).await.unwrap(), JobStatus::Completed);

    scheduler.shutdown().await;
}

/// Scenario 2: RAM fallback to Disk once RAM capacity/concurrency is exhausted.
#[tokio::test(flavor = "multi_thread")]
async fn fifth_job_falls_back_to_disk_when_ram_is_full() {
    let cfg = config(2.0, 4, 2, true, RamPoolFullBehavior::Queue, 8);
    let record_store: Arc<dyn JobRecordStore> = Arc::new(InMemoryRecordStore::new());
    let runner = Arc::new(InstantRunner::with_delay(Duration::from_millis(150)));
    let scheduler = Scheduler::new(cfg, Arc::new(PermissiveCatalog), record_store, runner, None);

    let program_id = Id::generate();
    let version_id = Id::generate();

    let mut job_ids = Vec::new();
    for _ in 0..5 {
        let job_id = scheduler.execute_version(program_id, version_id, Id::generate(), request(), CancellationToken::new()).await.expect("submission should be admitted");
        job_ids.push(job_id);
    }

    tokio::time::sleep(Duration::from_millis(250)).await;
    for job_id in job_ids {
        assert_eq!(scheduler.get_status(job_id).await.unwrap(), JobStatus::Completed);
    }

    scheduler.shutdown().await;
}

/// Scenario 3: queueing with FIFO admission when a running slot frees up.
#[tokio::test(flavor = "multi_thread")]
async fn excess_ram_jobs_queue_then_drain_on_release() {
    let cfg = config(2.0, 4, 2, false, RamPoolFullBehavior::Queue, 2);
    let record_store: Arc<dyn JobRecordStore> = Arc::new(InMemoryRecordStore::new());
    let runner = Arc::new(InstantRunner::with_delay(Duration::from_millis(200)));
    let scheduler = Scheduler::new(cfg, Arc::new(PermissiveCatalog), record_store, runner, None);

    let program_id = Id::generate();
    let version_id = Id::generate();

    let mut running = Vec::new();
    for _ in 0..4 {
        running.push(scheduler.execute_version(program_id, version_id, Id::generate(), request(), CancellationToken::new()).await.unwrap());
    }

    tokio::time::sleep(Duration::from_millis(30)).await;

    let queued_a = scheduler.execute_version(program_id, version_id, Id::generate(), request(), CancellationToken::new()).await.unwrap();
    let queued_b = scheduler.execute_version(program_id, version_id, Id::generate(), request(), CancellationToken::new()).await.unwrap();
    assert_eq!(scheduler.get_status(queued_a).await.unwrap(), JobStatus::Queued);
    assert_eq!(scheduler.get_status(queued_b).await.unwrap(), JobStatus::Queued);

    let rejected = scheduler.execute_version(program_id, version_id, Id::generate(), request(), CancellationToken::new()).await.unwrap();
    let rejected_result = scheduler.get_result(rejected).await.unwrap();
    assert_eq!(scheduler.get_status(rejected).await.unwrap(), JobStatus::Failed);
    assert!(rejected_result.error_message.unwrap().to_lowercase().contains("queue"));

    // Give the four running jobs time to finish; each release should drain
    // one queued entry back into Running until both complete.
    tokio::time::sleep(Duration::from_millis(800)).await;

    for job_id in running {
        assert_eq!(scheduler.get_status(job_id).await.unwrap(), JobStatus::Completed);
    }
    assert_eq!(scheduler.get_status(queued_a).await.unwrap(), JobStatus::Completed);
    assert_eq!(scheduler.get_status(queued_b).await.unwrap(), JobStatus::Completed);

    scheduler.shutdown().await;
}

/// Scenario 4: a queue entry whose TTL has elapsed is discarded as `failed`
/// even without any pool release ever happening — exercised directly
/// against the `Dispatcher` so the test doesn't need to sleep for real
/// minutes to simulate an expired queue timeout.
#[tokio::test]
async fn expired_queue_entry_fails_without_ever_being_admitted() {
    let cfg = Arc::new(config(1.0, 1, 1, false, RamPoolFullBehavior::Queue, 4));
    let record_store: Arc<dyn JobRecordStore> = Arc::new(InMemoryRecordStore::new());
    let runner = Arc::new(InstantRunner::new());
    let pools = ResourcePools::new(cfg.ram_capacity_mb(), cfg.ram_pool.max_concurrent_jobs, cfg.disk_pool.max_concurrent_jobs);
    let queue = Arc::new(WaitQueue::new(cfg.tier_selection_strategy.max_queue_depth));
    let dispatcher = Dispatcher::new(record_store.clone(), runner, pools, queue, EventSink::disabled());

    let program_id = Id::generate();
    let version_id = Id::generate();
    let user_id = Id::generate();
    let job_id = Id::generate();

    let record = JobRecord {
        id: job_id,
        program_id,
        version_id,
        user_id,
        execution_kind: ExecutionKind::ProjectExecution,
        job_profile: "standard".to_string(),
        tier: None,
        created_at: chrono::Utc::now(),
        started_at: None,
        completed_at: None,
        status: JobStatus::Queued,
        parameters: json!({}),
        result: JobResult::default(),
        resource_usage: ResourceUsage::default(),
    };
    let cancel = CancellationToken::new();
    record_store.create(record.clone(), &cancel).await.unwrap();

    let submission = Submission {
        program_id,
        version_id,
        user_id,
        parameters: json!({}),
        environment: json!({}),
        resource_limits: ResourceLimits::default(),
        save_results: true,
        job_profile: Some("standard".to_string()),
    };

    // enqueued 125 seconds ago, against a 1-minute queue timeout: well past
    // expiry, and the pool was never full-then-released to trigger a drain.
    let stale_entry = QueueEntry {
        record,
        submission,
        enqueued_at: Instant::now() - Duration::from_secs(125),
        ram_cost_mb: 512,
        cancellation: CancellationToken::new(),
    };
    assert!(dispatcher.queue().enqueue(stale_entry).is_ok());

    dispatcher.drain_queue_once(&cfg).await;

    let stored = record_store.get(job_id, &cancel).await.unwrap().expect("record should still exist");
    assert_eq!(stored.status, JobStatus::Failed);
    let message = stored.result.error_message.unwrap().to_lowercase();
    assert!(message.contains("queue"));
    assert!(message.contains("timeout"));
}

/// Scenario 5: the submitter disconnecting mid-run never aborts the runner
/// or leaves the job stuck in `running`.
#[tokio::test(flavor = "multi_thread")]
async fn submitter_cancellation_never_affects_finalization() {
    let cfg = config(2.0, 4, 2, true, RamPoolFullBehavior::Queue, 8);
    let record_store: Arc<dyn JobRecordStore> = Arc::new(InMemoryRecordStore::new());
    let runner = Arc::new(InstantRunner::with_delay(Duration::from_millis(150)));
    let scheduler = Scheduler::new(cfg, Arc::new(PermissiveCatalog), record_store, runner, None);

    let submitter_cancel = CancellationToken::new();
    let job_id = scheduler.execute_version(Id::generate(), Id::generate(), Id::generate(), request(), submitter_cancel.clone()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    submitter_cancel.cancel();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let status = scheduler.get_status(job_id).await.unwrap();
    assert_ne!(status, JobStatus::Running);
    assert_eq!(status, JobStatus::Completed);

    scheduler.shutdown().await;
}

/// Scenario 6: the sweeper reclaims a stale reservation without touching
/// the job record.
#[tokio::test(flavor = "multi_thread")]
async fn stale_reservation_sweep_reclaims_without_mutating_the_record() {
    let mut cfg = config(2.0, 4, 2, true, RamPoolFullBehavior::Queue, 8);
    cfg.stale_reservation_max_age = Duration::from_millis(10);
    let record_store: Arc<dyn JobRecordStore> = Arc::new(InMemoryRecordStore::new());
    let runner = Arc::new(InstantRunner::with_delay(Duration::from_secs(5)));
    let scheduler = Scheduler::new(cfg, Arc::new(PermissiveCatalog), record_store, runner, Some(Arc::new(CountingEventPublisher::default())));

    let job_id = scheduler.execute_version(Id::generate(), Id::generate(), Id::generate(), request(), CancellationToken::new()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(scheduler.get_status(job_id).await.unwrap(), JobStatus::Running);

    let reclaimed = scheduler.clean_stale_reservations(Duration::from_millis(10)).await;
    assert_eq!(reclaimed, 1);

    // the sweeper never touches the record itself
    assert_eq!(scheduler.get_status(job_id).await.unwrap(), JobStatus::Running);

    scheduler.shutdown().await;
}

/// `get_recent_executions` hides other users' jobs from a non-admin viewer.
#[tokio::test(flavor = "multi_thread")]
async fn recent_executions_are_scoped_to_the_viewer_unless_admin() {
    let cfg = config(2.0, 4, 2, true, RamPoolFullBehavior::Queue, 8);
    let record_store: Arc<dyn JobRecordStore> = Arc::new(InMemoryRecordStore::new());
    let runner = Arc::new(InstantRunner::new());
    let scheduler = Scheduler::new(cfg, Arc::new(PermissiveCatalog), record_store, runner, None);

    let alice = Id::generate();
    let bob = Id::generate();

    scheduler.execute_version(Id::generate(), Id::generate(), alice, request(), CancellationToken::new()).await.unwrap();
    scheduler.execute_version(Id::generate(), Id::generate(), bob, request(), CancellationToken::new()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let alice_view = scheduler.get_recent_executions(10, Viewer { user_id: alice, is_admin: false }).await.unwrap();
    assert_eq!(alice_view.len(), 1);
    assert_eq!(alice_view[0].user_id, alice);

    let admin_view = scheduler.get_recent_executions(10, Viewer { user_id: alice, is_admin: true }).await.unwrap();
    assert_eq!(admin_view.len(), 2);

    scheduler.shutdown().await;
}
