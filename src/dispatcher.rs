//! Dispatcher (C5, §4.5).
//!
//! Classifies a job by profile, selects a tier, reserves or queues, hands
//! off to the runner, and guarantees finalization. Grounded on the
//! teacher's `vrm_manager.rs::process_reservation` probe→reserve→commit
//! walk: classify, attempt acquisition, fall back, then hand the actual
//! work to a detached `tokio::spawn` task so the submitter's handle is
//! never on the critical path (§5 "each job runs in its own task whose
//! lifetime is decoupled from the submitter's handle").

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::{RamPoolFullBehavior, SchedulerConfig};
use crate::domain::job::{JobRecord, JobStatus};
use crate::domain::profile::Tier;
use crate::domain::submission::{QueueEntry, Submission};
use crate::events::EventSink;
use crate::external::event_stream::SchedulerEvent;
use crate::external::record_store::JobRecordStore;
use crate::external::runner::{RunRequest, Runner};
use crate::ids::JobId;
use crate::persistence;
use crate::pools::{AcquireOutcome, ResourcePools};
use crate::queue::WaitQueue;
use crate::sweeper;

/// Outcome of a single `dispatch` call, useful for logging at the call
/// site; the caller never blocks on it reaching a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Dispatched,
    Queued,
    Rejected,
}

/// The dispatcher (C5). Cheap to `Clone` — every field is itself `Arc`-backed
/// or a plain handle — so the same instance is shared between the
/// submission path, the detached per-job tasks it spawns, and the sweeper.
#[derive(Clone)]
pub struct Dispatcher {
    record_store: Arc<dyn JobRecordStore>,
    runner: Arc<dyn Runner>,
    pools: ResourcePools,
    queue: Arc<WaitQueue>,
    events: EventSink,
    /// Admin-cancellation scope for every job currently running or queued,
    /// keyed by job id. Removed at finalization (§4.5 "(d) the live
    /// context is removed") or on dequeue.
    live: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
}

impl Dispatcher {
    pub fn new(record_store: Arc<dyn JobRecordStore>, runner: Arc<dyn Runner>, pools: ResourcePools, queue: Arc<WaitQueue>, events: EventSink) -> Self {
        Dispatcher { record_store, runner, pools, queue, events, live: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn pools(&self) -> &ResourcePools {
        &self.pools
    }

    pub fn queue(&self) -> &WaitQueue {
        &self.queue
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// Cancels the admin scope for `job_id`, if it is currently running or
    /// queued. Returns `true` if a live job was found and signalled.
    /// Administrative `stop` (§4.5 state machine: "Any non-terminal →
    /// `stopped`").
    pub fn request_stop(&self, job_id: JobId) -> bool {
        let guard = self.live.lock().expect("dispatcher live-set mutex poisoned");
        match guard.get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Classifies `record`/`submission`, selects a tier, and either
    /// dispatches in the background, enqueues, or rejects outright. A
    /// `Rejected`/rejected-via-queue-full outcome has already had its
    /// terminal status and completion event written before returning.
    pub async fn dispatch(&self, config: Arc<SchedulerConfig>, mut record: JobRecord, submission: Submission, admin_cancel: CancellationToken) -> Admission {
        self.live.lock().expect("dispatcher live-set mutex poisoned").insert(record.id, admin_cancel.clone());

        if !config.enable_tiered_execution {
            record.tier = Some(Tier::Standard);
            self.run_in_background(config, record, submission, Tier::Standard, admin_cancel);
            return Admission::Dispatched;
        }

        let (profile_name, profile) = config.resolve_profile(submission.job_profile.as_deref());
        record.job_profile = profile_name;

        match profile.preferred_tier {
            Tier::Ram => self.select_ram(config, record, submission, profile.ram_cost_mb(), admin_cancel).await,
            Tier::Disk => self.select_disk(config, record, submission, admin_cancel).await,
            Tier::Standard => {
                log::warn!("job profile '{}' resolved to Tier::Standard while tiered execution is enabled; treating as non-tiered", record.job_profile);
                self.run_in_background(config, record, submission, Tier::Standard, admin_cancel);
                Admission::Dispatched
            }
        }
    }

    /// §4.5 selection algorithm, steps 1-4.
    async fn select_ram(&self, config: Arc<SchedulerConfig>, record: JobRecord, submission: Submission, ram_cost_mb: i64, admin_cancel: CancellationToken) -> Admission {
        match self.pools.try_acquire_ram(record.id, ram_cost_mb) {
            AcquireOutcome::Acquired => {
                self.run_in_background(config, record, submission, Tier::Ram, admin_cancel);
                return Admission::Dispatched;
            }
            AcquireOutcome::InsufficientCapacity | AcquireOutcome::ConcurrencyLimitReached => {}
        }

        if config.tier_selection_strategy.fallback_to_disk {
            if let AcquireOutcome::Acquired = self.pools.try_acquire_disk(record.id) {
                self.run_in_background(config, record, submission, Tier::Disk, admin_cancel);
                return Admission::Dispatched;
            }
        }

        match config.tier_selection_strategy.ram_pool_full_behavior {
            RamPoolFullBehavior::Queue => self.enqueue_or_reject(config, record, submission, ram_cost_mb, admin_cancel).await,
            RamPoolFullBehavior::Reject => {
                self.fail_before_dispatch(record, "RAM pool full, queueing disabled").await;
                Admission::Rejected
            }
        }
    }

    /// §4.5 step 5: Disk-preferred jobs never fall back or queue.
    async fn select_disk(&self, config: Arc<SchedulerConfig>, record: JobRecord, submission: Submission, admin_cancel: CancellationToken) -> Admission {
        match self.pools.try_acquire_disk(record.id) {
            AcquireOutcome::Acquired => {
                self.run_in_background(config, record, submission, Tier::Disk, admin_cancel);
                Admission::Dispatched
            }
            _ => {
                self.fail_before_dispatch(record, "Disk pool full").await;
                Admission::Rejected
            }
        }
    }

    async fn enqueue_or_reject(&self, config: Arc<SchedulerConfig>, mut record: JobRecord, submission: Submission, ram_cost_mb: i64, admin_cancel: CancellationToken) -> Admission {
        if self.queue.len() as u32 >= config.tier_selection_strategy.max_queue_depth {
            self.fail_before_dispatch(record, "queue full").await;
            return Admission::Rejected;
        }

        record.status = JobStatus::Queued;
        persistence::write_status(self.record_store.as_ref(), record.id, JobStatus::Queued, &admin_cancel).await;
        self.events.publish(SchedulerEvent::StatusChanged { job_id: record.id, user_id: record.user_id, status: JobStatus::Queued }).await;

        let entry = QueueEntry { record, submission, enqueued_at: std::time::Instant::now(), ram_cost_mb, cancellation: admin_cancel };
        if self.queue.enqueue(entry).is_err() {
            // Lost the race against a concurrent enqueue; treat as queue full.
            log::warn!("wait queue filled up between the length check and enqueue");
            return Admission::Rejected;
        }

        Admission::Queued
    }

    /// A record that never received a reservation: write its terminal
    /// `failed` status directly (no release, no background task — there is
    /// nothing to finalize).
    async fn fail_before_dispatch(&self, mut record: JobRecord, reason: &str) {
        record.status = JobStatus::Failed;
        record.completed_at = Some(Utc::now());
        record.result.error_message = Some(reason.to_string());
        record.result.exit_code = Some(-1);

        let finalization_cancel = CancellationToken::new();
        persistence::finalize_record(self.record_store.as_ref(), &record, &finalization_cancel).await;
        self.live.lock().expect("dispatcher live-set mutex poisoned").remove(&record.id);
        self.events.publish(SchedulerEvent::ExecutionCompleted { job_id: record.id, user_id: record.user_id, success: false }).await;
    }

    /// Spawns the detached per-job task that runs the job to completion and
    /// always finalizes it (§4.5 "Execution" + "Finalization (always runs)").
    fn run_in_background(&self, config: Arc<SchedulerConfig>, mut record: JobRecord, submission: Submission, tier: Tier, admin_cancel: CancellationToken) {
        let dispatcher = self.clone();

        record.tier = Some(tier);
        record.status = JobStatus::Running;
        record.started_at = Some(Utc::now());

        tokio::spawn(async move {
            persistence::write_status(dispatcher.record_store.as_ref(), record.id, JobStatus::Running, &admin_cancel).await;
            dispatcher.events.publish(SchedulerEvent::ExecutionStarted { job_id: record.id, user_id: record.user_id }).await;

            let run_cancel = admin_cancel.child_token();
            let request = RunRequest {
                job_id: record.id,
                program_id: record.program_id,
                version_id: record.version_id,
                user_id: record.user_id,
                tier,
                job_profile: record.job_profile.clone(),
                parameters: submission.parameters.clone(),
                environment: submission.environment.clone(),
                save_results: submission.save_results,
            };

            let outcome = dispatcher.runner.execute(request, run_cancel.clone()).await;

            match outcome {
                Ok(run_outcome) => {
                    record.completed_at = Some(run_outcome.completed_at);
                    record.result.exit_code = run_outcome.exit_code;
                    record.result.stdout = run_outcome.stdout;
                    record.result.stderr = run_outcome.stderr;
                    record.result.output_paths = run_outcome.output_paths;
                    record.resource_usage = run_outcome.resource_usage;

                    record.status = if run_cancel.is_cancelled() {
                        JobStatus::Stopped
                    } else if run_outcome.success {
                        JobStatus::Completed
                    } else {
                        record.result.error_message.get_or_insert_with(|| "runner reported failure".to_string());
                        JobStatus::Failed
                    };
                }
                Err(err) => {
                    record.completed_at = Some(Utc::now());
                    record.status = if run_cancel.is_cancelled() { JobStatus::Stopped } else { JobStatus::Failed };
                    record.result.exit_code = Some(-1);
                    record.result.error_message = Some(err.to_string());
                }
            }

            dispatcher.finalize(config, record, tier).await;
        });
    }

    /// Finalization block (§4.5): write the terminal status through an
    /// independent cancellation scope, release the reservation, drain the
    /// queue once, remove the live context, and publish completion.
    async fn finalize(&self, config: Arc<SchedulerConfig>, record: JobRecord, tier: Tier) {
        let job_id = record.id;
        let success = record.status == JobStatus::Completed;

        let finalization_cancel = CancellationToken::new();
        persistence::finalize_record(self.record_store.as_ref(), &record, &finalization_cancel).await;

        if tier != Tier::Standard {
            self.pools.release(job_id);
            self.drain_queue_once(&config).await;
        }

        self.live.lock().expect("dispatcher live-set mutex poisoned").remove(&job_id);
        self.events.publish(SchedulerEvent::ExecutionCompleted { job_id, user_id: record.user_id, success }).await;
    }

    /// Attempts to admit the head of the wait queue, discarding any
    /// TTL-expired entries it finds along the way (§4.4 "Draining is
    /// triggered after every successful `release`"). If the head can't
    /// be re-admitted (pool still full), it's pushed back so it doesn't
    /// lose its place in line.
    pub async fn drain_queue_once(&self, config: &Arc<SchedulerConfig>) {
        let outcome = self.queue.drain_one(config.tier_selection_strategy.queue_timeout());

        for expired in outcome.expired {
            self.live.lock().expect("dispatcher live-set mutex poisoned").remove(&expired.record.id);
            let mut record = expired.record;
            record.status = JobStatus::Failed;
            record.completed_at = Some(Utc::now());
            record.result.error_message = Some("queue timeout: job waited longer than the configured queue timeout".to_string());
            record.result.exit_code = Some(-1);

            let finalization_cancel = CancellationToken::new();
            persistence::finalize_record(self.record_store.as_ref(), &record, &finalization_cancel).await;
            self.events.publish(SchedulerEvent::ExecutionCompleted { job_id: record.id, user_id: record.user_id, success: false }).await;
        }

        let Some(candidate) = outcome.candidate else { return };

        if candidate.cancellation.is_cancelled() {
            self.live.lock().expect("dispatcher live-set mutex poisoned").remove(&candidate.record.id);
            let mut record = candidate.record;
            record.status = JobStatus::Stopped;
            record.completed_at = Some(Utc::now());

            let finalization_cancel = CancellationToken::new();
            persistence::finalize_record(self.record_store.as_ref(), &record, &finalization_cancel).await;
            self.events.publish(SchedulerEvent::ExecutionCompleted { job_id: record.id, user_id: record.user_id, success: false }).await;
            return;
        }

        match self.pools.try_acquire_ram(candidate.record.id, candidate.ram_cost_mb) {
            AcquireOutcome::Acquired => {
                self.run_in_background(config.clone(), candidate.record, candidate.submission, Tier::Ram, candidate.cancellation);
            }
            _ => {
                self.queue.requeue_front(candidate);
            }
        }
    }

    /// Runs one sweep pass (C8), then drains the wait queue once per
    /// reclaimed reservation plus one unconditional pass. The unconditional
    /// pass matters even when nothing was reclaimed: a queue entry can sit
    /// past its TTL for an entire sweeper interval with the pool never
    /// actually freeing up (§8 scenario 4), and nothing else would ever
    /// notice that expiry without a release to trigger a drain.
    pub async fn sweep_once(&self, config: &Arc<SchedulerConfig>) -> Vec<JobId> {
        let reclaimed = sweeper::sweep_once(&self.pools, config.stale_reservation_max_age);
        for _ in &reclaimed {
            self.drain_queue_once(config).await;
        }
        self.drain_queue_once(config).await;
        reclaimed
    }

    /// Spawns the sweeper as a detached background task (§4.8), running
    /// every `config.sweeper_interval` until `cancel` fires.
    pub fn spawn_sweeper(&self, config: Arc<SchedulerConfig>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let dispatcher = self.clone();
        let interval = config.sweeper_interval;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        log::info!("stale reservation sweeper stopping");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        dispatcher.sweep_once(&config).await;
                    }
                }
            }
        })
    }
}
