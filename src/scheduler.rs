//! Top-level scheduler façade (§6 "Exposed surface (administrative/operator)").
//!
//! Grounded on the teacher's `generate_system_model` + `vrm_manager.rs`
//! pairing: a thin constructor that wires the collaborators together
//! (§9 "plain function tables / capability objects passed to the
//! scheduler constructor") and a top-level type exposing the
//! submit/control/read/maintenance operations the spec names.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::admission::AdmissionController;
use crate::config::SchedulerConfig;
use crate::dispatcher::Dispatcher;
use crate::domain::job::{ExecutionKind, JobRecord, JobResult, JobStatus, ResourceUsage};
use crate::domain::submission::{ExecuteRequest, ResourceLimits, Submission};
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::external::catalog::Catalog;
use crate::external::event_stream::{EventPublisher, SchedulerEvent};
use crate::external::record_store::JobRecordStore;
use crate::external::runner::Runner;
use crate::ids::{Id, JobId, ProgramId, UserId, VersionId};
use crate::persistence;
use crate::pools::ResourcePools;
use crate::queue::WaitQueue;
use crate::sanitizer;

/// Who is asking for `get_recent_executions` (§6: "admin sees all, others
/// see only own"). Authentication itself is out of scope (§1 Non-goals);
/// the caller resolves this beforehand.
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub user_id: UserId,
    pub is_admin: bool,
}

/// The assembled scheduler. Cheap to clone (every field is `Arc`-backed or
/// a plain value) and `Send + Sync`, so it can be shared behind an `Arc`
/// by whatever wire layer sits in front of it.
pub struct Scheduler {
    config: Arc<SchedulerConfig>,
    catalog: Arc<dyn Catalog>,
    record_store: Arc<dyn JobRecordStore>,
    admission: AdmissionController,
    dispatcher: Dispatcher,
    sweeper_cancel: CancellationToken,
    sweeper_handle: tokio::task::JoinHandle<()>,
}

impl Scheduler {
    /// Builds a scheduler from its external collaborators (§6 "Consumed
    /// interfaces") and a validated configuration, then starts the
    /// stale-reservation sweeper (C8). Runs the startup validator (§4.10)
    /// first, which panics if the configuration can never admit a single
    /// RAM job.
    pub fn new(
        config: SchedulerConfig,
        catalog: Arc<dyn Catalog>,
        record_store: Arc<dyn JobRecordStore>,
        runner: Arc<dyn Runner>,
        event_publisher: Option<Arc<dyn EventPublisher>>,
    ) -> Self {
        crate::validator::validate(&config);

        let config = Arc::new(config);
        let pools = ResourcePools::new(config.ram_capacity_mb(), config.ram_pool.max_concurrent_jobs, config.disk_pool.max_concurrent_jobs);
        let queue = Arc::new(WaitQueue::new(config.tier_selection_strategy.max_queue_depth));
        let events = EventSink::new(event_publisher);
        {
            let events = events.clone();
            tokio::spawn(async move { events.start().await });
        }
        let admission = AdmissionController::new(catalog.clone(), record_store.clone());
        let dispatcher = Dispatcher::new(record_store.clone(), runner, pools, queue, events);

        let sweeper_cancel = CancellationToken::new();
        let sweeper_handle = dispatcher.spawn_sweeper(config.clone(), sweeper_cancel.clone());

        Scheduler { config, catalog, record_store, admission, dispatcher, sweeper_cancel, sweeper_handle }
    }

    /// Stops the background sweeper. Does not touch any in-flight job —
    /// those keep running to finalization regardless (§5).
    pub async fn shutdown(self) {
        self.sweeper_cancel.cancel();
        let _ = self.sweeper_handle.await;
    }

    fn build_submission(&self, program_id: ProgramId, version_id: VersionId, user_id: UserId, request: ExecuteRequest) -> Submission {
        Submission {
            program_id,
            version_id,
            user_id,
            parameters: sanitizer::sanitize(&request.parameters),
            environment: request.environment,
            resource_limits: request.resource_limits,
            save_results: request.save_results,
            job_profile: request.job_profile,
        }
    }

    async fn submit(&self, execution_kind: ExecutionKind, submission: Submission, submitter_cancel: CancellationToken) -> Result<JobId> {
        self.admission.check(&submission, &self.config, &submitter_cancel).await?;

        let (job_profile, _) = self.config.resolve_profile(submission.job_profile.as_deref());

        let record = JobRecord {
            id: Id::generate(),
            program_id: submission.program_id,
            version_id: submission.version_id,
            user_id: submission.user_id,
            execution_kind,
            job_profile,
            tier: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            status: JobStatus::Running,
            parameters: submission.parameters.clone(),
            result: JobResult::default(),
            resource_usage: ResourceUsage::default(),
        };

        let assigned_id = self.record_store.create(record.clone(), &submitter_cancel).await.map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?;
        let mut record = record;
        record.id = assigned_id;

        let admin_cancel = CancellationToken::new();
        self.dispatcher.dispatch(self.config.clone(), record, submission, admin_cancel).await;

        Ok(assigned_id)
    }

    /// `execute_program(program-id, user-id, {...})` (§6) — resolves the
    /// program's latest eligible version implicitly.
    pub async fn execute_program(&self, program_id: ProgramId, user_id: UserId, request: ExecuteRequest, submitter_cancel: CancellationToken) -> Result<JobId> {
        let version_id = self.catalog.latest_version(program_id).await.map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?.ok_or(Error::ProgramNotFound(program_id))?;
        self.execute_version(program_id, version_id, user_id, request, submitter_cancel).await
    }

    /// `execute_program` with an explicit version id (§6 "Submit by version").
    pub async fn execute_version(&self, program_id: ProgramId, version_id: VersionId, user_id: UserId, request: ExecuteRequest, submitter_cancel: CancellationToken) -> Result<JobId> {
        let submission = self.build_submission(program_id, version_id, user_id, request);
        self.submit(ExecutionKind::ProjectExecution, submission, submitter_cancel).await
    }

    /// Deploys a long-running web app from a specific version, using the
    /// same admission/dispatch pipeline as a plain execution but recorded
    /// under `ExecutionKind::WebAppDeploy` (§3 data model).
    pub async fn deploy_web_app(&self, program_id: ProgramId, version_id: VersionId, user_id: UserId, request: ExecuteRequest, submitter_cancel: CancellationToken) -> Result<JobId> {
        let submission = self.build_submission(program_id, version_id, user_id, request);
        self.submit(ExecutionKind::WebAppDeploy, submission, submitter_cancel).await
    }

    /// `schedule_execution(program-id, {scheduled-time, parameters})` (§6).
    /// `scheduled_time` is accepted for the caller's own bookkeeping; an
    /// external periodic driver is expected to call `trigger_scheduled`
    /// once it elapses (§9 "delegated to an external periodic driver").
    pub async fn schedule_execution(
        &self,
        program_id: ProgramId,
        version_id: VersionId,
        user_id: UserId,
        _scheduled_time: chrono::DateTime<Utc>,
        parameters: serde_json::Value,
        submitter_cancel: CancellationToken,
    ) -> Result<JobId> {
        let submission = Submission {
            program_id,
            version_id,
            user_id,
            parameters: sanitizer::sanitize(&parameters),
            environment: json!({}),
            resource_limits: ResourceLimits::default(),
            save_results: true,
            job_profile: None,
        };

        self.admission.check_eligibility(&submission).await?;

        let (job_profile, _) = self.config.resolve_profile(None);
        let record = JobRecord {
            id: Id::generate(),
            program_id,
            version_id,
            user_id,
            execution_kind: ExecutionKind::ScheduledExecution,
            job_profile,
            tier: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            status: JobStatus::Scheduled,
            parameters: submission.parameters,
            result: JobResult::default(),
            resource_usage: ResourceUsage::default(),
        };

        self.record_store.create(record, &submitter_cancel).await.map_err(|e| Error::CollaboratorUnavailable(e.to_string()))
    }

    /// Runs full admission (now including the concurrency ceilings that
    /// `schedule_execution` deferred) and dispatches a previously
    /// `scheduled` job. Meant to be called by an external periodic driver
    /// once `scheduled_time` has elapsed.
    pub async fn trigger_scheduled(&self, job_id: JobId) -> Result<()> {
        let cancel = CancellationToken::new();
        let record = self.record_store.get(job_id, &cancel).await.map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?.ok_or(Error::JobNotFound(job_id))?;

        if record.status != JobStatus::Scheduled {
            return Err(Error::InvalidJobState(job_id));
        }

        let submission = Submission {
            program_id: record.program_id,
            version_id: record.version_id,
            user_id: record.user_id,
            parameters: record.parameters.clone(),
            environment: json!({}),
            resource_limits: ResourceLimits::default(),
            save_results: true,
            job_profile: Some(record.job_profile.clone()),
        };

        self.admission.check(&submission, &self.config, &cancel).await?;

        let mut record = record;
        record.status = JobStatus::Running;

        let admin_cancel = CancellationToken::new();
        self.dispatcher.dispatch(self.config.clone(), record, submission, admin_cancel).await;

        Ok(())
    }

    /// `cancel_scheduled` (§6) — only valid while the job is still
    /// `scheduled`; once triggered, use `stop` instead.
    pub async fn cancel_scheduled(&self, job_id: JobId) -> Result<()> {
        let cancel = CancellationToken::new();
        let mut record = self.record_store.get(job_id, &cancel).await.map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?.ok_or(Error::JobNotFound(job_id))?;

        if record.status != JobStatus::Scheduled {
            return Err(Error::InvalidJobState(job_id));
        }

        record.status = JobStatus::Cancelled;
        record.completed_at = Some(Utc::now());
        persistence::finalize_record(self.record_store.as_ref(), &record, &cancel).await;
        Ok(())
    }

    /// `stop` (§6) — cancels the admin scope for a running or queued job.
    /// Returns `false` if the job isn't currently live (already terminal,
    /// or unknown).
    pub fn stop(&self, job_id: JobId) -> bool {
        self.dispatcher.request_stop(job_id)
    }

    /// `pause` (§6) — record-status-only; per the design notes' open
    /// question, a paused job keeps its pool reservation so `resume` is
    /// O(1). Only valid from `running`.
    pub async fn pause(&self, job_id: JobId) -> Result<()> {
        let cancel = CancellationToken::new();
        let record = self.record_store.get(job_id, &cancel).await.map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?.ok_or(Error::JobNotFound(job_id))?;
        if record.status != JobStatus::Running {
            return Err(Error::InvalidJobState(job_id));
        }
        persistence::write_status(self.record_store.as_ref(), job_id, JobStatus::Paused, &cancel).await;
        self.dispatcher.events().publish(SchedulerEvent::StatusChanged { job_id, user_id: record.user_id, status: JobStatus::Paused }).await;
        Ok(())
    }

    /// `resume` (§6) — only valid from `paused`.
    pub async fn resume(&self, job_id: JobId) -> Result<()> {
        let cancel = CancellationToken::new();
        let record = self.record_store.get(job_id, &cancel).await.map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?.ok_or(Error::JobNotFound(job_id))?;
        if record.status != JobStatus::Paused {
            return Err(Error::InvalidJobState(job_id));
        }
        persistence::write_status(self.record_store.as_ref(), job_id, JobStatus::Running, &cancel).await;
        self.dispatcher.events().publish(SchedulerEvent::StatusChanged { job_id, user_id: record.user_id, status: JobStatus::Running }).await;
        Ok(())
    }

    /// `get_status` (§6).
    pub async fn get_status(&self, job_id: JobId) -> Result<JobStatus> {
        Ok(self.get_record(job_id).await?.status)
    }

    /// `get_result` (§6).
    pub async fn get_result(&self, job_id: JobId) -> Result<JobResult> {
        Ok(self.get_record(job_id).await?.result)
    }

    /// `get_logs(n)` (§6) — last `n` lines across stdout and stderr,
    /// interleaved in capture order (stdout first, then stderr, matching
    /// how `RunOutcome` carries them as two separate streams).
    pub async fn get_logs(&self, job_id: JobId, n: usize) -> Result<String> {
        let record = self.get_record(job_id).await?;
        let mut lines: Vec<&str> = record.result.stdout.lines().chain(record.result.stderr.lines()).collect();
        if lines.len() > n {
            lines = lines.split_off(lines.len() - n);
        }
        Ok(lines.join("\n"))
    }

    /// `get_recent_executions(n, viewer)` (§6 — "admin sees all, others
    /// see only own").
    pub async fn get_recent_executions(&self, n: usize, viewer: Viewer) -> Result<Vec<JobRecord>> {
        let cancel = CancellationToken::new();
        let recent = self.record_store.list_recent(n, &cancel).await.map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?;

        if viewer.is_admin {
            return Ok(recent);
        }

        Ok(recent.into_iter().filter(|record| record.user_id == viewer.user_id).collect())
    }

    /// `cleanup_old(days_to_keep)` (§6).
    pub async fn cleanup_old(&self, days_to_keep: i64) -> Result<u64> {
        let cancel = CancellationToken::new();
        self.record_store.cleanup_older_than(chrono::Duration::days(days_to_keep), &cancel).await.map_err(|e| Error::CollaboratorUnavailable(e.to_string()))
    }

    /// `clean_stale_reservations(max_age)` (§6) — an on-demand version of
    /// what the sweeper (C8) already runs periodically.
    pub async fn clean_stale_reservations(&self, max_age: Duration) -> usize {
        let reclaimed = crate::sweeper::sweep_once(self.dispatcher.pools(), max_age);
        for _ in &reclaimed {
            self.dispatcher.drain_queue_once(&self.config).await;
        }
        self.dispatcher.drain_queue_once(&self.config).await;
        reclaimed.len()
    }

    async fn get_record(&self, job_id: JobId) -> Result<JobRecord> {
        let cancel = CancellationToken::new();
        self.record_store.get(job_id, &cancel).await.map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?.ok_or(Error::JobNotFound(job_id))
    }
}
