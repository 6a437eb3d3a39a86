//! In-memory mock collaborators implementing the consumed interfaces of
//! §6. Used by the demo binary (`main.rs`) for manual smoke-testing and by
//! the integration tests under `tests/`; not part of the scheduler's
//! public contract beyond "here's something that implements the traits".
//! Grounded on the teacher's `tests/simulator_mock.rs` (a hand-rolled
//! `SystemSimulator` stand-in implementing the same trait the real
//! component does).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::domain::job::{JobRecord, JobStatus, ResourceUsage};
use crate::external::catalog::{AccessLevel, Catalog};
use crate::external::event_stream::{EventPublisher, SchedulerEvent};
use crate::external::record_store::JobRecordStore;
use crate::external::runner::{RunOutcome, RunRequest, Runner};
use crate::ids::{Id, JobId, ProgramId, UserId, VersionId};

/// An in-memory `JobRecordStore` keyed by job id. `create` mints the id if
/// the caller left the placeholder unset relative to a prior record — here
/// it simply trusts the record's own `id` field, matching the "store is
/// the source of truth for identity collisions" resolution in `DESIGN.md`
/// while still returning whatever id it stored under.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<JobId, JobRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRecordStore for InMemoryRecordStore {
    async fn create(&self, record: JobRecord, _cancel: &CancellationToken) -> anyhow::Result<JobId> {
        let id = record.id;
        self.records.lock().expect("record store mutex poisoned").insert(id, record);
        Ok(id)
    }

    async fn get(&self, job_id: JobId, _cancel: &CancellationToken) -> anyhow::Result<Option<JobRecord>> {
        Ok(self.records.lock().expect("record store mutex poisoned").get(&job_id).cloned())
    }

    async fn update(&self, record: JobRecord, _cancel: &CancellationToken) -> anyhow::Result<()> {
        self.records.lock().expect("record store mutex poisoned").insert(record.id, record);
        Ok(())
    }

    async fn update_status(&self, job_id: JobId, status: JobStatus, _cancel: &CancellationToken) -> anyhow::Result<()> {
        let mut guard = self.records.lock().expect("record store mutex poisoned");
        if let Some(record) = guard.get_mut(&job_id) {
            record.status = status;
        }
        Ok(())
    }

    async fn complete(
        &self,
        job_id: JobId,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        output_paths: Vec<String>,
        error_message: Option<String>,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let mut guard = self.records.lock().expect("record store mutex poisoned");
        if let Some(record) = guard.get_mut(&job_id) {
            record.result.exit_code = exit_code;
            record.result.stdout = stdout;
            record.result.stderr = stderr;
            record.result.output_paths = output_paths;
            record.result.error_message = error_message;
            record.status = if record.result.exit_code == Some(0) { JobStatus::Completed } else { JobStatus::Failed };
            record.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_resource_usage(&self, job_id: JobId, usage: ResourceUsage, _cancel: &CancellationToken) -> anyhow::Result<()> {
        let mut guard = self.records.lock().expect("record store mutex poisoned");
        if let Some(record) = guard.get_mut(&job_id) {
            record.resource_usage = usage;
        }
        Ok(())
    }

    async fn list_by_program(&self, program_id: ProgramId, _cancel: &CancellationToken) -> anyhow::Result<Vec<JobRecord>> {
        Ok(self.records.lock().expect("record store mutex poisoned").values().filter(|r| r.program_id == program_id).cloned().collect())
    }

    async fn list_by_version(&self, version_id: VersionId, _cancel: &CancellationToken) -> anyhow::Result<Vec<JobRecord>> {
        Ok(self.records.lock().expect("record store mutex poisoned").values().filter(|r| r.version_id == version_id).cloned().collect())
    }

    async fn list_by_user(&self, user_id: UserId, _cancel: &CancellationToken) -> anyhow::Result<Vec<JobRecord>> {
        Ok(self.records.lock().expect("record store mutex poisoned").values().filter(|r| r.user_id == user_id).cloned().collect())
    }

    async fn list_by_status(&self, status: JobStatus, _cancel: &CancellationToken) -> anyhow::Result<Vec<JobRecord>> {
        Ok(self.records.lock().expect("record store mutex poisoned").values().filter(|r| r.status == status).cloned().collect())
    }

    async fn list_recent(&self, limit: usize, _cancel: &CancellationToken) -> anyhow::Result<Vec<JobRecord>> {
        let guard = self.records.lock().expect("record store mutex poisoned");
        let mut all: Vec<JobRecord> = guard.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn cleanup_older_than(&self, age: chrono::Duration, _cancel: &CancellationToken) -> anyhow::Result<u64> {
        let mut guard = self.records.lock().expect("record store mutex poisoned");
        let cutoff = Utc::now() - age;
        let before = guard.len();
        guard.retain(|_, record| record.created_at >= cutoff || !record.status.is_terminal());
        Ok((before - guard.len()) as u64)
    }

    async fn exists(&self, job_id: JobId, _cancel: &CancellationToken) -> anyhow::Result<bool> {
        Ok(self.records.lock().expect("record store mutex poisoned").contains_key(&job_id))
    }
}

/// A permissive catalog: every program/version exists, is eligible, and
/// public — enough to exercise the scheduler core without a real catalog
/// service behind it.
pub struct PermissiveCatalog;

#[async_trait]
impl Catalog for PermissiveCatalog {
    async fn program_exists(&self, _program_id: ProgramId) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn version_exists(&self, _program_id: ProgramId, _version_id: VersionId) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn is_version_eligible(&self, _program_id: ProgramId, _version_id: VersionId) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn latest_version(&self, _program_id: ProgramId) -> anyhow::Result<Option<VersionId>> {
        Ok(Some(Id::generate()))
    }

    async fn is_program_public(&self, _program_id: ProgramId) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn direct_access(&self, _user_id: UserId, _program_id: ProgramId) -> anyhow::Result<Option<AccessLevel>> {
        Ok(Some(AccessLevel::Execute))
    }

    async fn group_access(&self, _user_id: UserId, _program_id: ProgramId) -> anyhow::Result<Option<AccessLevel>> {
        Ok(None)
    }
}

/// Runner that completes immediately and successfully, optionally after a
/// configured delay — enough to simulate the "client disconnects mid-run"
/// scenario (§8 scenario 5) without a real sandbox.
pub struct InstantRunner {
    pub delay: Duration,
}

impl InstantRunner {
    pub fn new() -> Self {
        InstantRunner { delay: Duration::ZERO }
    }

    pub fn with_delay(delay: Duration) -> Self {
        InstantRunner { delay }
    }
}

impl Default for InstantRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for InstantRunner {
    async fn execute(&self, request: RunRequest, cancel: CancellationToken) -> anyhow::Result<RunOutcome> {
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancel.cancelled() => {}
            }
        }

        Ok(RunOutcome {
            success: true,
            exit_code: Some(0),
            stdout: format!("job {:?} ran under tier {:?}", request.job_id, request.tier),
            stderr: String::new(),
            output_paths: Vec::new(),
            resource_usage: ResourceUsage::default(),
            completed_at: Utc::now(),
            duration: self.delay,
        })
    }

    async fn cancel(&self, _job_id: JobId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn validate(&self, _program_id: ProgramId, _version_id: VersionId) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn analyze_structure(&self, _program_id: ProgramId, _version_id: VersionId, _skip_validation: bool) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }

    async fn supported_languages(&self) -> anyhow::Result<Vec<String>> {
        Ok(vec!["python".to_string(), "rust".to_string()])
    }
}

/// An event publisher that just counts events, for assertions in tests.
#[derive(Default)]
pub struct CountingEventPublisher {
    pub events: Mutex<Vec<SchedulerEvent>>,
}

#[async_trait]
impl EventPublisher for CountingEventPublisher {
    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn publish(&self, event: SchedulerEvent) -> anyhow::Result<()> {
        self.events.lock().expect("event publisher mutex poisoned").push(event);
        Ok(())
    }
}
