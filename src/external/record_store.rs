//! Job Record Store adapter interface (C1, §4.1, §6).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::job::{JobRecord, JobStatus, ResourceUsage};
use crate::ids::{JobId, ProgramId, UserId, VersionId};

/// The durable store a concrete deployment plugs in (a database, a file, an
/// in-memory map for tests). Every operation takes a cancellation token
/// because the caller may be running under either the submitter's scope or
/// the independent finalization scope (§5).
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    async fn create(&self, record: JobRecord, cancel: &CancellationToken) -> anyhow::Result<JobId>;

    async fn get(&self, job_id: JobId, cancel: &CancellationToken) -> anyhow::Result<Option<JobRecord>>;

    async fn update(&self, record: JobRecord, cancel: &CancellationToken) -> anyhow::Result<()>;

    async fn update_status(&self, job_id: JobId, status: JobStatus, cancel: &CancellationToken) -> anyhow::Result<()>;

    /// A narrower write covering only the result fields, without the
    /// terminal status itself. The dispatcher's own finalization path uses
    /// `update` instead, since it always has the authoritative status
    /// (`Completed`/`Failed`/`Stopped`) in hand and a single write is
    /// simpler than sequencing `complete` with a follow-up `update_status`;
    /// this method exists for collaborators (e.g. a results-only admin
    /// endpoint) that want to attach output without touching status.
    async fn complete(
        &self,
        job_id: JobId,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        output_paths: Vec<String>,
        error_message: Option<String>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()>;

    async fn update_resource_usage(&self, job_id: JobId, usage: ResourceUsage, cancel: &CancellationToken) -> anyhow::Result<()>;

    async fn list_by_program(&self, program_id: ProgramId, cancel: &CancellationToken) -> anyhow::Result<Vec<JobRecord>>;

    async fn list_by_version(&self, version_id: VersionId, cancel: &CancellationToken) -> anyhow::Result<Vec<JobRecord>>;

    async fn list_by_user(&self, user_id: UserId, cancel: &CancellationToken) -> anyhow::Result<Vec<JobRecord>>;

    async fn list_by_status(&self, status: JobStatus, cancel: &CancellationToken) -> anyhow::Result<Vec<JobRecord>>;

    /// Most recently created records, newest first, capped at `limit`
    /// (§6 "get_recent_executions(n, viewer)"). Filtering by viewer
    /// ownership is the caller's responsibility (`Scheduler::get_recent_executions`).
    async fn list_recent(&self, limit: usize, cancel: &CancellationToken) -> anyhow::Result<Vec<JobRecord>>;

    async fn cleanup_older_than(&self, age: chrono::Duration, cancel: &CancellationToken) -> anyhow::Result<u64>;

    async fn exists(&self, job_id: JobId, cancel: &CancellationToken) -> anyhow::Result<bool>;
}
