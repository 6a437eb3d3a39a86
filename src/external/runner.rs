//! Runner interface (C6 dependency, §4.5 "Execution", §6 "Runner").

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::domain::job::ResourceUsage;
use crate::domain::profile::Tier;
use crate::ids::{JobId, ProgramId, UserId, VersionId};

/// What the dispatcher hands the runner once admission has produced a
/// reservation (or decided on `Tier::Standard`).
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub job_id: JobId,
    pub program_id: ProgramId,
    pub version_id: VersionId,
    pub user_id: UserId,
    pub tier: Tier,
    pub job_profile: String,
    pub parameters: Value,
    pub environment: Value,
    /// Whether the caller wants produced artifacts persisted (§6 "Submit":
    /// `save-results`). The scheduler itself does not manage filesystems or
    /// artifact storage (§1 Non-goals), so this is forwarded to the runner
    /// as-is rather than acted on here.
    pub save_results: bool,
}

/// What the runner reports back once `execute` returns (§6 signature:
/// `{success, exit_code, stdout, stderr, output_paths, resource_usage,
/// completed_at, duration}`).
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub output_paths: Vec<String>,
    pub resource_usage: ResourceUsage,
    pub completed_at: DateTime<Utc>,
    pub duration: Duration,
}

/// The execution backend. `execute` may suspend indefinitely; `cancel`
/// signals the job-specific cancellation source the dispatcher passed in,
/// not the submitter's own handle (§4.5 "NOT the submitter's handle").
#[async_trait]
pub trait Runner: Send + Sync {
    async fn execute(&self, request: RunRequest, cancel: CancellationToken) -> anyhow::Result<RunOutcome>;

    async fn cancel(&self, job_id: JobId) -> anyhow::Result<()>;

    async fn validate(&self, program_id: ProgramId, version_id: VersionId) -> anyhow::Result<bool>;

    async fn analyze_structure(&self, program_id: ProgramId, version_id: VersionId, skip_validation: bool) -> anyhow::Result<Value>;

    async fn supported_languages(&self) -> anyhow::Result<Vec<String>>;
}
