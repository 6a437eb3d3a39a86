//! The submission payload a caller hands to the admission controller (C6),
//! and the queue entry (§3) that results when admission is deferred.

use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::domain::job::JobRecord;
use crate::ids::{ProgramId, UserId, VersionId};

#[derive(Debug, Clone, Default)]
pub struct ResourceLimits {
    pub max_cpu_percentage: Option<f64>,
    pub max_memory_mb: Option<u64>,
    pub max_disk_mb: Option<u64>,
    pub max_execution_time_minutes: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub program_id: ProgramId,
    pub version_id: VersionId,
    pub user_id: UserId,
    pub parameters: Value,
    pub environment: Value,
    pub resource_limits: ResourceLimits,
    pub save_results: bool,
    pub job_profile: Option<String>,
}

/// The public request payload for `Scheduler::execute_program` /
/// `execute_version` / `deploy_web_app` (§6 "Submit"). `parameters` is
/// sanitized once at the door (C9) and that sanitized value is what both
/// the job record and the runner see — the rationale for sanitizing (§4.9:
/// "callers routinely attach file contents which must instead live in the
/// artifact store") means a runner never legitimately needs the pre-
/// sanitization value back; real source is fetched through the artifact
/// store by program/version id.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub parameters: Value,
    pub environment: Value,
    pub resource_limits: ResourceLimits,
    pub save_results: bool,
    pub job_profile: Option<String>,
}

/// A job awaiting RAM capacity in the wait queue (C4). Only ever holds
/// RAM-preferred jobs (§4.5 step 3), so it carries the RAM cost needed to
/// retry acquisition once capacity is released.
pub struct QueueEntry {
    pub record: JobRecord,
    pub submission: Submission,
    pub enqueued_at: Instant,
    pub ram_cost_mb: i64,
    /// Cancelled when an administrative `stop` reaches a still-queued job.
    pub cancellation: CancellationToken,
}
