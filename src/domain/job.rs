//! The durable Job Record (§3) and its lifecycle (§4.5 "State machine").
//!
//! Grounded on the teacher's `ReservationBase`/`ReservationState`
//! (`domain/vrm_system_model/reservation/reservation.rs`): a plain data
//! struct carrying identity, timing and state, plus a small enum ordered
//! by commitment level. Here the enum instead models the terminal/non
//! terminal split the spec cares about (invariant 1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::profile::Tier;
use crate::ids::{JobId, ProgramId, UserId, VersionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionKind {
    ProjectExecution,
    WebAppDeploy,
    ScheduledExecution,
}

/// Wire status vocabulary (§6 "Status vocabulary").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Scheduled,
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
    Cancelled,
}

impl JobStatus {
    /// Invariant 1: exactly one terminal status per job.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped | JobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_seconds: f64,
    pub peak_memory_bytes: u64,
    pub disk_bytes_used: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub output_paths: Vec<String>,
    pub web_app_url: Option<String>,
    pub error_message: Option<String>,
}

/// The durable record tracked by the external record store (C1) and
/// mutated only by the dispatcher (C5) and the sweeper (C8, resource
/// fields excepted — the sweeper never touches the record, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub program_id: ProgramId,
    pub version_id: VersionId,
    pub user_id: UserId,

    pub execution_kind: ExecutionKind,
    pub job_profile: String,
    pub tier: Option<Tier>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub status: JobStatus,

    /// Sanitized configuration payload (C9); never the raw submission.
    pub parameters: Value,

    pub result: JobResult,
    pub resource_usage: ResourceUsage,
}

impl JobRecord {
    /// Invariant 2: `started-at ≤ completed-at` when both are set.
    pub fn timing_is_consistent(&self) -> bool {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }
}
