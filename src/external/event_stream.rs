//! Live Event Publisher interface (C7, §4.7, §6 "Event stream (optional)").

use async_trait::async_trait;

use crate::ids::{JobId, UserId};

/// An event keyed by job id and user id (§4.7). The scheduler never waits
/// on publication (§5 "Suspension points" (d)); callers of `EventPublisher`
/// methods always treat an `Err` as a log-and-forget warning.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    ExecutionStarted { job_id: JobId, user_id: UserId },
    StatusChanged { job_id: JobId, user_id: UserId, status: crate::domain::job::JobStatus },
    ExecutionCompleted { job_id: JobId, user_id: UserId, success: bool },
}

/// An optional best-effort sink for scheduler lifecycle events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn start(&self) -> anyhow::Result<()>;

    async fn publish(&self, event: SchedulerEvent) -> anyhow::Result<()>;
}
