//! Wait Queue (C4, §4.4).
//!
//! A bounded FIFO of jobs waiting for RAM capacity when the pool is full and
//! `RamPoolFullBehavior::Queue` is configured. Grounded on the teacher's
//! `ReservationSyncGate` wait/notify shape (`domain/vrm_system_model/
//! reservation/reservation_sync_gate.rs`), simplified to a plain
//! mutex-guarded deque since this queue never blocks a task in place —
//! admission polls it, it never awaits inside the lock.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::submission::QueueEntry;

/// FIFO wait queue, bounded at `max_depth` entries (§4.4 "Bounded FIFO").
pub struct WaitQueue {
    max_depth: u32,
    entries: Mutex<VecDeque<QueueEntry>>,
}

impl WaitQueue {
    pub fn new(max_depth: u32) -> Self {
        WaitQueue { max_depth, entries: Mutex::new(VecDeque::new()) }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("wait queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `entry` to the back of the queue unless it's already at
    /// capacity (§4.4 "a submission arriving when the queue is already at
    /// `MaxQueueDepth` is rejected outright, the same as a pool-full
    /// rejection under `Reject` behavior").
    pub fn enqueue(&self, entry: QueueEntry) -> Result<(), QueueEntry> {
        let mut guard = self.entries.lock().expect("wait queue mutex poisoned");
        if guard.len() as u32 >= self.max_depth {
            return Err(entry);
        }
        guard.push_back(entry);
        Ok(())
    }

    /// Puts `entry` back at the head of the queue. Used when a drain
    /// attempt finds the pool still full immediately after popping the
    /// candidate — the candidate keeps its original place in line rather
    /// than losing its spot to entries enqueued after it.
    pub fn requeue_front(&self, entry: QueueEntry) {
        let mut guard = self.entries.lock().expect("wait queue mutex poisoned");
        guard.push_front(entry);
    }

    /// Pops the head of the queue, discarding any entries whose TTL has
    /// expired along the way (§4.4: "if `now − enqueued-at >
    /// QueueTimeoutMinutes` the entry is discarded... `drain_one` proceeds
    /// to the next head"). The caller marks every `expired` entry's job
    /// record `failed` with reason "queue timeout", and retries admission
    /// for `candidate` if present — the queue itself has no knowledge of
    /// job status.
    pub fn drain_one(&self, timeout: Duration) -> DrainOutcome {
        let mut guard = self.entries.lock().expect("wait queue mutex poisoned");

        let mut expired = Vec::new();
        loop {
            match guard.pop_front() {
                None => return DrainOutcome { expired, candidate: None },
                Some(entry) if entry.enqueued_at.elapsed() > timeout => expired.push(entry),
                Some(entry) => return DrainOutcome { expired, candidate: Some(entry) },
            }
        }
    }
}

/// Result of one `drain_one` call: zero or more TTL-expired entries
/// encountered ahead of the first still-live candidate (or queue
/// exhaustion).
pub struct DrainOutcome {
    pub expired: Vec<QueueEntry>,
    pub candidate: Option<QueueEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::{ExecutionKind, JobRecord, JobResult, JobStatus, ResourceUsage};
    use crate::domain::submission::{ResourceLimits, Submission};
    use crate::ids::Id;
    use chrono::Utc;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn entry() -> QueueEntry {
        let program_id = Id::generate();
        let version_id = Id::generate();
        let user_id = Id::generate();
        let record = JobRecord {
            id: Id::generate(),
            program_id,
            version_id,
            user_id,
            execution_kind: ExecutionKind::ProjectExecution,
            job_profile: "default".to_string(),
            tier: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            status: JobStatus::Queued,
            parameters: json!({}),
            result: JobResult::default(),
            resource_usage: ResourceUsage::default(),
        };
        let submission = Submission {
            program_id,
            version_id,
            user_id,
            parameters: json!({}),
            environment: json!({}),
            resource_limits: ResourceLimits { max_cpu_percentage: None, max_memory_mb: None, max_disk_mb: None, max_execution_time_minutes: None },
            save_results: false,
            job_profile: None,
        };
        QueueEntry { record, submission, enqueued_at: std::time::Instant::now(), ram_cost_mb: 512, cancellation: CancellationToken::new() }
    }

    #[test]
    fn enqueue_respects_max_depth() {
        let queue = WaitQueue::new(1);
        assert!(queue.enqueue(entry()).is_ok());
        assert!(queue.enqueue(entry()).is_err());
    }

    #[test]
    fn drain_is_fifo() {
        let queue = WaitQueue::new(4);
        let first = entry();
        let first_id = first.record.id;
        let second = entry();
        let second_id = second.record.id;

        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();

        let one = queue.drain_one(Duration::from_secs(600));
        assert!(one.expired.is_empty());
        assert_eq!(one.candidate.unwrap().record.id, first_id);

        let two = queue.drain_one(Duration::from_secs(600));
        assert_eq!(two.candidate.unwrap().record.id, second_id);

        let empty = queue.drain_one(Duration::from_secs(600));
        assert!(empty.candidate.is_none());
        assert!(empty.expired.is_empty());
    }

    #[test]
    fn drain_one_discards_expired_entries_ahead_of_a_live_candidate() {
        let queue = WaitQueue::new(4);
        queue.enqueue(entry()).unwrap();
        std::thread::sleep(Duration::from_millis(15));
        let live_id = {
            let live = entry();
            let id = live.record.id;
            queue.enqueue(live).unwrap();
            id
        };

        let outcome = queue.drain_one(Duration::from_millis(5));
        assert_eq!(outcome.expired.len(), 1);
        assert_eq!(outcome.candidate.unwrap().record.id, live_id);
        assert!(queue.is_empty());
    }
}
