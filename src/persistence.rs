//! Retrying persistence adapter (§4.1, §5 "Retry discipline").
//!
//! Wraps a `JobRecordStore` collaborator with the finalization retry
//! discipline: up to 3 attempts with linear backoff (500 ms · attempt). A
//! full-record write that exhausts its retries falls back to a
//! status-only write; if even that fails, the condition is logged as
//! critical and swallowed — the sweeper (C8) is trusted to reclaim any
//! pool resources a crashed write leaves behind (§5).

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::job::{JobRecord, JobStatus};
use crate::external::record_store::JobRecordStore;
use crate::ids::JobId;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_STEP: Duration = Duration::from_millis(500);

async fn retry<T, F, Fut>(operation_name: &str, mut attempt: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    let mut last_err = None;

    for attempt_number in 1..=MAX_ATTEMPTS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                log::warn!("{operation_name} attempt {attempt_number}/{MAX_ATTEMPTS} failed: {err}");
                last_err = Some(err);
                if attempt_number < MAX_ATTEMPTS {
                    tokio::time::sleep(BACKOFF_STEP * attempt_number).await;
                }
            }
        }
    }

    Err(last_err.expect("at least one attempt was made"))
}

/// Writes the terminal state of a job record with the full retry-then-
/// degrade-then-log discipline. Never returns an error: a caller in the
/// finalization path has nowhere else to send one (§4.1).
pub async fn finalize_record(store: &dyn JobRecordStore, record: &JobRecord, cancel: &CancellationToken) {
    let full_write = retry("finalization record update", || async { store.update(record.clone(), cancel).await }).await;

    if full_write.is_ok() {
        return;
    }

    let job_id = record.id;
    let status = record.status;
    let degraded = retry("finalization status-only update", || async { store.update_status(job_id, status, cancel).await }).await;

    if let Err(err) = degraded {
        log::error!("job {job_id:?} finalization write failed after exhausting full and degraded retries: {err}. pool resources for this job rely on the stale-reservation sweeper");
    }
}

/// Writes a non-finalization status transition with the same retry
/// discipline, logging (never propagating) on exhaustion.
pub async fn write_status(store: &dyn JobRecordStore, job_id: JobId, status: JobStatus, cancel: &CancellationToken) {
    if let Err(err) = retry("status update", || async { store.update_status(job_id, status, cancel).await }).await {
        log::error!("job {job_id:?} status update to {status:?} failed after exhausting retries: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: anyhow::Result<u32> = retry("test op", move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    anyhow::bail!("transient failure");
                }
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: anyhow::Result<()> = retry("test op", move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("permanent failure")
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
