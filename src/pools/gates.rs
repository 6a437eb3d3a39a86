use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::profile::Tier;
use crate::domain::reservation::Reservation;
use crate::ids::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired,
    InsufficientCapacity,
    ConcurrencyLimitReached,
}

#[derive(Debug, Clone, Copy)]
pub struct PoolSnapshot {
    pub ram_capacity_mb: i64,
    pub ram_available_mb: i64,
    pub ram_reservation_count: u32,
    pub ram_max_concurrent: u32,
    pub disk_active: u32,
    pub disk_max_concurrent: u32,
}

struct Inner {
    ram_capacity_mb: i64,
    ram_available_mb: i64,
    ram_max_concurrent: u32,
    disk_max_concurrent: u32,
    disk_active: u32,
    reservations: HashMap<JobId, Reservation>,
}

/// The two admission gates (§4.2) and the reservation registry (§4.3),
/// guarded by a single lock per the design notes (§9). Every method here
/// is a non-blocking, O(1) critical section: acquisition is attempted once
/// and never waits on capacity (§5 "Acquisition never waits on pool
/// capacity").
#[derive(Clone)]
pub struct ResourcePools {
    inner: std::sync::Arc<Mutex<Inner>>,
}

impl ResourcePools {
    pub fn new(ram_capacity_mb: i64, ram_max_concurrent: u32, disk_max_concurrent: u32) -> Self {
        ResourcePools {
            inner: std::sync::Arc::new(Mutex::new(Inner {
                ram_capacity_mb,
                ram_available_mb: ram_capacity_mb,
                ram_max_concurrent,
                disk_max_concurrent,
                disk_active: 0,
                reservations: HashMap::new(),
            })),
        }
    }

    /// Weighted capacity gate (§4.2 "Weighted capacity gate (RAM)").
    pub fn try_acquire_ram(&self, job_id: JobId, cost_mb: i64) -> AcquireOutcome {
        let mut guard = self.inner.lock().expect("resource pool mutex poisoned");

        let ram_count = guard.reservations.values().filter(|r| r.tier == Tier::Ram).count() as u32;
        if ram_count >= guard.ram_max_concurrent {
            return AcquireOutcome::ConcurrencyLimitReached;
        }
        if guard.ram_available_mb < cost_mb {
            return AcquireOutcome::InsufficientCapacity;
        }

        guard.ram_available_mb -= cost_mb;
        guard.reservations.insert(job_id, Reservation { job_id, tier: Tier::Ram, ram_cost_mb: cost_mb, reserved_at: Instant::now() });
        AcquireOutcome::Acquired
    }

    /// Slot gate (§4.2 "Slot gate (Disk)").
    pub fn try_acquire_disk(&self, job_id: JobId) -> AcquireOutcome {
        let mut guard = self.inner.lock().expect("resource pool mutex poisoned");

        if guard.disk_active >= guard.disk_max_concurrent {
            return AcquireOutcome::ConcurrencyLimitReached;
        }

        guard.disk_active += 1;
        guard.reservations.insert(job_id, Reservation { job_id, tier: Tier::Disk, ram_cost_mb: 0, reserved_at: Instant::now() });
        AcquireOutcome::Acquired
    }

    /// Releases the reservation held for `job_id`, if any. Idempotent:
    /// finalization and the sweeper (C8) may both attempt to release the
    /// same job, so a missing entry is logged and otherwise ignored
    /// (§4.3 "releases MUST be idempotent").
    pub fn release(&self, job_id: JobId) -> bool {
        let mut guard = self.inner.lock().expect("resource pool mutex poisoned");

        let Some(reservation) = guard.reservations.remove(&job_id) else {
            log::warn!("release called for job {:?} with no live reservation (already released)", job_id);
            return false;
        };

        match reservation.tier {
            Tier::Ram => guard.ram_available_mb += reservation.ram_cost_mb,
            Tier::Disk => guard.disk_active = guard.disk_active.saturating_sub(1),
            Tier::Standard => {}
        }

        true
    }

    /// Releases every reservation older than `max_age` (C8, §4.8). Returns
    /// the job ids that were reclaimed, for logging by the caller.
    pub fn sweep_stale(&self, max_age: Duration) -> Vec<JobId> {
        let stale: Vec<JobId> = {
            let guard = self.inner.lock().expect("resource pool mutex poisoned");
            guard.reservations.values().filter(|r| r.age() > max_age).map(|r| r.job_id).collect()
        };

        for job_id in &stale {
            self.release(*job_id);
        }

        stale
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let guard = self.inner.lock().expect("resource pool mutex poisoned");
        let ram_reservation_count = guard.reservations.values().filter(|r| r.tier == Tier::Ram).count() as u32;
        PoolSnapshot {
            ram_capacity_mb: guard.ram_capacity_mb,
            ram_available_mb: guard.ram_available_mb,
            ram_reservation_count,
            ram_max_concurrent: guard.ram_max_concurrent,
            disk_active: guard.disk_active,
            disk_max_concurrent: guard.disk_max_concurrent,
        }
    }

    pub fn has_reservation(&self, job_id: JobId) -> bool {
        self.inner.lock().expect("resource pool mutex poisoned").reservations.contains_key(&job_id)
    }
}
