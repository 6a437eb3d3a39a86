//! Resource Pools (C2) + Reservation Registry (C3), combined under one
//! mutex (§4.2: "a single mutex shared with C3 to eliminate TOCTOU between
//! the availability check and the reservation record"; §5/§9: "a single
//! `SchedulerState` value guarded by one mutex").
//!
//! Grounded on the teacher's single-lock stores (`ResourceStore`,
//! `ReservationStore`): one `RwLock`/`Mutex`-guarded inner struct, thin
//! accessor methods, no lock held across `.await`.

mod gates;

pub use gates::{AcquireOutcome, PoolSnapshot, ResourcePools};
