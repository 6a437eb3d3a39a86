//! Tiered Execution Scheduler.
//!
//! Admits, classifies, places, and finalizes code-execution jobs across a
//! weighted RAM tier and a slot-based Disk tier, enforcing per-user and
//! per-program concurrency ceilings and guaranteeing every admitted job
//! reaches a terminal state even if the submitting client disconnects.
//! See `scheduler::Scheduler` for the entry point.

pub mod admission;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod events;
pub mod external;
pub mod ids;
pub mod logger;
pub mod mocks;
pub mod persistence;
pub mod pools;
pub mod queue;
pub mod sanitizer;
pub mod scheduler;
pub mod sweeper;
pub mod validator;

pub use error::{Error, Result};
pub use scheduler::{Scheduler, Viewer};
