//! Consumed interfaces (§6 "Consumed interfaces").
//!
//! Every collaborator the scheduler depends on but does not own — the
//! durable record store, the user/program/version catalog, the runner, and
//! the event stream — is expressed as an `async_trait` object, the same
//! collaborator-as-trait-object shape the teacher's workflow scheduler uses
//! to stay decoupled from a concrete grid backend. Failures from these
//! collaborators are arbitrary external conditions, not admission-time
//! domain errors, so they're reported as `anyhow::Error` rather than folded
//! into `crate::error::Error`.
//!
//! §6 also names an artifact store (file listing/fetch/output writes) as a
//! consumed interface, but nothing in the scheduler core ever calls it: the
//! runner owns the sandbox filesystem and artifact persistence (§1
//! Non-goals — "does not manage container images or filesystems"), and
//! `save-results` (the only submission field that would have driven it) is
//! forwarded straight into `RunRequest` so the runner can act on it. An
//! unimplemented trait object with no caller is worse than no trait object,
//! so it isn't modeled here.

pub mod catalog;
pub mod event_stream;
pub mod record_store;
pub mod runner;

pub use catalog::Catalog;
pub use event_stream::{EventPublisher, SchedulerEvent};
pub use record_store::JobRecordStore;
pub use runner::{RunOutcome, RunRequest, Runner};
