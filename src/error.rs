//! Admission-time error kinds (§7).
//!
//! Once a job has a live reservation, failures are folded into job-record
//! status transitions instead of being returned here — see `dispatcher.rs`.

use thiserror::Error;

use crate::ids::{JobId, ProgramId, UserId, VersionId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("job {0:?} was not found")]
    JobNotFound(JobId),

    #[error("program {0:?} was not found")]
    ProgramNotFound(ProgramId),

    #[error("version {0:?} of program {1:?} was not found or is not eligible for execution")]
    VersionNotFound(VersionId, ProgramId),

    #[error("user {0:?} does not have execute access to program {1:?}")]
    PermissionDenied(UserId, ProgramId),

    #[error("user {0:?} has reached the concurrent-execution limit ({1})")]
    UserLimitExceeded(UserId, u32),

    #[error("program {0:?} has reached the concurrent-execution limit ({1})")]
    ProgramLimitExceeded(ProgramId, u32),

    #[error("requested memory {requested_mb} MB exceeds the allowed ceiling of {ceiling_mb} MB")]
    MemoryLimitExceeded { requested_mb: u64, ceiling_mb: u64 },

    #[error("job {0:?} is not in a state that allows this operation")]
    InvalidJobState(JobId),

    #[error("external collaborator call failed during admission: {0}")]
    CollaboratorUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
