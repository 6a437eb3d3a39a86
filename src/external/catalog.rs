//! User/program/version catalog interface (§6 "User/program/version
//! catalog").

use async_trait::async_trait;

use crate::ids::{ProgramId, UserId, VersionId};

/// Access level a caller may hold on a program, from weakest to strongest
/// (§4.6 "direct Execute/Write/Admin access").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    Execute,
    Write,
    Admin,
}

/// Program/version/user metadata and permission lookups. Resolved once per
/// admission attempt by the admission controller (C6).
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn program_exists(&self, program_id: ProgramId) -> anyhow::Result<bool>;

    async fn version_exists(&self, program_id: ProgramId, version_id: VersionId) -> anyhow::Result<bool>;

    async fn is_version_eligible(&self, program_id: ProgramId, version_id: VersionId) -> anyhow::Result<bool>;

    async fn latest_version(&self, program_id: ProgramId) -> anyhow::Result<Option<VersionId>>;

    async fn is_program_public(&self, program_id: ProgramId) -> anyhow::Result<bool>;

    /// Direct access the user holds on the program, if any.
    async fn direct_access(&self, user_id: UserId, program_id: ProgramId) -> anyhow::Result<Option<AccessLevel>>;

    /// Best access level granted transitively through any group the user
    /// belongs to, if any.
    async fn group_access(&self, user_id: UserId, program_id: ProgramId) -> anyhow::Result<Option<AccessLevel>>;
}
