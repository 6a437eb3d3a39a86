//! Admission Controller (C6, §4.6).
//!
//! Runs synchronously before the dispatcher (C5) ever sees a submission:
//! resolves and authorizes program/version access, enforces the per-user
//! and per-program concurrency ceilings, and validates requested resource
//! limits against absolute ceilings. Grounded on the teacher's
//! `vrm_manager.rs` init-time checks, turned from panics into rejected
//! submissions.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::domain::job::JobStatus;
use crate::domain::submission::Submission;
use crate::error::{Error, Result};
use crate::external::catalog::{AccessLevel, Catalog};
use crate::external::record_store::JobRecordStore;

pub struct AdmissionController {
    catalog: Arc<dyn Catalog>,
    record_store: Arc<dyn JobRecordStore>,
}

impl AdmissionController {
    pub fn new(catalog: Arc<dyn Catalog>, record_store: Arc<dyn JobRecordStore>) -> Self {
        AdmissionController { catalog, record_store }
    }

    /// Runs every check in §4.6's order, returning the first failure.
    pub async fn check(&self, submission: &Submission, config: &SchedulerConfig, cancel: &CancellationToken) -> Result<()> {
        self.check_eligibility(submission).await?;
        self.check_user_concurrency(submission, config, cancel).await?;
        self.check_program_concurrency(submission, config, cancel).await?;
        self.check_resource_limits(submission, config)?;
        Ok(())
    }

    /// Existence and permission checks only, without the running-job
    /// concurrency ceilings. `schedule_execution` (§6) stores a record
    /// immediately but is "admitted at trigger time" — the caller still
    /// shouldn't be able to schedule a job for a program they can't
    /// execute, so this subset runs at schedule time and the full `check`
    /// (concurrency included) reruns at `Scheduler::trigger_scheduled`.
    pub async fn check_eligibility(&self, submission: &Submission) -> Result<()> {
        self.check_program_and_version(submission).await?;
        self.check_authorization(submission).await?;
        Ok(())
    }

    async fn check_program_and_version(&self, submission: &Submission) -> Result<()> {
        let program_exists = self
            .catalog
            .program_exists(submission.program_id)
            .await
            .map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?;
        if !program_exists {
            return Err(Error::ProgramNotFound(submission.program_id));
        }

        let version_exists = self
            .catalog
            .version_exists(submission.program_id, submission.version_id)
            .await
            .map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?;
        let eligible = version_exists
            && self
                .catalog
                .is_version_eligible(submission.program_id, submission.version_id)
                .await
                .map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?;

        if !eligible {
            return Err(Error::VersionNotFound(submission.version_id, submission.program_id));
        }

        Ok(())
    }

    async fn check_authorization(&self, submission: &Submission) -> Result<()> {
        if self
            .catalog
            .is_program_public(submission.program_id)
            .await
            .map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?
        {
            return Ok(());
        }

        let direct = self
            .catalog
            .direct_access(submission.user_id, submission.program_id)
            .await
            .map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?;
        if direct.map_or(false, |level| level >= AccessLevel::Execute) {
            return Ok(());
        }

        let via_group = self
            .catalog
            .group_access(submission.user_id, submission.program_id)
            .await
            .map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?;
        if via_group.map_or(false, |level| level >= AccessLevel::Execute) {
            return Ok(());
        }

        Err(Error::PermissionDenied(submission.user_id, submission.program_id))
    }

    async fn check_user_concurrency(&self, submission: &Submission, config: &SchedulerConfig, cancel: &CancellationToken) -> Result<()> {
        let running = self
            .record_store
            .list_by_user(submission.user_id, cancel)
            .await
            .map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?
            .into_iter()
            .filter(|record| record.status == JobStatus::Running)
            .count() as u32;

        if running >= config.max_concurrent_executions_per_user {
            return Err(Error::UserLimitExceeded(submission.user_id, config.max_concurrent_executions_per_user));
        }

        Ok(())
    }

    async fn check_program_concurrency(&self, submission: &Submission, config: &SchedulerConfig, cancel: &CancellationToken) -> Result<()> {
        let running = self
            .record_store
            .list_by_program(submission.program_id, cancel)
            .await
            .map_err(|e| Error::CollaboratorUnavailable(e.to_string()))?
            .into_iter()
            .filter(|record| record.status == JobStatus::Running)
            .count() as u32;

        if running >= config.max_concurrent_executions_per_program {
            return Err(Error::ProgramLimitExceeded(submission.program_id, config.max_concurrent_executions_per_program));
        }

        Ok(())
    }

    fn check_resource_limits(&self, submission: &Submission, config: &SchedulerConfig) -> Result<()> {
        if let Some(requested_mb) = submission.resource_limits.max_memory_mb {
            if requested_mb > config.max_allowed_memory_mb {
                return Err(Error::MemoryLimitExceeded { requested_mb, ceiling_mb: config.max_allowed_memory_mb });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::config::{DiskPoolConfig, JobProfileConfig, RamPoolConfig, RamPoolFullBehavior, TierSelectionStrategy};
    use crate::domain::profile::Tier;
    use crate::domain::submission::ResourceLimits;
    use crate::external::catalog::AccessLevel;
    use crate::ids::Id;
    use crate::mocks::{InMemoryRecordStore, PermissiveCatalog};

    fn test_config() -> SchedulerConfig {
        let mut job_profiles = HashMap::new();
        job_profiles.insert("standard".to_string(), JobProfileConfig { preferred_tier: Tier::Ram, ram_capacity_cost_gb: 0.5 });

        SchedulerConfig {
            enable_tiered_execution: true,
            ram_pool: RamPoolConfig { total_capacity_gb: 2.0, max_concurrent_jobs: 4 },
            disk_pool: DiskPoolConfig { max_concurrent_jobs: 2 },
            tier_selection_strategy: TierSelectionStrategy {
                fallback_to_disk: true,
                ram_pool_full_behavior: RamPoolFullBehavior::Queue,
                max_queue_depth: 2,
                queue_timeout_minutes: 1,
            },
            job_profiles,
            default_job_profile: "standard".to_string(),
            default_max_cpu_percentage: 100.0,
            default_max_memory_mb: 512,
            default_max_disk_mb: 1024,
            default_max_execution_time_minutes: 30,
            default_max_concurrent_executions: 4,
            max_concurrent_executions: 64,
            max_concurrent_executions_per_user: 1,
            max_concurrent_executions_per_program: 1,
            max_allowed_memory_mb: 1024,
            max_allowed_execution_time_minutes: 120,
            stale_reservation_max_age: std::time::Duration::from_secs(600),
            sweeper_interval: std::time::Duration::from_secs(30),
        }
    }

    fn test_submission() -> Submission {
        Submission {
            program_id: Id::generate(),
            version_id: Id::generate(),
            user_id: Id::generate(),
            parameters: json!({}),
            environment: json!({}),
            resource_limits: ResourceLimits::default(),
            save_results: true,
            job_profile: None,
        }
    }

    /// A catalog that always denies authorization, for the permission-denied path.
    struct PrivateCatalog;

    #[async_trait]
    impl Catalog for PrivateCatalog {
        async fn program_exists(&self, _program_id: crate::ids::ProgramId) -> anyhow::Result<bool> {
            Ok(true)
        }
        async fn version_exists(&self, _program_id: crate::ids::ProgramId, _version_id: crate::ids::VersionId) -> anyhow::Result<bool> {
            Ok(true)
        }
        async fn is_version_eligible(&self, _program_id: crate::ids::ProgramId, _version_id: crate::ids::VersionId) -> anyhow::Result<bool> {
            Ok(true)
        }
        async fn latest_version(&self, _program_id: crate::ids::ProgramId) -> anyhow::Result<Option<crate::ids::VersionId>> {
            Ok(Some(Id::generate()))
        }
        async fn is_program_public(&self, _program_id: crate::ids::ProgramId) -> anyhow::Result<bool> {
            Ok(false)
        }
        async fn direct_access(&self, _user_id: crate::ids::UserId, _program_id: crate::ids::ProgramId) -> anyhow::Result<Option<AccessLevel>> {
            Ok(None)
        }
        async fn group_access(&self, _user_id: crate::ids::UserId, _program_id: crate::ids::ProgramId) -> anyhow::Result<Option<AccessLevel>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn check_passes_for_a_fresh_permissive_submission() {
        let controller = AdmissionController::new(Arc::new(PermissiveCatalog), Arc::new(InMemoryRecordStore::new()));
        let config = test_config();
        let cancel = CancellationToken::new();

        controller.check(&test_submission(), &config, &cancel).await.expect("permissive submission should be admitted");
    }

    #[tokio::test]
    async fn check_rejects_when_program_is_private_and_unauthorized() {
        let controller = AdmissionController::new(Arc::new(PrivateCatalog), Arc::new(InMemoryRecordStore::new()));
        let config = test_config();
        let cancel = CancellationToken::new();

        let err = controller.check(&test_submission(), &config, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_, _)));
    }

    #[tokio::test]
    async fn check_rejects_when_requested_memory_exceeds_the_ceiling() {
        let controller = AdmissionController::new(Arc::new(PermissiveCatalog), Arc::new(InMemoryRecordStore::new()));
        let config = test_config();
        let cancel = CancellationToken::new();

        let mut submission = test_submission();
        submission.resource_limits.max_memory_mb = Some(config.max_allowed_memory_mb + 1);

        let err = controller.check(&submission, &config, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::MemoryLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn check_eligibility_skips_the_concurrency_ceilings() {
        // A user already at their concurrency ceiling would fail the full
        // `check`, but `check_eligibility` (used by `schedule_execution`)
        // only verifies existence and authorization.
        let record_store = Arc::new(InMemoryRecordStore::new());
        let controller = AdmissionController::new(Arc::new(PermissiveCatalog), record_store);

        controller.check_eligibility(&test_submission()).await.expect("eligibility-only check should pass regardless of concurrency");
    }
}
