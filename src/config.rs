//! Scheduler configuration (§6 "Configuration (enumerated)").
//!
//! Mirrors the teacher's DTO layer (`api/*_dto.rs`): plain serde structs at
//! the boundary, converted into validated domain values through
//! `TryFrom`/`from_dto`-style associated functions rather than being used
//! directly everywhere.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::profile::{JobProfile, Tier};

fn default_fallback_to_disk() -> bool {
    true
}
fn default_max_queue_depth() -> u32 {
    32
}
fn default_queue_timeout_minutes() -> u32 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RamPoolFullBehavior {
    Queue,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RamPoolConfig {
    pub total_capacity_gb: f64,
    pub max_concurrent_jobs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskPoolConfig {
    pub max_concurrent_jobs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSelectionStrategy {
    #[serde(default = "default_fallback_to_disk")]
    pub fallback_to_disk: bool,
    pub ram_pool_full_behavior: RamPoolFullBehavior,
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: u32,
    #[serde(default = "default_queue_timeout_minutes")]
    pub queue_timeout_minutes: u32,
}

impl TierSelectionStrategy {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.queue_timeout_minutes) * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProfileConfig {
    pub preferred_tier: Tier,
    pub ram_capacity_cost_gb: f64,
}

/// Top-level scheduler configuration, deserialized from the operator's
/// configuration source and validated once at construction time (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enable_tiered_execution: bool,
    pub ram_pool: RamPoolConfig,
    pub disk_pool: DiskPoolConfig,
    pub tier_selection_strategy: TierSelectionStrategy,
    pub job_profiles: HashMap<String, JobProfileConfig>,
    pub default_job_profile: String,

    pub default_max_cpu_percentage: f64,
    pub default_max_memory_mb: u64,
    pub default_max_disk_mb: u64,
    pub default_max_execution_time_minutes: u32,
    pub default_max_concurrent_executions: u32,

    pub max_concurrent_executions: u32,
    pub max_concurrent_executions_per_user: u32,
    pub max_concurrent_executions_per_program: u32,

    pub max_allowed_memory_mb: u64,
    pub max_allowed_execution_time_minutes: u32,

    pub stale_reservation_max_age: Duration,
    pub sweeper_interval: Duration,
}

impl SchedulerConfig {
    /// RAM pool capacity expressed in MB, the unit the weighted gate (C2)
    /// actually counts in.
    pub fn ram_capacity_mb(&self) -> i64 {
        (self.ram_pool.total_capacity_gb * 1024.0).round() as i64
    }

    /// Resolves a profile by name, falling back to `default_job_profile`
    /// with a warning when the name is unknown (§4.5 "Classification").
    pub fn resolve_profile(&self, requested: Option<&str>) -> (String, JobProfile) {
        let name = requested.unwrap_or(&self.default_job_profile);

        if let Some(cfg) = self.job_profiles.get(name) {
            return (name.to_string(), JobProfile::from_config(name, cfg));
        }

        log::warn!("job profile '{}' is unknown, falling back to default profile '{}'", name, self.default_job_profile);

        match self.job_profiles.get(&self.default_job_profile) {
            Some(cfg) => (self.default_job_profile.clone(), JobProfile::from_config(&self.default_job_profile, cfg)),
            None => panic!("default job profile '{}' is not present in job_profiles", self.default_job_profile),
        }
    }

    pub fn profiles(&self) -> impl Iterator<Item = (&str, JobProfile)> {
        self.job_profiles.iter().map(|(name, cfg)| (name.as_str(), JobProfile::from_config(name, cfg)))
    }
}
