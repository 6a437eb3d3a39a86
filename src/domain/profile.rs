//! Job profiles and tiers (§3 "Job Profile (configuration)").

use serde::{Deserialize, Serialize};

use crate::config::JobProfileConfig;

/// An admission class — `RAM` (weighted by GB cost) or `Disk` (slot-counted).
/// `Standard` denotes the non-tiered bypass mode used when tiered execution
/// is disabled entirely (§4.5 "Classification").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Ram,
    Disk,
    Standard,
}

/// A named classification that maps a submission to a preferred tier and an
/// associated RAM cost.
#[derive(Debug, Clone, PartialEq)]
pub struct JobProfile {
    pub name: String,
    pub preferred_tier: Tier,
    pub ram_capacity_cost_gb: f64,
}

impl JobProfile {
    pub(crate) fn from_config(name: &str, cfg: &JobProfileConfig) -> Self {
        JobProfile { name: name.to_string(), preferred_tier: cfg.preferred_tier, ram_capacity_cost_gb: cfg.ram_capacity_cost_gb }
    }

    /// RAM cost in whole MB (§4.5 step 1: `profile.RamCapacityCostGB × 1024 MB`).
    pub fn ram_cost_mb(&self) -> i64 {
        (self.ram_capacity_cost_gb * 1024.0).round() as i64
    }
}
