//! Startup validator (§4.10, part of C2/C5).
//!
//! Runs once at scheduler construction so misconfigurations that would
//! otherwise only manifest under load (an unreachable profile, a pool too
//! small for its cheapest job) surface immediately. Grounded on the
//! teacher's `vrm_manager.rs` init-time panics/logs, downgraded here to
//! warnings everywhere except the one invariant that can never be
//! satisfied at runtime.

use crate::config::SchedulerConfig;
use crate::domain::profile::Tier;

/// Validates `config` and logs every finding. Panics only when RAM
/// capacity cannot fit even the cheapest RAM-tier profile, since no job
/// could ever be admitted under that configuration (§4.10 "assert
/// `RAM.total_capacity_gb >= min_profile_cost_gb`").
pub fn validate(config: &SchedulerConfig) {
    if !config.enable_tiered_execution {
        log::info!("tiered execution is disabled; all jobs run under Tier::Standard with no reservation");
        return;
    }

    let ram_capacity_mb = config.ram_capacity_mb();

    let ram_profile_costs: Vec<(String, i64)> =
        config.profiles().filter(|(_, profile)| profile.preferred_tier == Tier::Ram).map(|(name, profile)| (name.to_string(), profile.ram_cost_mb())).collect();

    if let Some(min_cost_mb) = ram_profile_costs.iter().map(|(_, cost)| *cost).min() {
        if min_cost_mb > ram_capacity_mb {
            panic!(
                "RAM pool capacity ({ram_capacity_mb} MB) is smaller than the cheapest RAM-tier job profile's cost ({min_cost_mb} MB); no RAM job could ever be admitted"
            );
        }

        let max_concurrent_small_jobs = (ram_capacity_mb / min_cost_mb).min(i64::from(config.ram_pool.max_concurrent_jobs));
        log::info!("RAM pool theoretical max concurrent small jobs: {max_concurrent_small_jobs} (capacity {ram_capacity_mb} MB / cheapest profile {min_cost_mb} MB, capped by max_concurrent_jobs)");
    }

    for (name, cost_mb) in &ram_profile_costs {
        if *cost_mb > ram_capacity_mb {
            log::warn!("job profile '{name}' costs {cost_mb} MB, which exceeds total RAM pool capacity ({ram_capacity_mb} MB); this profile can never run on the RAM tier and must fall back to Disk or be rejected");
        }
    }

    match config.tier_selection_strategy.ram_pool_full_behavior {
        crate::config::RamPoolFullBehavior::Queue => {
            log::info!("RAM pool full behavior: queue (max depth {}, timeout {} min)", config.tier_selection_strategy.max_queue_depth, config.tier_selection_strategy.queue_timeout_minutes);
        }
        crate::config::RamPoolFullBehavior::Reject => {
            log::info!("RAM pool full behavior: reject immediately, no queueing");
        }
    }
}
