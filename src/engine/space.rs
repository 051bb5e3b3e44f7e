//! Space Budget Calculator
//!
//! Computes how much disk an `InstallPlan` needs and gates the run on it.
//!
//! | Component             | GB  |
//! |-----------------------|-----|
//! | base                  | 30  |
//! | tier minimal          | 5   |
//! | tier basic            | 20  |
//! | tier standard         | 45  |
//! | tier performance      | 90  |
//! | wikipedia             | 90  |
//! | books                 | 10  |
//! | desktop               | 8   |
//! | optional_image_gen    | 30  |
//!
//! `docs` and `encryption` have no measurable footprint and are not listed.
//!
//! The check runs exactly once, before any stage. Stages never re-check.

use crate::error::{ProvisionError, Result};
use crate::hardware::HardwareProfile;
use crate::logic::resolver::InstallPlan;
use crate::types::{Feature, Tier};
use std::collections::BTreeMap;
use std::fmt;

pub const BASE_GB: u64 = 30;

pub const fn tier_increment_gb(tier: Tier) -> u64 {
    match tier {
        Tier::Minimal => 5,
        Tier::Basic => 20,
        Tier::Standard => 45,
        Tier::Performance => 90,
    }
}

/// Size of a feature's artifacts, or `None` if it has no listed footprint
pub const fn feature_increment_gb(feature: Feature) -> Option<u64> {
    match feature {
        Feature::Wikipedia => Some(90),
        Feature::Books => Some(10),
        Feature::Desktop => Some(8),
        Feature::OptionalImageGen => Some(30),
        Feature::Docs | Feature::Encryption => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceBudget {
    pub base_gb: u64,
    pub tier_increment_gb: u64,
    /// Only enabled features with a listed footprint appear here
    pub per_feature_increment_gb: BTreeMap<Feature, u64>,
    pub total_required_gb: u64,
}

impl fmt::Display for SpaceBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "base:            {} GB", self.base_gb)?;
        writeln!(f, "tier:            {} GB", self.tier_increment_gb)?;
        for (feature, gb) in &self.per_feature_increment_gb {
            writeln!(f, "  {:<20} {} GB", feature.to_string(), gb)?;
        }
        write!(f, "total required:  {} GB", self.total_required_gb)
    }
}

/// Compute the budget for a plan. Pure.
pub fn budget(plan: &InstallPlan) -> SpaceBudget {
    let tier_increment_gb = tier_increment_gb(plan.tier);
    let per_feature_increment_gb: BTreeMap<Feature, u64> = plan
        .enabled_features()
        .into_iter()
        .filter_map(|f| feature_increment_gb(f).map(|gb| (f, gb)))
        .collect();
    let total_required_gb =
        BASE_GB + tier_increment_gb + per_feature_increment_gb.values().sum::<u64>();

    SpaceBudget {
        base_gb: BASE_GB,
        tier_increment_gb,
        per_feature_increment_gb,
        total_required_gb,
    }
}

/// Fails if and only if the budget exceeds the free space.
pub fn check(budget: &SpaceBudget, profile: &HardwareProfile) -> Result<()> {
    if budget.total_required_gb > profile.disk_available_gb {
        return Err(ProvisionError::Space {
            required_gb: budget.total_required_gb,
            available_gb: profile.disk_available_gb,
        });
    }
    Ok(())
}
