//! Tier Resolver
//!
//! Translates a hardware profile and optional user configuration into an
//! immutable `InstallPlan`.
//!
//! # Threshold ladder
//!
//! | ram_gb   | tier        |
//! |----------|-------------|
//! | < 8      | minimal     |
//! | 8 – 15   | basic       |
//! | 16 – 31  | standard    |
//! | ≥ 32     | performance |
//!
//! This table is the only place RAM thresholds live. Every other RAM check
//! (the large-artifact gate, the exchange file's recommended tier) derives
//! from it.
//!
//! # Precedence
//!
//! 1. Explicit tier in user config overrides the RAM-derived tier
//! 2. Explicit feature flags override the defaults
//! 3. Absent fields fall back to the defaults
//! 4. No user config at all: RAM-derived tier and the default feature set
//!
//! GPU type never affects the tier, only whether image generation is
//! advertised as available.

use crate::config_file::InstallConfig;
use crate::error::{ProvisionError, Result};
use crate::hardware::HardwareProfile;
use crate::types::{Feature, Tier};
use std::collections::BTreeMap;
use std::fmt;
use strum::IntoEnumIterator;

// ============================================================================
// Threshold table
// ============================================================================

/// Lower RAM bound (inclusive, in GB) for each tier above minimal
const TIER_THRESHOLDS: [(Tier, u64); 3] = [
    (Tier::Performance, 32),
    (Tier::Standard, 16),
    (Tier::Basic, 8),
];

/// Lowest RAM that maps to `tier`
pub const fn min_ram_for(tier: Tier) -> u64 {
    match tier {
        Tier::Minimal => 0,
        Tier::Basic => TIER_THRESHOLDS[2].1,
        Tier::Standard => TIER_THRESHOLDS[1].1,
        Tier::Performance => TIER_THRESHOLDS[0].1,
    }
}

/// RAM needed before the largest artifacts are fetched, on top of the
/// performance tier itself.
pub const LARGE_ARTIFACT_MIN_RAM_GB: u64 = 2 * min_ram_for(Tier::Performance);

/// Map installed RAM to a tier.
pub fn tier_for_ram(ram_gb: u64) -> Tier {
    TIER_THRESHOLDS
        .iter()
        .find(|(_, min)| ram_gb >= *min)
        .map(|(tier, _)| *tier)
        .unwrap_or(Tier::Minimal)
}

// ============================================================================
// Install plan
// ============================================================================

/// Where the plan's tier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierSource {
    Hardware,
    UserConfig,
}

impl fmt::Display for TierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware => write!(f, "hardware"),
            Self::UserConfig => write!(f, "user config"),
        }
    }
}

/// The resolved plan. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub tier: Tier,
    /// Every feature has an entry
    pub feature_flags: BTreeMap<Feature, bool>,
    /// A GPU was detected, so image generation is advertised
    pub image_gen_available: bool,
    /// Secondary gate for the largest artifacts
    pub large_artifacts: bool,
    pub tier_source: TierSource,
}

impl InstallPlan {
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.feature_flags.get(&feature).copied().unwrap_or(false)
    }

    /// Enabled features in declaration order
    pub fn enabled_features(&self) -> Vec<Feature> {
        Feature::iter().filter(|f| self.is_enabled(*f)).collect()
    }
}

impl fmt::Display for InstallPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tier:            {} (from {})", self.tier, self.tier_source)?;
        for (feature, enabled) in &self.feature_flags {
            writeln!(f, "  {:<20} {}", feature.to_string(), if *enabled { "on" } else { "off" })?;
        }
        writeln!(f, "image gen avail: {}", self.image_gen_available)?;
        write!(f, "large artifacts: {}", self.large_artifacts)
    }
}

/// Default feature set
pub fn default_feature_flags() -> BTreeMap<Feature, bool> {
    Feature::iter().map(|f| (f, f.default_enabled())).collect()
}

/// Resolve a plan from a profile and optional user configuration.
///
/// # Errors
///
/// `Configuration` when the architecture is unknown; no plan exists for it.
pub fn resolve(profile: &HardwareProfile, user: Option<&InstallConfig>) -> Result<InstallPlan> {
    if !profile.architecture.is_supported() {
        return Err(ProvisionError::configuration(format!(
            "no install plan exists for architecture '{}'",
            profile.architecture
        )));
    }

    let hardware_tier = tier_for_ram(profile.ram_gb);
    let (tier, tier_source) = match user.and_then(|c| c.tier) {
        Some(tier) => (tier, TierSource::UserConfig),
        None => (hardware_tier, TierSource::Hardware),
    };

    let mut feature_flags = default_feature_flags();
    if let Some(config) = user {
        for (feature, enabled) in &config.features {
            feature_flags.insert(*feature, *enabled);
        }
    }

    let image_gen_available = profile.gpu_type.is_accelerated();
    if feature_flags[&Feature::OptionalImageGen] && !image_gen_available {
        tracing::warn!("Image generation enabled without a detected GPU; it will run on CPU");
    }

    let large_artifacts = tier == Tier::Performance && profile.ram_gb >= LARGE_ARTIFACT_MIN_RAM_GB;

    tracing::debug!(
        "Resolved tier {} from {} (hardware recommends {})",
        tier,
        tier_source,
        hardware_tier
    );

    Ok(InstallPlan {
        tier,
        feature_flags,
        image_gen_available,
        large_artifacts,
        tier_source,
    })
}
