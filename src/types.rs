//! Type-safe domain enums for the orchestrator
//!
//! These replace stringly-typed hardware and plan values with Rust enums
//! that provide compile-time validation and exhaustive matching.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// CPU architecture, normalized from the kernel's reported machine type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
pub enum Architecture {
    #[strum(serialize = "arm64")]
    Arm64,
    #[strum(serialize = "x86_64")]
    X86_64,
    #[default]
    #[strum(serialize = "unknown")]
    Unknown,
}

impl Architecture {
    /// Normalize a `uname -m` style machine string.
    ///
    /// Only two architectures are recognized; everything else is `Unknown`.
    pub fn from_machine(machine: &str) -> Self {
        match machine.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" => Self::X86_64,
            "aarch64" | "arm64" => Self::Arm64,
            _ => Self::Unknown,
        }
    }

    /// Returns true if an install plan exists for this architecture
    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// GPU class of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum GpuType {
    Nvidia,
    Amd,
    Apple,
    #[default]
    Cpu,
}

impl GpuType {
    /// Returns true if a hardware accelerator was detected
    pub fn is_accelerated(self) -> bool {
        !matches!(self, Self::Cpu)
    }
}

/// Named bundle of install scope
///
/// Ordered from smallest to largest so tiers can be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Minimal,
    Basic,
    Standard,
    Performance,
}

/// Optional feature toggles carried by an install plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Wikipedia,
    Encryption,
    Docs,
    Books,
    Desktop,
    OptionalImageGen,
}

impl Feature {
    /// Environment variable that forces this feature on or off
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::Wikipedia => "INSTALL_WIKIPEDIA",
            Self::Encryption => "INSTALL_ENCRYPTION",
            Self::Docs => "INSTALL_DOCS",
            Self::Books => "INSTALL_BOOKS",
            Self::Desktop => "INSTALL_DESKTOP",
            Self::OptionalImageGen => "INSTALL_COMFYUI",
        }
    }

    /// Key of this feature under `options` in the configuration document
    pub const fn config_key(self) -> &'static str {
        match self {
            Self::Wikipedia => "wikipedia",
            Self::Encryption => "encryption",
            Self::Docs => "docs",
            Self::Books => "books",
            Self::Desktop => "desktop",
            Self::OptionalImageGen => "comfyui",
        }
    }

    /// Default value when neither user configuration nor environment sets it
    pub const fn default_enabled(self) -> bool {
        matches!(self, Self::Docs | Self::Encryption)
    }
}
