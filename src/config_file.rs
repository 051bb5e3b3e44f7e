//! User configuration: JSON document plus environment overrides.
//!
//! The document is parsed leniently (unknown keys ignored) and then validated
//! strictly into an `InstallConfig` of typed values. An invalid tier is a
//! `ValidationError`; it is never silently replaced by a default.
//!
//! ```json
//! { "tier": "standard", "options": { "wikipedia": true, "comfyui": false } }
//! ```
//!
//! Environment overrides are applied on top of the document:
//!
//! | Variable             | Effect |
//! |----------------------|--------|
//! | `PERF_TIER`          | forces the tier |
//! | `INSTALL_WIKIPEDIA`  | forces `wikipedia` |
//! | `INSTALL_ENCRYPTION` | forces `encryption` |
//! | `INSTALL_DOCS`       | forces `docs` |
//! | `INSTALL_BOOKS`      | forces `books` |
//! | `INSTALL_DESKTOP`    | forces `desktop` |
//! | `INSTALL_COMFYUI`    | forces `optional_image_gen` |

use crate::error::{ProvisionError, Result};
use crate::types::{Feature, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use strum::IntoEnumIterator;

/// Environment variable forcing the tier
pub const TIER_ENV_VAR: &str = "PERF_TIER";

/// The configuration document as written by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub options: ConfigOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOptions {
    #[serde(default)]
    pub wikipedia: Option<bool>,
    #[serde(default)]
    pub encryption: Option<bool>,
    #[serde(default)]
    pub docs: Option<bool>,
    #[serde(default)]
    pub books: Option<bool>,
    #[serde(default)]
    pub desktop: Option<bool>,
    #[serde(default)]
    pub comfyui: Option<bool>,
}

impl ConfigOptions {
    fn get(&self, feature: Feature) -> Option<bool> {
        match feature {
            Feature::Wikipedia => self.wikipedia,
            Feature::Encryption => self.encryption,
            Feature::Docs => self.docs,
            Feature::Books => self.books,
            Feature::Desktop => self.desktop,
            Feature::OptionalImageGen => self.comfyui,
        }
    }
}

impl ConfigDocument {
    /// Load a document from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            ProvisionError::validation(format!(
                "cannot read configuration {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| ProvisionError::validation(format!("malformed configuration: {}", e)))
    }
}

/// Validated user configuration.
///
/// `None` / absent keys mean "no preference": the resolver falls back to the
/// hardware-derived recommendation for those.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallConfig {
    pub tier: Option<Tier>,
    pub features: BTreeMap<Feature, bool>,
}

impl InstallConfig {
    /// Validate a parsed document.
    pub fn from_document(doc: &ConfigDocument) -> Result<Self> {
        let tier = doc.tier.as_deref().map(parse_tier).transpose()?;
        let features = Feature::iter()
            .filter_map(|f| doc.options.get(f).map(|v| (f, v)))
            .collect();
        Ok(Self { tier, features })
    }

    /// Load and validate a configuration file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_document(&ConfigDocument::load_from_file(path)?)
    }

    /// Apply environment overrides. Later values win over the document.
    ///
    /// Only recognized variables are considered; everything else in `vars`
    /// is ignored. A variable set to an empty or blank value counts as unset.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut applied = false;
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            if value.trim().is_empty() {
                continue;
            }
            if key == TIER_ENV_VAR {
                self.tier = Some(parse_tier(value)?);
                applied = true;
            } else if let Some(feature) = Feature::iter().find(|f| f.env_var() == key) {
                self.features.insert(feature, parse_bool(key, value)?);
                applied = true;
            }
        }
        Ok(applied)
    }

    /// Returns true if no preference is set at all
    pub fn is_empty(&self) -> bool {
        self.tier.is_none() && self.features.is_empty()
    }
}

/// Load the user configuration from an optional document and the
/// environment.
///
/// Returns `Ok(None)` when there is no document and no recognized override,
/// which lets the resolver use the fixed default feature set.
pub fn load_user_config<I, K, V>(path: Option<&Path>, env: I) -> Result<Option<InstallConfig>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut config = match path {
        Some(p) => InstallConfig::load_from_file(p)?,
        None => InstallConfig::default(),
    };
    let from_env = config.apply_env(env)?;
    if path.is_none() && !from_env {
        return Ok(None);
    }
    Ok(Some(config))
}

/// Parse a tier name strictly (surrounding whitespace and case tolerated).
pub fn parse_tier(value: &str) -> Result<Tier> {
    value.trim().to_ascii_lowercase().parse::<Tier>().map_err(|_| {
        ProvisionError::validation(format!(
            "invalid tier '{}' (expected minimal, basic, standard or performance)",
            value
        ))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(ProvisionError::validation(format!(
            "{} must be a boolean (true/false/yes/no/1/0), got '{}'",
            key, value
        ))),
    }
}
