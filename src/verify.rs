//! Verification Suite
//!
//! Independent, read-only post-install checks. Every check runs; there is
//! no short-circuit. A run is operational when no *required* check fails.

use crate::catalog;
use crate::health::{ServiceProbe, IMAGE_GEN_PORT, MODEL_RUNTIME_PORT};
use crate::download::ArtifactClient;
use crate::logic::resolver::InstallPlan;
use crate::run_log::RunLog;
use crate::types::Feature;
use std::fmt;

pub type CheckProbe<'a> = Box<dyn Fn() -> bool + Send + Sync + 'a>;

pub struct VerificationCheck<'a> {
    pub name: String,
    pub required: bool,
    pub probe: CheckProbe<'a>,
}

impl<'a> VerificationCheck<'a> {
    pub fn required(name: impl Into<String>, probe: impl Fn() -> bool + Send + Sync + 'a) -> Self {
        Self {
            name: name.into(),
            required: true,
            probe: Box::new(probe),
        }
    }

    pub fn informational(
        name: impl Into<String>,
        probe: impl Fn() -> bool + Send + Sync + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            required: false,
            probe: Box::new(probe),
        }
    }
}

impl fmt::Debug for VerificationCheck<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationCheck")
            .field("name", &self.name)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub required: bool,
    pub passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub passed: usize,
    pub failed: usize,
    /// Names of failing required checks
    pub failing_required: Vec<String>,
    pub results: Vec<CheckResult>,
}

impl VerificationReport {
    pub fn is_operational(&self) -> bool {
        self.failing_required.is_empty()
    }

    /// Names of failing informational checks
    pub fn failing_informational(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.passed && !r.required)
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// Run every check and log each result.
pub fn run_checks(log: &RunLog, checks: &[VerificationCheck<'_>]) -> VerificationReport {
    let mut report = VerificationReport::default();

    for check in checks {
        let passed = (check.probe)();
        match (passed, check.required) {
            (true, _) => log.success(format!("✓ {}", check.name)),
            (false, true) => log.error(format!("✗ {} (required)", check.name)),
            (false, false) => log.warning(format!("✗ {}", check.name)),
        }

        if passed {
            report.passed += 1;
        } else {
            report.failed += 1;
            if check.required {
                report.failing_required.push(check.name.clone());
            }
        }
        report.results.push(CheckResult {
            name: check.name.clone(),
            required: check.required,
            passed,
        });
    }

    report
}

/// Probes the standard checks read from
#[derive(Clone, Copy)]
pub struct VerifyTargets<'a> {
    pub models: &'a dyn ArtifactClient,
    pub files: &'a dyn ArtifactClient,
    pub probe: &'a dyn ServiceProbe,
    pub tool_probe: &'a (dyn Fn(&str) -> bool + Sync),
}

/// The checks for a provisioned plan.
pub fn standard_checks<'a>(plan: &InstallPlan, t: VerifyTargets<'a>) -> Vec<VerificationCheck<'a>> {
    let mut checks = vec![
        VerificationCheck::required("Model runtime installed", move || {
            (t.tool_probe)(catalog::MODEL_RUNTIME.binary)
        }),
        VerificationCheck::required(
            format!("Model runtime answering on port {}", MODEL_RUNTIME_PORT),
            move || t.probe.is_listening(MODEL_RUNTIME_PORT),
        ),
    ];

    for model in catalog::core_models(plan) {
        checks.push(VerificationCheck::required(
            format!("{} ({})", model.display_name, model.id),
            move || t.models.is_present(model.id),
        ));
    }

    for asset in catalog::VOICE_ASSETS {
        checks.push(VerificationCheck::informational(asset.display_name, move || {
            t.files.is_present(asset.id)
        }));
    }

    if plan.is_enabled(Feature::Wikipedia) {
        let corpus = catalog::wikipedia(plan.tier);
        checks.push(VerificationCheck::informational(corpus.display_name, move || {
            t.files.is_present(corpus.id)
        }));
    }

    if plan.is_enabled(Feature::Books) {
        checks.push(VerificationCheck::informational(catalog::BOOKS.display_name, move || {
            t.files.is_present(catalog::BOOKS.id)
        }));
    }

    if plan.is_enabled(Feature::OptionalImageGen) {
        checks.push(VerificationCheck::informational(
            format!("Image generation answering on port {}", IMAGE_GEN_PORT),
            move || t.probe.is_listening(IMAGE_GEN_PORT),
        ));
    }

    checks.push(VerificationCheck::informational("Firewall tool installed", move || {
        (t.tool_probe)("ufw")
    }));

    checks
}
