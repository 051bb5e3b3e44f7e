//! Provisioning Orchestrator
//!
//! Drives one run through its phases:
//!
//! ```text
//! profile → resolve → space gate + confirmation → stage pipeline
//!         → verification → network isolation → summary
//! ```
//!
//! Validation, configuration and space errors, and a declined confirmation,
//! are returned as `Err` before anything on the machine changes. Once the
//! pipeline has started the run always produces a `RunSummary`.

use crate::config_file::{load_user_config, InstallConfig};
use crate::context::RunContext;
use crate::engine::space::{self, SpaceBudget};
use crate::engine::stages::{build_stages, Collaborators, StageSettings};
use crate::error::{ProvisionError, Result};
use crate::hardware::HardwareProfile;
use crate::logic::resolver::{resolve, InstallPlan};
use crate::network::{NetworkBackend, NetworkIsolationController, NetworkState};
use crate::pipeline::{PipelineResult, StagePipeline};
use crate::prompt::{confirm_yes_no, Confirmer};
use crate::run_state::{RunPhase, RunState};
use crate::verify::{run_checks, standard_checks, VerificationReport};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    /// Environment as `(key, value)` pairs; only recognized keys are used
    pub env: Vec<(String, String)>,
    /// Answer the pre-run confirmation with yes
    pub assume_yes: bool,
    /// Skip the final switch to ghost mode
    pub stay_online: bool,
    /// Where to write the hardware exchange file, if anywhere
    pub profile_file: Option<PathBuf>,
    pub settings: StageSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    FullyOperational,
    OperationalWithWarnings,
    Failed,
}

impl RunOutcome {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::FullyOperational | Self::OperationalWithWarnings => 0,
            Self::Failed => 1,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullyOperational => write!(f, "fully operational"),
            Self::OperationalWithWarnings => write!(f, "operational with warnings"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub plan: InstallPlan,
    pub budget: SpaceBudget,
    pub pipeline: PipelineResult,
    /// `None` when the pipeline aborted
    pub verification: Option<VerificationReport>,
    pub warnings: Vec<String>,
    pub final_phase: RunPhase,
}

/// Resolve and budget without touching anything.
pub fn preview(
    profile: &HardwareProfile,
    config: Option<&InstallConfig>,
) -> Result<(InstallPlan, SpaceBudget)> {
    let plan = resolve(profile, config)?;
    let budget = space::budget(&plan);
    Ok((plan, budget))
}

/// Run the whole provisioning sequence.
pub fn provision(
    ctx: &RunContext,
    profile: HardwareProfile,
    collaborators: Collaborators<'_>,
    network: &dyn NetworkBackend,
    confirmer: &mut dyn Confirmer,
    options: &RunOptions,
) -> Result<RunSummary> {
    let log = ctx.log();
    let mut state = RunState::new();

    // Profiling
    state.advance()?;
    log.info(format!("Hardware: {}", profile));
    if let Some(path) = &options.profile_file {
        if let Err(e) = profile.write_exchange_file(path) {
            log.warning(format!("Could not write {}: {}", path.display(), e));
        }
    }

    // Resolving
    state.advance()?;
    let resolved = load_user_config(options.config_path.as_deref(), options.env.iter().cloned())
        .and_then(|config| preview(&profile, config.as_ref()));
    let (plan, budget) = match resolved {
        Ok(pair) => pair,
        Err(e) => return Err(abort(ctx, &mut state, e)),
    };
    log.info(format!(
        "Plan: tier {} (from {}), features: {}",
        plan.tier,
        plan.tier_source,
        feature_list(&plan)
    ));

    // Preflight
    state.advance()?;
    log.info(format!(
        "Space required: {} GB, available: {} GB",
        budget.total_required_gb, profile.disk_available_gb
    ));
    if let Err(e) = space::check(&budget, &profile) {
        return Err(abort(ctx, &mut state, e));
    }
    let confirmed = options.assume_yes
        || confirm_yes_no(
            confirmer,
            &format!(
                "Provision tier '{}' using {} GB of disk?",
                plan.tier, budget.total_required_gb
            ),
        )?;
    if !confirmed {
        return Err(abort(
            ctx,
            &mut state,
            ProvisionError::cancelled("operator declined the run"),
        ));
    }
    state.confirm();

    // Provisioning
    state.advance()?;
    let stages = build_stages(&plan, collaborators, options.settings);
    let pipeline = StagePipeline::run(ctx, stages);
    let mut warnings = pipeline.warnings();

    if !pipeline.is_success() {
        state.fail()?;
        let summary = RunSummary {
            outcome: RunOutcome::Failed,
            plan,
            budget,
            pipeline,
            verification: None,
            warnings,
            final_phase: state.current_phase(),
        };
        log_summary(ctx, &summary);
        return Ok(summary);
    }

    // Verifying
    state.advance()?;
    let checks = standard_checks(&plan, collaborators.verify_targets());
    let verification = run_checks(log, &checks);
    for name in &verification.failing_required {
        log.error(format!("REQUIRED CHECK FAILED: {}", name));
        warnings.push(ProvisionError::Verification(name.clone()).to_string());
    }
    for name in verification.failing_informational() {
        warnings.push(format!("check failed: {}", name));
    }

    // Isolating
    state.advance()?;
    if options.stay_online {
        log.info("Staying online as requested");
    } else {
        let controller = NetworkIsolationController::new(network, log);
        if let Err(e) = controller.set_state(NetworkState::Ghost) {
            log.warning(format!("Network isolation incomplete: {}", e));
            warnings.push(format!("network isolation: {}", e));
        }
    }

    state.advance()?;
    let outcome = if warnings.is_empty() {
        RunOutcome::FullyOperational
    } else {
        RunOutcome::OperationalWithWarnings
    };
    let summary = RunSummary {
        outcome,
        plan,
        budget,
        pipeline,
        verification: Some(verification),
        warnings,
        final_phase: state.current_phase(),
    };
    log_summary(ctx, &summary);
    Ok(summary)
}

/// Mark the run failed and log the pre-execution error.
fn abort(ctx: &RunContext, state: &mut RunState, err: ProvisionError) -> ProvisionError {
    ctx.log().error(format!("{}: {}", state.current_phase(), err));
    if let Err(e) = state.fail() {
        tracing::debug!("run state already terminal: {}", e);
    }
    err
}

fn feature_list(plan: &InstallPlan) -> String {
    let enabled: Vec<String> = plan
        .enabled_features()
        .iter()
        .map(ToString::to_string)
        .collect();
    if enabled.is_empty() {
        "none".to_string()
    } else {
        enabled.join(", ")
    }
}

fn log_summary(ctx: &RunContext, summary: &RunSummary) {
    let log = ctx.log();
    log.info(format!(
        "Stages run: {}",
        summary.pipeline.executed().join(", ")
    ));
    for warning in &summary.warnings {
        log.warning(warning);
    }
    match summary.outcome {
        RunOutcome::FullyOperational => log.success("Run finished: fully operational"),
        RunOutcome::OperationalWithWarnings => log.warning(format!(
            "Run finished: operational with {} warning(s)",
            summary.warnings.len()
        )),
        RunOutcome::Failed => log.error(format!(
            "Run finished: failed at stage '{}'",
            summary.pipeline.aborted_at.as_deref().unwrap_or("unknown")
        )),
    }
}
