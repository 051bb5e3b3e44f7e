//! Stage catalogue
//!
//! Builds the ordered stage list for a plan. Order is the authoring
//! contract; the pipeline never reorders beyond sorting by index.
//!
//! | # | Stage              | Policy    | When |
//! |---|--------------------|-----------|------|
//! | 1 | System packages    | fatal     | always |
//! | 2 | Model runtime      | fatal     | always |
//! | 3 | Core models        | fatal     | always |
//! | 4 | Voice assets       | tolerated | always |
//! | … | Encryption tools   | tolerated | `encryption` |
//! | … | Offline documentation | tolerated | `docs` |
//! | … | Reference library  | tolerated | `books` |
//! | … | Wikipedia corpus   | tolerated | `wikipedia` |
//! | … | Desktop environment | tolerated | `desktop` |
//! | … | Image generation   | tolerated | `optional_image_gen` |
//! | … | Large models       | tolerated | large-artifact gate |
//!
//! Stages depend only on capability traits. Which concrete package manager
//! or download tool sits behind them is decided by the caller.

use crate::catalog::{self, FileArtifact, ModelArtifact};
use crate::context::RunContext;
use crate::download::{
    exhausted_names, ArtifactClient, BackoffPolicy, DownloadManager, DownloadTask, Sleeper,
    DEFAULT_MAX_PARALLEL,
};
use crate::error::{ProvisionError, Result};
use crate::health::{ServiceProbe, IMAGE_GEN_PORT, MODEL_RUNTIME_PORT};
use crate::installer::PackageInstaller;
use crate::logic::resolver::InstallPlan;
use crate::pipeline::Stage;
use crate::tools::{ensure_tool, CORE_TOOLS};
use crate::types::Feature;
use std::time::Duration;

pub const SYSTEM_PACKAGES: &str = "System packages";
pub const MODEL_RUNTIME: &str = "Model runtime";
pub const CORE_MODELS: &str = "Core models";
pub const VOICE_ASSETS: &str = "Voice assets";
pub const ENCRYPTION_TOOLS: &str = "Encryption tools";
pub const OFFLINE_DOCS: &str = "Offline documentation";
pub const REFERENCE_LIBRARY: &str = "Reference library";
pub const WIKIPEDIA_CORPUS: &str = "Wikipedia corpus";
pub const DESKTOP_ENVIRONMENT: &str = "Desktop environment";
pub const IMAGE_GENERATION: &str = "Image generation";
pub const LARGE_MODELS: &str = "Large models";

/// External capabilities the stages drive
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub installer: &'a dyn PackageInstaller,
    /// Model registry (pull / list)
    pub models: &'a dyn ArtifactClient,
    /// Plain file downloads
    pub files: &'a dyn ArtifactClient,
    pub probe: &'a dyn ServiceProbe,
    pub sleeper: &'a dyn Sleeper,
    /// Is this binary on PATH?
    pub tool_probe: &'a (dyn Fn(&str) -> bool + Sync),
}

impl<'a> Collaborators<'a> {
    /// Read-only view used by verification
    pub fn verify_targets(&self) -> crate::verify::VerifyTargets<'a> {
        crate::verify::VerifyTargets {
            models: self.models,
            files: self.files,
            probe: self.probe,
            tool_probe: self.tool_probe,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StageSettings {
    pub max_parallel: usize,
    pub backoff: BackoffPolicy,
    /// How long to wait for a service port after installing it
    pub health_timeout: Duration,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            backoff: BackoffPolicy::default(),
            health_timeout: Duration::from_secs(60),
        }
    }
}

/// Build the stages for `plan`.
pub fn build_stages<'a>(
    plan: &'a InstallPlan,
    c: Collaborators<'a>,
    settings: StageSettings,
) -> Vec<Stage<'a>> {
    let mut stages = Vec::new();
    let mut next_index = {
        let mut i = 0;
        move || {
            i += 1;
            i
        }
    };

    stages.push(Stage::fatal(next_index(), SYSTEM_PACKAGES, move |ctx| {
        c.installer.install(catalog::SYSTEM_PACKAGES)?;
        for tool in CORE_TOOLS {
            ensure_tool(ctx, c.installer, *tool, c.tool_probe)?;
        }
        Ok(())
    }));

    stages.push(Stage::fatal(next_index(), MODEL_RUNTIME, move |ctx| {
        ensure_tool(ctx, c.installer, catalog::MODEL_RUNTIME, c.tool_probe)?;
        wait_for_port(ctx, c.probe, "model runtime", MODEL_RUNTIME_PORT, settings.health_timeout)
    }));

    stages.push(Stage::fatal(next_index(), CORE_MODELS, move |ctx| {
        fetch_models(ctx, c, settings, CORE_MODELS, &catalog::core_models(plan))
    }));

    stages.push(Stage::tolerated(next_index(), VOICE_ASSETS, move |ctx| {
        fetch_files(ctx, c, settings, VOICE_ASSETS, catalog::VOICE_ASSETS)
    }));

    if plan.is_enabled(Feature::Encryption) {
        stages.push(Stage::tolerated(next_index(), ENCRYPTION_TOOLS, move |_| {
            c.installer.install(catalog::ENCRYPTION_PACKAGES)
        }));
    }

    if plan.is_enabled(Feature::Docs) {
        stages.push(Stage::tolerated(next_index(), OFFLINE_DOCS, move |_| {
            c.installer.install(catalog::DOCS_PACKAGES)
        }));
    }

    if plan.is_enabled(Feature::Books) {
        stages.push(Stage::tolerated(next_index(), REFERENCE_LIBRARY, move |ctx| {
            ensure_tool(ctx, c.installer, catalog::CORPUS_READER, c.tool_probe)?;
            fetch_files(ctx, c, settings, REFERENCE_LIBRARY, &[catalog::BOOKS])
        }));
    }

    if plan.is_enabled(Feature::Wikipedia) {
        stages.push(Stage::tolerated(next_index(), WIKIPEDIA_CORPUS, move |ctx| {
            ensure_tool(ctx, c.installer, catalog::CORPUS_READER, c.tool_probe)?;
            fetch_files(ctx, c, settings, WIKIPEDIA_CORPUS, &[catalog::wikipedia(plan.tier)])
        }));
    }

    if plan.is_enabled(Feature::Desktop) {
        stages.push(Stage::tolerated(next_index(), DESKTOP_ENVIRONMENT, move |_| {
            c.installer.install(catalog::DESKTOP_PACKAGES)
        }));
    }

    if plan.is_enabled(Feature::OptionalImageGen) {
        stages.push(Stage::tolerated(next_index(), IMAGE_GENERATION, move |ctx| {
            c.installer.install(catalog::IMAGE_GEN_PACKAGES)?;
            fetch_files(ctx, c, settings, IMAGE_GENERATION, &[catalog::IMAGE_GEN_CHECKPOINT])?;
            wait_for_port(ctx, c.probe, "image generation", IMAGE_GEN_PORT, settings.health_timeout)
        }));
    }

    if plan.large_artifacts {
        stages.push(Stage::tolerated(next_index(), LARGE_MODELS, move |ctx| {
            fetch_models(ctx, c, settings, LARGE_MODELS, &catalog::large_models(plan))
        }));
    }

    stages
}

fn wait_for_port(
    ctx: &RunContext,
    probe: &dyn ServiceProbe,
    service: &str,
    port: u16,
    timeout: Duration,
) -> Result<()> {
    ctx.log()
        .info(format!("Waiting for {} on port {}", service, port));
    if probe.wait_until_ready(port, timeout) {
        ctx.log().success(format!("{} is answering on port {}", service, port));
        Ok(())
    } else {
        Err(ProvisionError::command(format!(
            "{} did not answer on port {} within {}s",
            service,
            port,
            timeout.as_secs()
        )))
    }
}

fn fetch_models(
    ctx: &RunContext,
    c: Collaborators<'_>,
    settings: StageSettings,
    stage: &str,
    models: &[ModelArtifact],
) -> Result<()> {
    let tasks: Vec<DownloadTask> = models.iter().map(ModelArtifact::task).collect();
    fetch_group(ctx, c.models, c.sleeper, settings, stage, &tasks)
}

fn fetch_files(
    ctx: &RunContext,
    c: Collaborators<'_>,
    settings: StageSettings,
    stage: &str,
    files: &[FileArtifact],
) -> Result<()> {
    let tasks: Vec<DownloadTask> = files.iter().map(FileArtifact::task).collect();
    fetch_group(ctx, c.files, c.sleeper, settings, stage, &tasks)
}

fn fetch_group(
    ctx: &RunContext,
    client: &dyn ArtifactClient,
    sleeper: &dyn Sleeper,
    settings: StageSettings,
    stage: &str,
    tasks: &[DownloadTask],
) -> Result<()> {
    let manager = DownloadManager::new(client, sleeper).with_backoff(settings.backoff);
    let results = manager.fetch_group(ctx, tasks, settings.max_parallel);
    let exhausted = exhausted_names(&results);
    if exhausted.is_empty() {
        Ok(())
    } else {
        Err(ProvisionError::Download {
            stage: stage.to_string(),
            exhausted,
        })
    }
}
