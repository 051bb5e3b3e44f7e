//! Stage Pipeline
//!
//! Runs stages strictly in ascending index order. Before each stage the step
//! counter is advanced and logged. A failing `Fatal` stage ends the run
//! without rolling back earlier stages; a failing `Tolerated` stage becomes a
//! warning and the next stage runs.

use crate::context::RunContext;
use crate::error::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicy {
    Fatal,
    Tolerated,
}

/// Action run by a stage. Receives the run context for logging.
pub type StageAction<'a> = Box<dyn Fn(&RunContext) -> Result<()> + 'a>;

pub struct Stage<'a> {
    pub index: u32,
    pub name: String,
    pub policy: StagePolicy,
    pub action: StageAction<'a>,
}

impl<'a> Stage<'a> {
    pub fn new(
        index: u32,
        name: impl Into<String>,
        policy: StagePolicy,
        action: impl Fn(&RunContext) -> Result<()> + 'a,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            policy,
            action: Box::new(action),
        }
    }

    pub fn fatal(
        index: u32,
        name: impl Into<String>,
        action: impl Fn(&RunContext) -> Result<()> + 'a,
    ) -> Self {
        Self::new(index, name, StagePolicy::Fatal, action)
    }

    pub fn tolerated(
        index: u32,
        name: impl Into<String>,
        action: impl Fn(&RunContext) -> Result<()> + 'a,
    ) -> Self {
        Self::new(index, name, StagePolicy::Tolerated, action)
    }
}

impl fmt::Debug for Stage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    /// Tolerated failure, carries the error text
    Warning(String),
    /// Fatal failure, carries the error text
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub index: u32,
    pub name: String,
    pub outcome: StageOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineResult {
    /// One report per stage that actually ran, in execution order
    pub reports: Vec<StageReport>,
    /// Name of the fatal stage that stopped the run
    pub aborted_at: Option<String>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.aborted_at.is_none()
    }

    /// Tolerated failures as `"stage: error"` lines
    pub fn warnings(&self) -> Vec<String> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                StageOutcome::Warning(msg) => Some(format!("{}: {}", r.name, msg)),
                _ => None,
            })
            .collect()
    }

    pub fn executed(&self) -> Vec<&str> {
        self.reports.iter().map(|r| r.name.as_str()).collect()
    }
}

pub struct StagePipeline;

impl StagePipeline {
    pub fn run(ctx: &RunContext, mut stages: Vec<Stage<'_>>) -> PipelineResult {
        stages.sort_by_key(|s| s.index);
        ctx.begin_steps(stages.len());

        let log = ctx.log();
        let mut result = PipelineResult::default();

        for stage in &stages {
            ctx.next_step(&stage.name);

            let outcome = match ((stage.action)(ctx), stage.policy) {
                (Ok(()), _) => {
                    log.success(format!("{} complete", stage.name));
                    StageOutcome::Completed
                }
                (Err(e), StagePolicy::Tolerated) => {
                    log.warning(format!("{} failed (continuing): {}", stage.name, e));
                    StageOutcome::Warning(e.to_string())
                }
                (Err(e), StagePolicy::Fatal) => {
                    log.error(format!("{} failed: {}", stage.name, e));
                    StageOutcome::Failed(e.to_string())
                }
            };

            let fatal = matches!(outcome, StageOutcome::Failed(_));
            result.reports.push(StageReport {
                index: stage.index,
                name: stage.name.clone(),
                outcome,
            });

            if fatal {
                log.error("Aborting: completed stages are left in place, re-run after fixing the cause");
                result.aborted_at = Some(stage.name.clone());
                break;
            }
        }

        result
    }
}
