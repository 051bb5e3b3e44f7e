//! Run Phase State Machine
//!
//! Authoritative record of where a provisioning run is. Transitions are
//! validated: phases cannot be skipped, the run only moves forward, and the
//! mutating phase cannot be entered before the operator confirmed the run.
//!
//! ```text
//! NotStarted → Profiling → Resolving → Preflight → Provisioning
//!            → Verifying → Isolating → Completed
//!
//! (any non-terminal phase can transition to Failed)
//! ```

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RunPhase {
    NotStarted = 0,
    /// Capturing the hardware profile
    Profiling = 1,
    /// Resolving configuration into a plan
    Resolving = 2,
    /// Space gate and operator confirmation
    Preflight = 3,
    /// Running the stage pipeline. The only phase that mutates the machine
    /// and so the only one that requires confirmation.
    Provisioning = 4,
    Verifying = 5,
    /// Network isolation
    Isolating = 6,
    Completed = 7,
    Failed = 255,
}

impl RunPhase {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[inline]
    pub const fn requires_confirmation(self) -> bool {
        matches!(self, Self::Provisioning)
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::Profiling),
            Self::Profiling => Some(Self::Resolving),
            Self::Resolving => Some(Self::Preflight),
            Self::Preflight => Some(Self::Provisioning),
            Self::Provisioning => Some(Self::Verifying),
            Self::Verifying => Some(Self::Isolating),
            Self::Isolating => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::Profiling => "Profiling hardware",
            Self::Resolving => "Resolving install plan",
            Self::Preflight => "Preflight checks",
            Self::Provisioning => "Provisioning",
            Self::Verifying => "Verifying installation",
            Self::Isolating => "Network isolation",
            Self::Completed => "Run complete",
            Self::Failed => "Run failed",
        }
    }

    /// All phases in order, excluding Failed
    pub const fn all_phases() -> &'static [Self] {
        &[
            Self::NotStarted,
            Self::Profiling,
            Self::Resolving,
            Self::Preflight,
            Self::Provisioning,
            Self::Verifying,
            Self::Isolating,
            Self::Completed,
        ]
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseTransitionError {
    #[error("Cannot skip from {from} to {to}")]
    SkippedPhase { from: RunPhase, to: RunPhase },

    #[error("Cannot go backwards from {from} to {to} (runs are forward-only)")]
    BackwardTransition { from: RunPhase, to: RunPhase },

    #[error("Cannot transition from terminal phase {from}")]
    FromTerminalPhase { from: RunPhase },

    #[error("{phase} requires the run to be confirmed first")]
    MissingConfirmation { phase: RunPhase },

    #[error("Already in phase {phase}")]
    AlreadyInPhase { phase: RunPhase },
}

impl From<PhaseTransitionError> for crate::error::ProvisionError {
    fn from(err: PhaseTransitionError) -> Self {
        crate::error::ProvisionError::configuration(err.to_string())
    }
}

/// Owns the current phase of one run
#[derive(Debug, Clone)]
pub struct RunState {
    current: RunPhase,
    failed_at: Option<RunPhase>,
    /// (phase, unix timestamp) for every transition
    history: Vec<(RunPhase, i64)>,
    confirmed: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            current: RunPhase::NotStarted,
            failed_at: None,
            history: Vec::with_capacity(RunPhase::all_phases().len()),
            confirmed: false,
        }
    }

    #[inline]
    pub fn current_phase(&self) -> RunPhase {
        self.current
    }

    #[inline]
    pub fn failed_at(&self) -> Option<RunPhase> {
        self.failed_at
    }

    pub fn history(&self) -> &[(RunPhase, i64)] {
        &self.history
    }

    /// Record that the operator accepted the run. Cannot be revoked.
    pub fn confirm(&mut self) {
        self.confirmed = true;
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Advance to the next phase in sequence.
    pub fn advance(&mut self) -> Result<RunPhase, PhaseTransitionError> {
        let next = self
            .current
            .next()
            .ok_or(PhaseTransitionError::FromTerminalPhase { from: self.current })?;
        self.enter(next)
    }

    /// Transition to `target`, which must be the immediate next phase.
    pub fn transition_to(&mut self, target: RunPhase) -> Result<RunPhase, PhaseTransitionError> {
        if self.current.is_terminal() {
            return Err(PhaseTransitionError::FromTerminalPhase { from: self.current });
        }
        if target == self.current {
            return Err(PhaseTransitionError::AlreadyInPhase { phase: target });
        }
        if target != RunPhase::Failed && target.order() < self.current.order() {
            return Err(PhaseTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next() != Some(target) {
            return Err(PhaseTransitionError::SkippedPhase {
                from: self.current,
                to: target,
            });
        }
        self.enter(target)
    }

    /// Mark the run failed at the current phase.
    pub fn fail(&mut self) -> Result<(), PhaseTransitionError> {
        if self.current.is_terminal() {
            return Err(PhaseTransitionError::FromTerminalPhase { from: self.current });
        }
        self.failed_at = Some(self.current);
        self.record(RunPhase::Failed);
        self.current = RunPhase::Failed;
        Ok(())
    }

    fn enter(&mut self, phase: RunPhase) -> Result<RunPhase, PhaseTransitionError> {
        if phase.requires_confirmation() && !self.confirmed {
            return Err(PhaseTransitionError::MissingConfirmation { phase });
        }
        tracing::debug!("Run phase: {} -> {}", self.current, phase);
        self.record(phase);
        self.current = phase;
        Ok(phase)
    }

    fn record(&mut self, phase: RunPhase) {
        self.history.push((phase, chrono::Utc::now().timestamp()));
    }
}
