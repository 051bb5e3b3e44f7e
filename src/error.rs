//! Error handling module for the provisioning orchestrator
//!
//! Provides centralized error handling with proper error types using thiserror.
//! The variants follow the run's failure taxonomy: pre-execution errors
//! (validation, configuration, space) abort before any mutation; stage errors
//! (dependency, download, command) are handed to the stage pipeline, which
//! applies the stage's fatal/tolerated policy.

use thiserror::Error;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Malformed or semantically invalid configuration (fatal, pre-execution)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The machine cannot be planned for (e.g. unknown architecture)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Insufficient disk space (fatal, pre-execution)
    #[error("Insufficient disk space: {required_gb} GB required, {available_gb} GB available")]
    Space { required_gb: u64, available_gb: u64 },

    /// A required external tool is missing and could not be installed
    #[error("Missing dependency '{tool}': {reason}")]
    Dependency { tool: String, reason: String },

    /// One or more artifacts exhausted their retries
    #[error("Download failed in stage '{stage}': {}", exhausted.join(", "))]
    Download { stage: String, exhausted: Vec<String> },

    /// A required post-install check failed
    #[error("Verification failed: {0}")]
    Verification(String),

    /// External command failed to spawn or returned non-zero
    #[error("Command failed: {0}")]
    Command(String),

    /// The operator declined a confirmation prompt
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// IO errors (log file, exchange file, erase)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a dependency error
    pub fn dependency(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dependency {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Create a command error
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Returns true for errors raised before any stage runs.
    ///
    /// These never leave partial state behind.
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Configuration(_) | Self::Space { .. } | Self::Cancelled(_)
        )
    }
}
