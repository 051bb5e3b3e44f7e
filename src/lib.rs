//! stackprov library
//!
//! Hardware-aware provisioning of an offline software stack: profile the
//! machine, resolve a tier, gate on disk space, run the install stages with
//! bounded-parallel retrying downloads, verify, then isolate the network.

pub mod catalog;
pub mod cli;
pub mod clients;
pub mod command_runner;
pub mod commands;
pub mod config_file;
pub mod context;
pub mod download;
pub mod engine;
pub mod erase;
pub mod error;
pub mod hardware;
pub mod health;
pub mod installer;
pub mod logic;
pub mod network;
pub mod orchestrator;
pub mod pipeline;
pub mod process_guard;
pub mod prompt;
pub mod run_log;
pub mod run_state;
pub mod tools;
pub mod types;
pub mod verify;

// Re-export main types for convenience
pub use config_file::InstallConfig;
pub use context::RunContext;
pub use error::{ProvisionError, Result};
pub use hardware::HardwareProfile;
pub use process_guard::{ChildRegistry, CommandProcessGroup};
pub use types::{Architecture, Feature, GpuType, Tier};

// Planning
pub use engine::space::SpaceBudget;
pub use logic::resolver::{resolve, tier_for_ram, InstallPlan};

// Execution
pub use download::{DownloadManager, DownloadTask, TaskOutcome, TaskResult};
pub use orchestrator::{provision, RunOutcome, RunSummary};
pub use pipeline::{PipelineResult, Stage, StagePipeline, StagePolicy};
pub use verify::{VerificationCheck, VerificationReport};
