//! End-to-end runs with fake collaborators.

mod common;

use common::{
    always_present, captured_log, profile, FakeArtifacts, FakeInstaller, FakeNetwork, FakeProbe,
    RecordingSleeper, ScriptedConfirmer,
};
use stackprov::context::RunContext;
use stackprov::engine::stages::{self, Collaborators, StageSettings};
use stackprov::error::ProvisionError;
use stackprov::orchestrator::{provision, RunOptions, RunOutcome, RunSummary};
use stackprov::run_state::RunPhase;
use stackprov::types::Tier;
use stackprov::HardwareProfile;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

struct Harness {
    installer: FakeInstaller,
    models: FakeArtifacts,
    files: FakeArtifacts,
    probe: FakeProbe,
    sleeper: RecordingSleeper,
    network: FakeNetwork,
}

impl Harness {
    fn new() -> Self {
        Self {
            installer: FakeInstaller::default(),
            models: FakeArtifacts::new(),
            files: FakeArtifacts::new(),
            probe: FakeProbe::healthy(),
            sleeper: RecordingSleeper::default(),
            network: FakeNetwork::new(&["eth0", "lo", "wlan0"]),
        }
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            installer: &self.installer,
            models: &self.models,
            files: &self.files,
            probe: &self.probe,
            sleeper: &self.sleeper,
            tool_probe: &always_present,
        }
    }

    fn run(
        &self,
        ctx: &RunContext,
        hw: HardwareProfile,
        confirmer: &mut ScriptedConfirmer,
        options: &RunOptions,
    ) -> Result<RunSummary, ProvisionError> {
        provision(ctx, hw, self.collaborators(), &self.network, confirmer, options)
    }
}

fn options() -> RunOptions {
    RunOptions {
        assume_yes: true,
        settings: StageSettings {
            health_timeout: Duration::from_millis(10),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_basic_machine_without_config_is_fully_operational() {
    let h = Harness::new();
    let (log, buf) = captured_log();
    let ctx = RunContext::new(log);
    let mut confirmer = ScriptedConfirmer::new(&[]);

    let summary = h.run(&ctx, profile(12, 200), &mut confirmer, &options()).unwrap();

    assert_eq!(summary.plan.tier, Tier::Basic);
    assert_eq!(summary.budget.base_gb, 30);
    assert_eq!(summary.budget.tier_increment_gb, 20);
    assert_eq!(summary.budget.total_required_gb, 50);
    assert_eq!(summary.outcome, RunOutcome::FullyOperational);
    assert_eq!(summary.outcome.exit_code(), 0);
    assert_eq!(summary.final_phase, RunPhase::Completed);
    assert_eq!(
        summary.pipeline.executed(),
        vec![
            stages::SYSTEM_PACKAGES,
            stages::MODEL_RUNTIME,
            stages::CORE_MODELS,
            stages::VOICE_ASSETS,
            stages::ENCRYPTION_TOOLS,
            stages::OFFLINE_DOCS,
        ]
    );
    assert!(summary.verification.unwrap().is_operational());
    assert!(h.models.fetched().contains(&"llama3.2:3b".to_string()));

    // ghost mode at the end, loopback untouched
    let calls = h.network.recorded();
    assert_eq!(
        calls,
        vec![
            "management off",
            "link eth0 down",
            "link wlan0 down",
            "outbound deny",
        ]
    );
    assert!(confirmer.prompts.is_empty(), "--yes must not prompt");
    assert!(buf.contents().contains("[SUCCESS] Run finished: fully operational"));
}

#[test]
fn test_insufficient_space_aborts_before_any_mutation() {
    let h = Harness::new();
    let mut confirmer = ScriptedConfirmer::new(&[]);

    let err = h
        .run(&RunContext::quiet(), profile(12, 49), &mut confirmer, &options())
        .unwrap_err();

    match err {
        ProvisionError::Space {
            required_gb,
            available_gb,
        } => {
            assert_eq!(required_gb, 50);
            assert_eq!(available_gb, 49);
        }
        other => panic!("expected space error, got {}", other),
    }
    assert!(h.installer.installed().is_empty());
    assert!(h.models.fetched().is_empty());
    assert!(h.network.recorded().is_empty());
}

#[test]
fn test_invalid_tier_in_config_is_validation_error() {
    let h = Harness::new();
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"tier":"gigantic"}}"#).unwrap();
    let opts = RunOptions {
        config_path: Some(file.path().to_path_buf()),
        ..options()
    };

    let err = h
        .run(&RunContext::quiet(), profile(64, 1000), &mut ScriptedConfirmer::new(&[]), &opts)
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Validation(_)));
    assert!(h.installer.installed().is_empty());
}

#[test]
fn test_unknown_architecture_refuses_to_plan() {
    let h = Harness::new();
    let hw = HardwareProfile {
        ram_gb: 16,
        disk_available_gb: 500,
        ..Default::default()
    };
    let err = h
        .run(&RunContext::quiet(), hw, &mut ScriptedConfirmer::new(&[]), &options())
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Configuration(_)));
}

#[test]
fn test_declined_confirmation_cancels() {
    let h = Harness::new();
    let opts = RunOptions {
        assume_yes: false,
        ..options()
    };
    let mut confirmer = ScriptedConfirmer::new(&["n"]);

    let err = h
        .run(&RunContext::quiet(), profile(12, 200), &mut confirmer, &opts)
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Cancelled(_)));
    assert_eq!(confirmer.prompts.len(), 1);
    assert!(confirmer.prompts[0].contains("50 GB"));
    assert!(h.installer.installed().is_empty());
}

#[test]
fn test_accepted_confirmation_runs() {
    let h = Harness::new();
    let opts = RunOptions {
        assume_yes: false,
        ..options()
    };
    let mut confirmer = ScriptedConfirmer::new(&["yes"]);
    let summary = h
        .run(&RunContext::quiet(), profile(12, 200), &mut confirmer, &opts)
        .unwrap();
    assert_eq!(summary.outcome, RunOutcome::FullyOperational);
}

#[test]
fn test_core_model_failure_is_fatal() {
    let mut h = Harness::new();
    h.models = FakeArtifacts::new().always_failing("llama3.2:3b");

    let summary = h
        .run(&RunContext::quiet(), profile(12, 200), &mut ScriptedConfirmer::new(&[]), &options())
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Failed);
    assert_eq!(summary.outcome.exit_code(), 1);
    assert_eq!(summary.final_phase, RunPhase::Failed);
    assert_eq!(summary.pipeline.aborted_at.as_deref(), Some(stages::CORE_MODELS));
    assert!(summary.verification.is_none());
    // voice assets never started, network untouched
    assert!(h.files.fetched().is_empty());
    assert!(h.network.recorded().is_empty());
    // three attempts, two backoff sleeps (5s, 10s)
    assert_eq!(h.models.fetches_of("llama3.2:3b"), 3);
    assert_eq!(
        h.sleeper.recorded(),
        vec![Duration::from_secs(5), Duration::from_secs(10)]
    );
}

#[test]
fn test_uninstallable_runtime_aborts_at_runtime_stage() {
    let mut h = Harness::new();
    h.installer = FakeInstaller::failing_on("ollama");

    let runtime_missing = |binary: &str| binary != "ollama";
    let collaborators = Collaborators {
        tool_probe: &runtime_missing,
        ..h.collaborators()
    };
    let summary = provision(
        &RunContext::quiet(),
        profile(12, 200),
        collaborators,
        &h.network,
        &mut ScriptedConfirmer::new(&[]),
        &options(),
    )
    .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Failed);
    assert_eq!(
        summary.pipeline.aborted_at.as_deref(),
        Some(stages::MODEL_RUNTIME)
    );
    assert!(h.installer.installed().contains(&"ollama".to_string()));
    assert!(h.models.fetched().is_empty());
}

#[test]
fn test_tolerated_voice_failure_gives_warnings() {
    let mut h = Harness::new();
    h.files = FakeArtifacts::new().always_failing("ggml-base.en.bin");

    let summary = h
        .run(&RunContext::quiet(), profile(12, 200), &mut ScriptedConfirmer::new(&[]), &options())
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::OperationalWithWarnings);
    assert_eq!(summary.outcome.exit_code(), 0);
    assert!(summary
        .warnings
        .iter()
        .any(|w| w.contains("Speech recognition model")));
    // later stages still ran
    assert!(summary.pipeline.executed().contains(&stages::OFFLINE_DOCS));
}

#[test]
fn test_failing_required_check_is_reported_not_fatal() {
    let mut h = Harness::new();
    h.probe = FakeProbe {
        becomes_ready: true,
        listening: false,
    };
    let (log, buf) = captured_log();

    let summary = h
        .run(&RunContext::new(log), profile(12, 200), &mut ScriptedConfirmer::new(&[]), &options())
        .unwrap();

    let verification = summary.verification.as_ref().unwrap();
    assert!(!verification.is_operational());
    assert_eq!(verification.failing_required.len(), 1);
    assert_eq!(summary.outcome, RunOutcome::OperationalWithWarnings);
    assert_eq!(summary.outcome.exit_code(), 0);
    assert!(buf.contents().contains("[ERROR] REQUIRED CHECK FAILED"));
    let name = &verification.failing_required[0];
    assert!(summary
        .warnings
        .contains(&format!("Verification failed: {}", name)));
}

#[test]
fn test_runtime_not_answering_is_fatal() {
    let mut h = Harness::new();
    h.probe = FakeProbe {
        becomes_ready: false,
        listening: false,
    };
    let summary = h
        .run(&RunContext::quiet(), profile(12, 200), &mut ScriptedConfirmer::new(&[]), &options())
        .unwrap();
    assert_eq!(summary.pipeline.aborted_at.as_deref(), Some(stages::MODEL_RUNTIME));
    assert!(h.models.fetched().is_empty());
}

#[test]
fn test_stay_online_skips_isolation() {
    let h = Harness::new();
    let opts = RunOptions {
        stay_online: true,
        ..options()
    };
    let summary = h
        .run(&RunContext::quiet(), profile(12, 200), &mut ScriptedConfirmer::new(&[]), &opts)
        .unwrap();
    assert_eq!(summary.outcome, RunOutcome::FullyOperational);
    assert!(h.network.recorded().is_empty());
}

#[test]
fn test_env_overrides_shape_the_plan() {
    let h = Harness::new();
    let opts = RunOptions {
        env: vec![
            ("PERF_TIER".to_string(), "performance".to_string()),
            ("INSTALL_WIKIPEDIA".to_string(), "true".to_string()),
            ("INSTALL_DOCS".to_string(), "false".to_string()),
        ],
        ..options()
    };

    let summary = h
        .run(&RunContext::quiet(), profile(12, 1000), &mut ScriptedConfirmer::new(&[]), &opts)
        .unwrap();

    assert_eq!(summary.plan.tier, Tier::Performance);
    // forced tier on a 12 GB machine keeps the large-artifact gate closed
    assert!(!summary.plan.large_artifacts);
    assert_eq!(summary.budget.total_required_gb, 30 + 90 + 90);
    let executed = summary.pipeline.executed();
    assert!(executed.contains(&stages::WIKIPEDIA_CORPUS));
    assert!(!executed.contains(&stages::OFFLINE_DOCS));
    assert!(!executed.contains(&stages::LARGE_MODELS));
    assert!(h.files.fetched().contains(&"wikipedia_en_all_maxi.zim".to_string()));
}

#[test]
fn test_big_machine_fetches_large_models() {
    let h = Harness::new();
    let summary = h
        .run(&RunContext::quiet(), profile(128, 2000), &mut ScriptedConfirmer::new(&[]), &options())
        .unwrap();
    assert!(summary.plan.large_artifacts);
    assert_eq!(summary.pipeline.executed().last(), Some(&stages::LARGE_MODELS));
    assert!(h.models.fetched().contains(&"llama3.3:70b".to_string()));
}

#[test]
fn test_exchange_file_written_during_profiling() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hw.env");
    let opts = RunOptions {
        profile_file: Some(path.clone()),
        ..options()
    };
    h.run(&RunContext::quiet(), profile(12, 200), &mut ScriptedConfirmer::new(&[]), &opts)
        .unwrap();

    let read = HardwareProfile::read_exchange_file(&path).unwrap();
    assert_eq!(read, profile(12, 200));
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("RECOMMENDED_TIER=basic"));
}
