//! stackprov - main entry point

use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use stackprov::cli::{Cli, Commands, NetworkCommands};
use stackprov::clients::{FileArtifactClient, ModelRegistryClient};
use stackprov::config_file::InstallConfig;
use stackprov::context::RunContext;
use stackprov::download::ThreadSleeper;
use stackprov::engine::stages::Collaborators;
use stackprov::hardware::HardwareProfile;
use stackprov::health::TcpProbe;
use stackprov::installer::SystemPackageInstaller;
use stackprov::network::{CommandNetworkBackend, NetworkIsolationController, NetworkState};
use stackprov::orchestrator::{preview, provision, RunOptions};
use stackprov::prompt::{Confirmer, FixedAnswer, StdinConfirmer};
use stackprov::run_log::RunLog;
use stackprov::tools::{binary_exists, is_running_as_root, run_identity};
use stackprov::{catalog, config_file, process_guard};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    debug!("stackprov {} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let cli = Cli::parse_args();
    match dispatch(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Run {
            config,
            yes,
            stay_online,
            artifact_dir,
        } => {
            let ctx = open_run_context(&cli.log_file)?;
            if !is_running_as_root() {
                warn!("Not running as root; package installation will likely fail");
            }
            let profile = HardwareProfile::detect(&cli.install_root);

            let installer = SystemPackageInstaller::detect()?;
            let files = catalog::all_file_artifacts().into_iter().fold(
                FileArtifactClient::new(&artifact_dir),
                |client, a| client.with_source(a.id, a.url),
            );
            let collaborators = Collaborators {
                installer: &installer,
                models: &ModelRegistryClient,
                files: &files,
                probe: &TcpProbe::default(),
                sleeper: &ThreadSleeper,
                tool_probe: &binary_exists,
            };
            let options = RunOptions {
                config_path: config,
                env: std::env::vars().collect(),
                assume_yes: yes,
                stay_online,
                profile_file: Some(cli.profile_file.clone()),
                ..Default::default()
            };
            let mut confirmer: Box<dyn Confirmer> = if yes {
                Box::new(FixedAnswer("y".to_string()))
            } else {
                Box::new(StdinConfirmer)
            };

            let summary = provision(
                &ctx,
                profile,
                collaborators,
                &CommandNetworkBackend::default(),
                confirmer.as_mut(),
                &options,
            )
            .inspect_err(|e| {
                if e.is_pre_execution() {
                    info!("Stopped before any installation step; nothing was changed");
                }
            })?;
            println!("Run {}: tier {}", summary.outcome, summary.plan.tier);
            for warning in &summary.warnings {
                println!("  ! {}", warning);
            }
            Ok(summary.outcome.exit_code() as u8)
        }
        Commands::Profile => {
            let profile = HardwareProfile::detect(&cli.install_root);
            profile
                .write_exchange_file(&cli.profile_file)
                .with_context(|| format!("writing {}", cli.profile_file.display()))?;
            print!("{}", profile.to_exchange_string());
            info!("Profile written to {}", cli.profile_file.display());
            Ok(0)
        }
        Commands::Plan { config } => {
            let profile = HardwareProfile::detect(&cli.install_root);
            let user = config_file::load_user_config(config.as_deref(), std::env::vars())?;
            let (plan, budget) = preview(&profile, user.as_ref())?;
            println!("{}\n\n{}\n\n{}", profile, plan, budget);
            if budget.total_required_gb > profile.disk_available_gb {
                println!(
                    "\n✗ Not enough disk: {} GB available",
                    profile.disk_available_gb
                );
                return Ok(1);
            }
            Ok(0)
        }
        Commands::Validate { config } => {
            info!("Validating configuration file: {}", config.display());
            let parsed = InstallConfig::load_from_file(&config)?;
            println!("✓ Configuration file is valid: {:?}", parsed);
            Ok(0)
        }
        Commands::Network { action } => {
            let ctx = open_run_context(&cli.log_file)?;
            let backend = CommandNetworkBackend::default();
            let controller = NetworkIsolationController::new(&backend, ctx.log());
            match action {
                NetworkCommands::Ghost => controller.set_state(NetworkState::Ghost)?,
                NetworkCommands::Online => controller.set_state(NetworkState::Online)?,
                NetworkCommands::RandomizeMac { interface } => {
                    let address = controller.randomize_identity(&interface)?;
                    println!("{} -> {}", interface, address);
                }
            }
            Ok(0)
        }
        Commands::Erase { target } => {
            let ctx = open_run_context(&cli.log_file)?;
            let backend = CommandNetworkBackend::default();
            let controller = NetworkIsolationController::new(&backend, ctx.log());
            let report = controller.secure_erase(&target, &mut StdinConfirmer)?;
            println!(
                "✓ Erased {} file(s), {} director(ies)",
                report.files_erased, report.directories_removed
            );
            Ok(0)
        }
    }
}

/// Open the run log and hand it to the invoking user.
fn open_run_context(log_file: &Path) -> Result<RunContext> {
    let log = RunLog::open(log_file)
        .with_context(|| format!("opening run log {}", log_file.display()))?;
    if let Some(user) = run_identity() {
        if let Err(e) = log.chown_to(&user) {
            warn!("Could not hand {} to {}: {}", log_file.display(), user, e);
        }
    }
    Ok(RunContext::new(log))
}
