use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::hardware::DEFAULT_EXCHANGE_FILE;
use crate::run_log::DEFAULT_LOG_FILE;

/// stackprov - provision an offline AI stack sized to this machine
#[derive(Parser)]
#[command(name = "stackprov")]
#[command(about = "Hardware-aware provisioning of an offline software stack")]
#[command(version)]
pub struct Cli {
    /// Run log location
    #[arg(long, global = true, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Hardware profile exchange file
    #[arg(long, global = true, default_value = DEFAULT_EXCHANGE_FILE)]
    pub profile_file: PathBuf,

    /// Filesystem whose free space is budgeted
    #[arg(long, global = true, default_value = "/")]
    pub install_root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Profile, plan, provision, verify and isolate
    Run {
        /// Configuration document (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Answer the pre-run confirmation with yes
        #[arg(short = 'y', long)]
        yes: bool,

        /// Do not switch to ghost mode at the end
        #[arg(long)]
        stay_online: bool,

        /// Where downloaded files are stored
        #[arg(long, default_value = "/opt/stackprov/artifacts")]
        artifact_dir: PathBuf,
    },
    /// Profile the hardware and write the exchange file
    Profile,
    /// Show the plan and space budget without changing anything
    Plan {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration document
    Validate {
        config: PathBuf,
    },
    /// Network isolation tools
    Network {
        #[command(subcommand)]
        action: NetworkCommands,
    },
    /// Overwrite and delete a file or directory (asks twice)
    Erase {
        target: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum NetworkCommands {
    /// Disable every non-loopback interface and deny outbound traffic
    Ghost,
    /// Restore outbound traffic and interface management
    Online,
    /// Assign a random hardware address to an interface
    RandomizeMac {
        interface: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_required() {
        assert!(Cli::try_parse_from(["stackprov"]).is_err());
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "stackprov",
            "--log-file",
            "/tmp/p.log",
            "run",
            "--config",
            "c.json",
            "--yes",
            "--stay-online",
        ])
        .unwrap();
        assert_eq!(cli.log_file, PathBuf::from("/tmp/p.log"));
        assert_eq!(cli.install_root, PathBuf::from("/"));
        match cli.command {
            Commands::Run {
                config,
                yes,
                stay_online,
                artifact_dir,
            } => {
                assert_eq!(config, Some(PathBuf::from("c.json")));
                assert!(yes);
                assert!(stay_online);
                assert_eq!(artifact_dir, PathBuf::from("/opt/stackprov/artifacts"));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_network_subcommands() {
        let cli = Cli::try_parse_from(["stackprov", "network", "randomize-mac", "wlan0"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Network {
                action: NetworkCommands::RandomizeMac { ref interface }
            } if interface == "wlan0"
        ));

        let cli = Cli::try_parse_from(["stackprov", "network", "ghost"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Network {
                action: NetworkCommands::Ghost
            }
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["stackprov", "plan", "--install-root", "/srv"]).unwrap();
        assert_eq!(cli.install_root, PathBuf::from("/srv"));
        assert_eq!(cli.profile_file, PathBuf::from(DEFAULT_EXCHANGE_FILE));
    }
}
