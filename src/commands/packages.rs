//! Typed arguments for the system package manager.

use crate::command_runner::CommandArgs;
use std::fmt;

/// Supported system package managers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManagerKind {
    Apt,
    Dnf,
    Pacman,
}

impl PackageManagerKind {
    /// Probe order when detecting the host's package manager
    pub const ALL: [Self; 3] = [Self::Apt, Self::Dnf, Self::Pacman];

    pub const fn binary(self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
        }
    }
}

impl fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Non-interactive install of one or more packages.
///
/// | Manager | Command |
/// |---------|---------|
/// | apt     | `apt-get install -y --no-install-recommends <pkgs>` |
/// | dnf     | `dnf install -y <pkgs>` |
/// | pacman  | `pacman -S --needed --noconfirm <pkgs>` |
#[derive(Debug, Clone)]
pub struct InstallPackagesArgs {
    pub manager: PackageManagerKind,
    pub packages: Vec<String>,
}

impl CommandArgs for InstallPackagesArgs {
    fn program(&self) -> &'static str {
        self.manager.binary()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args: Vec<String> = match self.manager {
            PackageManagerKind::Apt => vec!["install", "-y", "--no-install-recommends"],
            PackageManagerKind::Dnf => vec!["install", "-y"],
            PackageManagerKind::Pacman => vec!["-S", "--needed", "--noconfirm"],
        }
        .into_iter()
        .map(String::from)
        .collect();
        args.extend(self.packages.iter().cloned());
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        match self.manager {
            PackageManagerKind::Apt => {
                vec![("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())]
            }
            _ => vec![],
        }
    }
}
