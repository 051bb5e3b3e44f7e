//! Package installation capability
//!
//! Stages depend on `PackageInstaller`, never on a specific package
//! manager's invocation syntax. `SystemPackageInstaller` is the production
//! implementation; it detects the host's package manager once.

use crate::command_runner::run_command_safe;
use crate::commands::packages::{InstallPackagesArgs, PackageManagerKind};
use crate::error::{ProvisionError, Result};
use crate::tools::binary_exists;

/// Installs named packages.
pub trait PackageInstaller {
    fn install(&self, names: &[&str]) -> Result<()>;
}

/// Installs through the detected system package manager.
#[derive(Debug, Clone, Copy)]
pub struct SystemPackageInstaller {
    manager: PackageManagerKind,
}

impl SystemPackageInstaller {
    pub fn new(manager: PackageManagerKind) -> Self {
        Self { manager }
    }

    /// Find the first supported package manager on PATH.
    ///
    /// # Errors
    ///
    /// `Dependency` if none of apt-get, dnf or pacman is available.
    pub fn detect() -> Result<Self> {
        PackageManagerKind::ALL
            .into_iter()
            .find(|m| binary_exists(m.binary()))
            .map(Self::new)
            .ok_or_else(|| {
                ProvisionError::dependency(
                    "package manager",
                    "none of apt-get, dnf, pacman found on PATH",
                )
            })
    }

    pub fn manager(&self) -> PackageManagerKind {
        self.manager
    }
}

impl PackageInstaller for SystemPackageInstaller {
    fn install(&self, names: &[&str]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let args = InstallPackagesArgs {
            manager: self.manager,
            packages: names.iter().map(|n| n.to_string()).collect(),
        };
        run_command_safe(&args)?.ensure_success(&format!("{} install", self.manager))?;
        Ok(())
    }
}
