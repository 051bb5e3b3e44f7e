//! Required external tools
//!
//! Checks whether binaries are on PATH and, when one is missing, asks the
//! package installer for it before giving up with a dependency error.

use crate::context::RunContext;
use crate::error::{ProvisionError, Result};
use crate::installer::PackageInstaller;
use crate::process_guard::CommandProcessGroup;
use std::process::Command;

/// A binary the run needs and the package that provides it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolRequirement {
    pub binary: &'static str,
    pub package: &'static str,
}

impl ToolRequirement {
    pub const fn new(binary: &'static str, package: &'static str) -> Self {
        Self { binary, package }
    }
}

/// Tools the orchestrator itself drives
pub const CORE_TOOLS: &[ToolRequirement] = &[
    ToolRequirement::new("curl", "curl"),
    ToolRequirement::new("ip", "iproute2"),
];

/// Check if a binary is available in PATH
pub fn binary_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .in_new_process_group()
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Check if running as root (EUID 0)
pub fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// The account installed tools operate under.
///
/// When invoked through sudo this is the calling user; otherwise the
/// current `USER`.
pub fn run_identity() -> Option<String> {
    std::env::var("SUDO_USER")
        .ok()
        .or_else(|| std::env::var("USER").ok())
        .filter(|u| !u.is_empty() && u != "root")
}

/// Make sure `tool` is usable, installing its package if needed.
///
/// `probe` decides whether the binary is present; production callers pass
/// `binary_exists`.
///
/// # Errors
///
/// `ProvisionError::Dependency` if the tool is still missing after the
/// installation attempt.
pub fn ensure_tool(
    ctx: &RunContext,
    installer: &dyn PackageInstaller,
    tool: ToolRequirement,
    probe: &dyn Fn(&str) -> bool,
) -> Result<()> {
    if probe(tool.binary) {
        return Ok(());
    }

    ctx.log().warning(format!(
        "'{}' not found, installing package '{}'",
        tool.binary, tool.package
    ));
    if let Err(e) = installer.install(&[tool.package]) {
        return Err(ProvisionError::dependency(
            tool.binary,
            format!("auto-install of '{}' failed: {}", tool.package, e),
        ));
    }

    if probe(tool.binary) {
        ctx.log().success(format!("Installed '{}'", tool.binary));
        Ok(())
    } else {
        Err(ProvisionError::dependency(
            tool.binary,
            format!("still missing after installing '{}'", tool.package),
        ))
    }
}
