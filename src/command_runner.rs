//! Type-safe external command execution
//!
//! Every external tool invocation (package manager, model registry, curl,
//! ip, ufw, nmcli) goes through `run_command_safe`, which takes a typed
//! `CommandArgs` value instead of raw string vectors. This gives:
//!
//! - one place where argument vectors are built, per tool, with tests
//! - process group isolation and child registration for every spawn
//! - the exact command line in the log before anything runs

use crate::error::{ProvisionError, Result};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use std::process::{Command, Stdio};

/// Typed arguments for one external command.
///
/// # Contract
///
/// - `program()`: binary name, resolved through PATH at spawn time
/// - `to_cli_args()`: arguments exactly as the tool expects them
/// - `get_env_vars()`: extra environment for the child
pub trait CommandArgs {
    fn program(&self) -> &'static str;

    fn to_cli_args(&self) -> Vec<String>;

    fn get_env_vars(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Whether the command changes machine state
    fn is_destructive(&self) -> bool {
        true
    }
}

/// Output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// None if terminated by signal
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    /// Turn a non-zero exit into `ProvisionError::Command`.
    pub fn ensure_success(self, context: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(ProvisionError::command(format!(
                "{} failed (exit code {}): {}",
                context,
                self.exit_code.unwrap_or(-1),
                self.stderr.trim()
            )))
        }
    }
}

/// Spawn `args` in a new process group, wait for it, and capture output.
///
/// A non-zero exit is returned as `Ok` with `success == false`; only spawn
/// and wait failures are errors.
pub fn run_command_safe<T: CommandArgs + ?Sized>(args: &T) -> Result<CommandOutput> {
    let program = args.program();
    let cli_args = args.to_cli_args();
    let env_vars = args.get_env_vars();

    tracing::info!(
        "run_command_safe: {} args={:?} destructive={}",
        program,
        cli_args,
        args.is_destructive()
    );

    let mut cmd = Command::new(program);
    cmd.args(&cli_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .in_new_process_group();
    for (key, value) in &env_vars {
        cmd.env(key, value);
    }

    let child = cmd
        .spawn()
        .map_err(|e| ProvisionError::command(format!("failed to spawn {}: {}", program, e)))?;
    let pid = child.id();
    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.register(pid);
    }

    let waited = child.wait_with_output();

    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.unregister(pid);
    }
    let output = waited
        .map_err(|e| ProvisionError::command(format!("failed waiting for {}: {}", program, e)))?;

    let exit_code = output.status.code();
    if !output.status.success() {
        tracing::info!("{} exited with code {}", program, exit_code.unwrap_or(-1));
    }
    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code,
        success: output.status.success(),
    })
}
