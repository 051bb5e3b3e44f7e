//! Lifecycle of spawned installer processes
//!
//! Package managers, model pulls and downloads run as child processes. If the
//! orchestrator is interrupted, those children must not keep mutating the
//! machine unsupervised. Every child is therefore:
//!
//! - spawned in its own process group with a parent-death signal
//! - recorded in a global registry while it runs
//! - stopped (SIGTERM, then SIGKILL after a grace period) when the
//!   orchestrator receives SIGINT/SIGTERM/SIGHUP

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

/// How long children get to exit after SIGTERM before SIGKILL
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(3);

static CHILDREN: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// What `stop_all` had to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Groups sent SIGTERM
    pub terminated: usize,
    /// Groups still alive after the grace period
    pub killed: usize,
}

/// Registry of running child process ids
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: BTreeSet<u32>,
    stopping: bool,
}

impl ChildRegistry {
    /// Process-wide registry shared by all command invocations
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILDREN
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        tracing::debug!(pid, "child registered");
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        tracing::debug!(pid, "child finished");
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// Stop every tracked process group. Only the first call does anything.
    pub fn stop_all(&mut self, grace_period: Duration) -> StopReport {
        if self.stopping {
            return StopReport::default();
        }
        self.stopping = true;

        let pids: Vec<u32> = std::mem::take(&mut self.pids).into_iter().collect();
        if pids.is_empty() {
            return StopReport::default();
        }
        tracing::info!("Stopping {} child process group(s)", pids.len());

        for &pid in &pids {
            send(pid, Signal::SIGTERM);
        }

        let deadline = Instant::now() + grace_period;
        let mut remaining: Vec<u32> = pids.clone();
        while !remaining.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(100));
            remaining.retain(|&pid| is_running(pid));
        }
        remaining.retain(|&pid| is_running(pid));

        for &pid in &remaining {
            tracing::warn!("Process group {} ignored SIGTERM, sending SIGKILL", pid);
            send(pid, Signal::SIGKILL);
        }

        StopReport {
            terminated: pids.len(),
            killed: remaining.len(),
        }
    }
}

/// Signal the whole group (negative pid) so helpers spawned by the package
/// manager are reached too; fall back to the leader alone.
fn send(pid: u32, sig: Signal) {
    let leader = Pid::from_raw(pid as i32);
    if signal::kill(Pid::from_raw(-(pid as i32)), sig).is_err() {
        if let Err(e) = signal::kill(leader, sig) {
            tracing::debug!("{:?} to {} failed: {}", sig, pid, e);
        }
    }
}

/// Exists and is neither zombie nor dead
fn is_running(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    match proc_state(pid) {
        Some(state) => !matches!(state, 'Z' | 'X'),
        None => true,
    }
}

/// Third field of `/proc/<pid>/stat`
fn proc_state(pid: u32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // comm may contain spaces; the state follows the closing paren
    let after_comm = &stat[stat.rfind(')')? + 1..];
    after_comm.trim_start().chars().next()
}

/// Install SIGINT/SIGTERM/SIGHUP handlers that stop registered children
/// and exit with `128 + signal`. Call once at startup.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            tracing::warn!("Interrupted by signal {}", sig);
            if let Ok(mut registry) = ChildRegistry::global().lock() {
                let report = registry.stop_all(STOP_GRACE_PERIOD);
                tracing::warn!(
                    terminated = report.terminated,
                    killed = report.killed,
                    "child processes stopped"
                );
            }
            std::process::exit(128 + sig);
        }
    });
    Ok(())
}

/// Run a `Command` in its own process group, dying with the parent
pub trait CommandProcessGroup {
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: only async-signal-safe calls (setpgid, prctl) run between
        // fork and exec.
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::from)?;
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}
