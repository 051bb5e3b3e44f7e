//! Fake collaborators shared by the integration tests.

#![allow(dead_code)]

use stackprov::download::{ArtifactClient, Sleeper};
use stackprov::error::{ProvisionError, Result};
use stackprov::health::ServiceProbe;
use stackprov::installer::PackageInstaller;
use stackprov::network::{MacAddress, NetworkBackend};
use stackprov::commands::network::OutboundPolicy;
use stackprov::prompt::Confirmer;
use stackprov::run_log::RunLog;
use stackprov::types::Architecture;
use stackprov::HardwareProfile;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn profile(ram_gb: u64, disk_available_gb: u64) -> HardwareProfile {
    HardwareProfile {
        architecture: Architecture::X86_64,
        ram_gb,
        cpu_cores: 8,
        disk_available_gb,
        ..Default::default()
    }
}

pub fn always_present(_binary: &str) -> bool {
    true
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn captured_log() -> (RunLog, SharedBuf) {
    let buf = SharedBuf::default();
    (RunLog::to_writer(buf.clone()), buf)
}

// ---------------------------------------------------------------------------
// Package installer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeInstaller {
    pub calls: Mutex<Vec<Vec<String>>>,
    pub failing_package: Option<&'static str>,
}

impl FakeInstaller {
    pub fn failing_on(package: &'static str) -> Self {
        Self {
            failing_package: Some(package),
            ..Default::default()
        }
    }

    pub fn installed(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().flatten().cloned().collect()
    }
}

impl PackageInstaller for FakeInstaller {
    fn install(&self, names: &[&str]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(names.iter().map(|n| n.to_string()).collect());
        match self.failing_package {
            Some(bad) if names.contains(&bad) => {
                Err(ProvisionError::command(format!("unable to locate package {}", bad)))
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Every fetch succeeds unless told otherwise.
#[derive(Default)]
pub struct FakeArtifacts {
    /// Remaining failures per artifact id
    failures: Mutex<HashMap<String, u32>>,
    /// Fetch reports success but the artifact never appears
    phantom: HashSet<String>,
    present: Mutex<HashSet<String>>,
    pub fetch_log: Mutex<Vec<String>>,
}

impl FakeArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self, id: &str, times: u32) -> Self {
        self.failures.lock().unwrap().insert(id.to_string(), times);
        self
    }

    pub fn always_failing(self, id: &str) -> Self {
        self.failing(id, u32::MAX)
    }

    pub fn phantom(mut self, id: &str) -> Self {
        self.phantom.insert(id.to_string());
        self
    }

    pub fn fetches_of(&self, id: &str) -> usize {
        self.fetch_log.lock().unwrap().iter().filter(|f| *f == id).count()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetch_log.lock().unwrap().clone()
    }
}

impl ArtifactClient for FakeArtifacts {
    fn fetch(&self, artifact_id: &str) -> Result<()> {
        self.fetch_log.lock().unwrap().push(artifact_id.to_string());
        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(artifact_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProvisionError::command(format!("connection reset ({})", artifact_id)));
            }
        }
        if !self.phantom.contains(artifact_id) {
            self.present.lock().unwrap().insert(artifact_id.to_string());
        }
        Ok(())
    }

    fn is_present(&self, artifact_id: &str) -> bool {
        self.present.lock().unwrap().contains(artifact_id)
    }
}

// ---------------------------------------------------------------------------
// Sleeper / probe
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub struct FakeProbe {
    /// Answer for `wait_until_ready`
    pub becomes_ready: bool,
    /// Answer for `is_listening`
    pub listening: bool,
}

impl FakeProbe {
    pub fn healthy() -> Self {
        Self {
            becomes_ready: true,
            listening: true,
        }
    }
}

impl ServiceProbe for FakeProbe {
    fn is_listening(&self, _port: u16) -> bool {
        self.listening
    }

    fn wait_until_ready(&self, _port: u16, _timeout: Duration) -> bool {
        self.becomes_ready
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

pub struct FakeNetwork {
    pub links: Vec<String>,
    pub calls: Mutex<Vec<String>>,
    pub failing_link: Option<String>,
    pub failing_address: bool,
}

impl FakeNetwork {
    pub fn new(links: &[&str]) -> Self {
        Self {
            links: links.iter().map(|l| l.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
            failing_link: None,
            failing_address: false,
        }
    }

    pub fn recorded(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl NetworkBackend for FakeNetwork {
    fn interfaces(&self) -> Result<Vec<String>> {
        Ok(self.links.clone())
    }

    fn set_link(&self, interface: &str, up: bool) -> Result<()> {
        self.record(format!("link {} {}", interface, if up { "up" } else { "down" }));
        if self.failing_link.as_deref() == Some(interface) {
            return Err(ProvisionError::command(format!("{}: operation not permitted", interface)));
        }
        Ok(())
    }

    fn set_outbound_policy(&self, policy: OutboundPolicy) -> Result<()> {
        self.record(format!("outbound {}", policy.as_str()));
        Ok(())
    }

    fn set_management(&self, enabled: bool) -> Result<()> {
        self.record(format!("management {}", if enabled { "on" } else { "off" }));
        Ok(())
    }

    fn set_hardware_address(&self, interface: &str, address: &MacAddress) -> Result<()> {
        self.record(format!("address {} {}", interface, address));
        if self.failing_address {
            return Err(ProvisionError::command("cannot assign requested address"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Confirmation
// ---------------------------------------------------------------------------

pub struct ScriptedConfirmer {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
}

impl ScriptedConfirmer {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            prompts: Vec::new(),
        }
    }
}

impl Confirmer for ScriptedConfirmer {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}
