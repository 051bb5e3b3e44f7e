//! Network Isolation Controller
//!
//! Moves the machine between `online` and `ghost` (isolated) states and
//! offers two on-demand privacy tools: hardware address randomization and
//! secure erase.
//!
//! | Transition | Actions |
//! |------------|---------|
//! | → ghost    | interface management off, every non-loopback link down, outbound deny |
//! | → online   | outbound allow, interface management on, links up |

use crate::command_runner::run_command_safe;
use crate::commands::network::{
    FirewallEnableArgs, LinkStateArgs, NetworkingArgs, OutboundPolicy, OutboundPolicyArgs,
    SetHardwareAddressArgs,
};
use crate::erase::{secure_erase, EraseReport};
use crate::error::{ProvisionError, Result};
use crate::prompt::Confirmer;
use crate::run_log::RunLog;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

pub const LOOPBACK: &str = "lo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NetworkState {
    Online,
    Ghost,
}

/// Network operations, one method per primitive.
pub trait NetworkBackend {
    fn interfaces(&self) -> Result<Vec<String>>;
    fn set_link(&self, interface: &str, up: bool) -> Result<()>;
    fn set_outbound_policy(&self, policy: OutboundPolicy) -> Result<()>;
    /// Whether the system network manager may manage interfaces
    fn set_management(&self, enabled: bool) -> Result<()>;
    fn set_hardware_address(&self, interface: &str, address: &MacAddress) -> Result<()>;
}

/// `ip` / `ufw` / `nmcli` backend. Interfaces are listed from sysfs.
#[derive(Debug, Clone)]
pub struct CommandNetworkBackend {
    sysfs_net: PathBuf,
}

impl Default for CommandNetworkBackend {
    fn default() -> Self {
        Self::new("/sys/class/net")
    }
}

impl CommandNetworkBackend {
    pub fn new(sysfs_net: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_net: sysfs_net.into(),
        }
    }
}

impl NetworkBackend for CommandNetworkBackend {
    fn interfaces(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(&self.sysfs_net)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    fn set_link(&self, interface: &str, up: bool) -> Result<()> {
        let args = LinkStateArgs {
            interface: interface.to_string(),
            up,
        };
        run_command_safe(&args)?.ensure_success(&format!("ip link set {}", interface))?;
        Ok(())
    }

    fn set_outbound_policy(&self, policy: OutboundPolicy) -> Result<()> {
        run_command_safe(&OutboundPolicyArgs { policy })?
            .ensure_success("ufw default outgoing")?;
        run_command_safe(&FirewallEnableArgs)?.ensure_success("ufw enable")?;
        Ok(())
    }

    fn set_management(&self, enabled: bool) -> Result<()> {
        run_command_safe(&NetworkingArgs { enabled })?.ensure_success("nmcli networking")?;
        Ok(())
    }

    fn set_hardware_address(&self, interface: &str, address: &MacAddress) -> Result<()> {
        let args = SetHardwareAddressArgs {
            interface: interface.to_string(),
            address: address.to_string(),
        };
        run_command_safe(&args)?.ensure_success(&format!("ip link set {} address", interface))?;
        Ok(())
    }
}

// ============================================================================
// Hardware address
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Random unicast address with the locally administered bit set
    pub fn random_local() -> Self {
        Self::random_local_with(&mut rand::thread_rng())
    }

    pub fn random_local_with(rng: &mut impl RngCore) -> Self {
        let mut bytes = [0u8; 6];
        rng.fill_bytes(&mut bytes);
        bytes[0] = (bytes[0] & 0b1111_1100) | 0b0000_0010;
        Self(bytes)
    }

    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & 0b10 != 0
    }

    pub fn is_unicast(&self) -> bool {
        self.0[0] & 0b1 == 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct NetworkIsolationController<'a> {
    backend: &'a dyn NetworkBackend,
    log: &'a RunLog,
}

impl<'a> NetworkIsolationController<'a> {
    pub fn new(backend: &'a dyn NetworkBackend, log: &'a RunLog) -> Self {
        Self { backend, log }
    }

    /// Move to `target`.
    ///
    /// Every step is attempted even if an earlier one fails, so a partial
    /// failure still isolates as much as possible. Interface management is
    /// best effort (not every system runs a network manager).
    pub fn set_state(&self, target: NetworkState) -> Result<()> {
        self.log.info(format!("Switching network to {} mode", target));
        let links: Vec<String> = self
            .backend
            .interfaces()?
            .into_iter()
            .filter(|name| name != LOOPBACK)
            .collect();

        let mut failures = Vec::new();
        match target {
            NetworkState::Ghost => {
                self.management(false);
                for link in &links {
                    if let Err(e) = self.backend.set_link(link, false) {
                        failures.push(format!("{} down: {}", link, e));
                    }
                }
                if let Err(e) = self.backend.set_outbound_policy(OutboundPolicy::Deny) {
                    failures.push(format!("outbound deny: {}", e));
                }
            }
            NetworkState::Online => {
                if let Err(e) = self.backend.set_outbound_policy(OutboundPolicy::Allow) {
                    failures.push(format!("outbound allow: {}", e));
                }
                self.management(true);
                for link in &links {
                    if let Err(e) = self.backend.set_link(link, true) {
                        failures.push(format!("{} up: {}", link, e));
                    }
                }
            }
        }

        if failures.is_empty() {
            self.log.success(format!(
                "Network is {} ({} interface(s) affected)",
                target,
                links.len()
            ));
            Ok(())
        } else {
            for failure in &failures {
                self.log.error(failure);
            }
            Err(ProvisionError::command(format!(
                "switching to {} mode incomplete: {}",
                target,
                failures.join("; ")
            )))
        }
    }

    fn management(&self, enabled: bool) {
        if let Err(e) = self.backend.set_management(enabled) {
            self.log.warning(format!(
                "Could not turn interface management {}: {}",
                if enabled { "on" } else { "off" },
                e
            ));
        }
    }

    /// Cycle `interface` down, assign a random address, bring it back up.
    ///
    /// The link is always brought back up, even when the address change
    /// fails. Returns the new address.
    pub fn randomize_identity(&self, interface: &str) -> Result<MacAddress> {
        if interface == LOOPBACK {
            return Err(ProvisionError::validation(
                "refusing to change the loopback interface",
            ));
        }
        if !self.backend.interfaces()?.iter().any(|name| name == interface) {
            return Err(ProvisionError::validation(format!(
                "no such interface '{}'",
                interface
            )));
        }

        let address = MacAddress::random_local();
        self.backend.set_link(interface, false)?;
        let assigned = self.backend.set_hardware_address(interface, &address);
        let restored = self.backend.set_link(interface, true);

        assigned?;
        restored?;
        self.log
            .success(format!("{} now uses hardware address {}", interface, address));
        Ok(address)
    }

    /// Irreversibly overwrite and delete `target` after double confirmation.
    pub fn secure_erase(&self, target: &Path, confirmer: &mut dyn Confirmer) -> Result<EraseReport> {
        secure_erase(self.log, target, confirmer)
    }
}
