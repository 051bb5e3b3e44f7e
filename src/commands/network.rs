//! Typed arguments for network isolation commands:
//! - `LinkStateArgs` for `ip link set dev <if> up|down`
//! - `SetHardwareAddressArgs` for `ip link set dev <if> address <mac>`
//! - `OutboundPolicyArgs` for `ufw default <allow|deny> outgoing`
//! - `FirewallEnableArgs` for `ufw --force enable`
//! - `NetworkingArgs` for `nmcli networking on|off`

use crate::command_runner::CommandArgs;

/// Default policy for outbound traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundPolicy {
    Allow,
    Deny,
}

impl OutboundPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkStateArgs {
    pub interface: String,
    pub up: bool,
}

impl CommandArgs for LinkStateArgs {
    fn program(&self) -> &'static str {
        "ip"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "link".to_string(),
            "set".to_string(),
            "dev".to_string(),
            self.interface.clone(),
            if self.up { "up" } else { "down" }.to_string(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct SetHardwareAddressArgs {
    pub interface: String,
    /// Colon-separated lowercase hex, e.g. `02:1a:2b:3c:4d:5e`
    pub address: String,
}

impl CommandArgs for SetHardwareAddressArgs {
    fn program(&self) -> &'static str {
        "ip"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "link".to_string(),
            "set".to_string(),
            "dev".to_string(),
            self.interface.clone(),
            "address".to_string(),
            self.address.clone(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct OutboundPolicyArgs {
    pub policy: OutboundPolicy,
}

impl CommandArgs for OutboundPolicyArgs {
    fn program(&self) -> &'static str {
        "ufw"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "default".to_string(),
            self.policy.as_str().to_string(),
            "outgoing".to_string(),
        ]
    }
}

/// `--force` skips ufw's own y/n prompt; the orchestrator does its own
/// confirmation.
#[derive(Debug, Clone, Default)]
pub struct FirewallEnableArgs;

impl CommandArgs for FirewallEnableArgs {
    fn program(&self) -> &'static str {
        "ufw"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["--force".to_string(), "enable".to_string()]
    }
}

/// Toggles NetworkManager's control over interfaces. With management off it
/// will not bring links back up behind our back.
#[derive(Debug, Clone)]
pub struct NetworkingArgs {
    pub enabled: bool,
}

impl CommandArgs for NetworkingArgs {
    fn program(&self) -> &'static str {
        "nmcli"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "networking".to_string(),
            if self.enabled { "on" } else { "off" }.to_string(),
        ]
    }
}
