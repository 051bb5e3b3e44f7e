//! Service health probing over local TCP ports.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

/// Port the model runtime listens on
pub const MODEL_RUNTIME_PORT: u16 = 11434;

/// Port of the image-generation UI
pub const IMAGE_GEN_PORT: u16 = 8188;

/// Checks whether a local service answers.
pub trait ServiceProbe: Send + Sync {
    /// Single read-only check
    fn is_listening(&self, port: u16) -> bool;

    /// Poll until the port answers or `timeout` passes.
    fn wait_until_ready(&self, port: u16, timeout: Duration) -> bool;
}

/// Connects to `127.0.0.1:<port>`.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl ServiceProbe for TcpProbe {
    fn is_listening(&self, port: u16) -> bool {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        TcpStream::connect_timeout(&addr, self.connect_timeout).is_ok()
    }

    fn wait_until_ready(&self, port: u16, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_listening(port) {
                return true;
            }
            if Instant::now() >= deadline {
                tracing::debug!("Port {} did not answer within {:?}", port, timeout);
                return false;
            }
            thread::sleep(self.poll_interval);
        }
    }
}
