//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use crate::parser::DecoderLimits;

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 4567;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// Length of the pending-connection queue passed to `listen`.
    pub backlog: u32,
    /// Request size limits enforced on every connection.
    pub limits: DecoderLimits,
    /// How long shutdown waits for open connections to finish.
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Bind to all interfaces on `port`, keeping the other settings.
    pub fn with_port(mut self, port: u16) -> Self {
        self.addr = SocketAddr::from(([0, 0, 0, 0], port));
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            backlog: 1024,
            limits: DecoderLimits::default(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}
