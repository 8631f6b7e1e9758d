use std::net::{SocketAddr, ToSocketAddrs};
use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub server: ServerConfig,
}

/// This node's endpoint: the address announced in heartbeats, the port the
/// snapshot listener binds, and the directory whose contents are announced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub address: String,
    pub port: u16,
    pub share_dir: String,
}

/// The rendezvous server heartbeats are sent to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig {
                address: "127.0.0.1".to_string(),
                port: 7001,
                share_dir: "./share".to_string(),
            },
            server: ServerConfig {
                address: "127.0.0.1".to_string(),
                port: 5050,
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file falls back to the defaults with a warning; a file
    /// that exists but does not parse is a hard error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "config file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the rendezvous server to a socket address
    pub fn server_addr(&self) -> Result<SocketAddr> {
        let target = format!("{}:{}", self.server.address, self.server.port);
        target
            .to_socket_addrs()
            .with_context(|| format!("resolving server address {}", target))?
            .next()
            .ok_or_else(|| anyhow!("no usable address for {}", target))
    }

    /// The wildcard bind address for the snapshot listener
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.node.port))
    }
}
