//! Transport configuration, derived with [`serde`] so it can be written
//! inline in tests or loaded from a TOML snippet.

use std::{net::SocketAddr, str::FromStr};

use serde::{Deserialize, Serialize};

/// Configuration of a single [`crate::Server`]. Every field has a default,
/// so an empty TOML document is a valid configuration:
///
/// ```toml
/// listen = "127.0.0.1:0"   # Port 0 lets the OS pick a free port.
/// connections = 1024       # Maximum number of open connections.
/// backlog = 1024           # Listen backlog of the TCP socket.
/// name = "users-api"       # Optional name shown in logs.
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Server {
    /// Socket address where the server listens.
    #[serde(default = "default::listen")]
    pub listen: SocketAddr,

    /// Connections are limited to this number. Once reached, the server
    /// stops accepting until one of the open connections is closed.
    #[serde(default = "default::connections")]
    pub connections: usize,

    /// Backlog passed to `listen(2)`.
    #[serde(default = "default::backlog")]
    pub backlog: u32,

    /// Optional server name to show in logs.
    pub name: Option<String>,
}

impl Server {
    /// Parses a configuration from TOML.
    pub fn from_toml(source: &str) -> Result<Self, crate::Error> {
        Ok(toml::from_str(source)?)
    }

    /// Name used in log lines: the listening address plus the optional
    /// user-provided name.
    pub(crate) fn log_name(&self, address: SocketAddr) -> String {
        match self.name {
            Some(ref name) => format!("{address} ({name})"),
            None => address.to_string(),
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            listen: default::listen(),
            connections: default::connections(),
            backlog: default::backlog(),
            name: None,
        }
    }
}

impl FromStr for Server {
    type Err = crate::Error;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::from_toml(source)
    }
}

mod default {
    //! Default values for some configuration options.

    use std::net::{Ipv4Addr, SocketAddr};

    pub fn listen() -> SocketAddr {
        (Ipv4Addr::LOCALHOST, 0).into()
    }

    pub fn connections() -> usize {
        1024
    }

    pub fn backlog() -> u32 {
        1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Server::from_toml("").unwrap();

        assert_eq!(config, Server::default());
        assert_eq!(config.listen, "127.0.0.1:0".parse().unwrap());
        assert_eq!(config.connections, 1024);
    }

    #[test]
    fn explicit_values() {
        let config: Server = r#"
            listen = "127.0.0.1:8100"
            connections = 4
            name = "colors"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.listen, "127.0.0.1:8100".parse().unwrap());
        assert_eq!(config.connections, 4);
        assert_eq!(config.backlog, 1024);
        assert_eq!(
            config.log_name(config.listen),
            "127.0.0.1:8100 (colors)"
        );
    }

    #[test]
    fn invalid_address() {
        assert!(matches!(
            Server::from_toml(r#"listen = "not an address""#),
            Err(crate::Error::Config(_))
        ));
    }
}
