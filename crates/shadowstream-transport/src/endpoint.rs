use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Host the Shadow app listens on when running on the same machine.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port of the Configurable data service.
pub const DEFAULT_PORT: u16 = 32076;

/// Network location of a Shadow data service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolve the endpoint to the socket addresses it names.
    pub fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                endpoint: self.to_string(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::Resolve {
                endpoint: self.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "host resolved to no addresses",
                ),
            });
        }

        Ok(addrs)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = || TransportError::InvalidEndpoint(input.to_string());

        let (host, port) = input.rsplit_once(':').ok_or_else(invalid)?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(invalid());
        }
        let port: u16 = port.parse().map_err(|_| invalid())?;

        Ok(Self::new(host, port))
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_local_configurable_service() {
        let endpoint = Endpoint::default();
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 32076);
        assert_eq!(endpoint.to_string(), "127.0.0.1:32076");
    }

    #[test]
    fn parses_host_and_port() {
        let endpoint: Endpoint = "shadow.local:4000".parse().unwrap();
        assert_eq!(endpoint, Endpoint::new("shadow.local", 4000));
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let endpoint: Endpoint = "[::1]:32076".parse().unwrap();
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.to_string(), "[::1]:32076");
    }

    #[test]
    fn rejects_missing_or_bad_port() {
        assert!(matches!(
            "localhost".parse::<Endpoint>(),
            Err(TransportError::InvalidEndpoint(_))
        ));
        assert!("localhost:port".parse::<Endpoint>().is_err());
        assert!(":32076".parse::<Endpoint>().is_err());
    }

    #[test]
    fn resolves_loopback() {
        let addrs = Endpoint::default().resolve().unwrap();
        assert!(addrs.iter().any(|addr| addr.port() == DEFAULT_PORT));
    }

    #[test]
    fn from_socket_addr() {
        let addr: SocketAddr = "10.0.0.2:9000".parse().unwrap();
        assert_eq!(Endpoint::from(addr), Endpoint::new("10.0.0.2", 9000));
    }
}
