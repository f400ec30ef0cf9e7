use thiserror::Error;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown transport {0:?}, expected udp or channel")]
pub struct UnknownTransport(pub String);

/// How frames travel between node workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// One loopback UDP socket per node.
    Udp,
    /// In-process channels, no sockets involved.
    Channel,
}

impl FromStr for TransportKind {
    type Err = UnknownTransport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "udp" => Ok(TransportKind::Udp),
            "channel" => Ok(TransportKind::Channel),
            other => Err(UnknownTransport(other.to_string())),
        }
    }
}

impl Display for TransportKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Udp => write!(f, "udp"),
            TransportKind::Channel => write!(f, "channel"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub transport: TransportKind,
    /// Node `n` (counting from one) listens on `base_port + n`.
    pub base_port: u16,
    pub poll_interval: Duration,
    pub topology: String,
}

impl SimConfig {
    pub const BASE_PORT: u16 = 4000;
    pub const POLL_INTERVAL_MS: u64 = 100;
    pub const DEFAULT_TOPOLOGY: &'static str = "linear-routing";
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            transport: TransportKind::Udp,
            base_port: Self::BASE_PORT,
            poll_interval: Duration::from_millis(Self::POLL_INTERVAL_MS),
            topology: Self::DEFAULT_TOPOLOGY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_names() {
        assert_eq!("udp".parse::<TransportKind>(), Ok(TransportKind::Udp));
        assert_eq!("channel".parse::<TransportKind>(), Ok(TransportKind::Channel));
        assert_eq!(
            "tcp".parse::<TransportKind>(),
            Err(UnknownTransport("tcp".into()))
        );
        assert_eq!(TransportKind::Channel.to_string(), "channel");
    }
}
