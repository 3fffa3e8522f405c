//! Read-only node diagnostics. None of these affect object lifecycle.

use std::fmt;
use std::time::Duration;

/// Identity and capabilities of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: String,
    pub public_key: String,
    pub addresses: Vec<String>,
    pub agent_version: String,
    pub protocols: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
    Unknown,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
            Direction::Unknown => "unknown",
        })
    }
}

/// A currently connected peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: String,
    pub address: String,
    pub direction: Direction,
    pub latency: Option<Duration>,
}

/// One line of a ping exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResult {
    pub success: bool,
    pub text: String,
    pub time: Duration,
}
