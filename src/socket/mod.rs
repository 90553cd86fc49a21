//! Socket layer: the ICMP echo transport used by the monitor

pub mod factory;
pub mod icmp_v4;
pub mod utils;

use serde::{Deserialize, Serialize};

pub use factory::create_icmp_socket;
pub use icmp_v4::IcmpEchoTransport;

/// Kind of ICMP socket the echo transport runs on
///
/// A raw socket sees every ICMP message on the host and reports the reply
/// TTL, but needs root or `CAP_NET_RAW`. A datagram ICMP socket only sees
/// replies to its own requests; Linux allows it for groups listed in
/// `net.ipv4.ping_group_range` and hides the IP header, macOS allows it for
/// everyone, and the BSDs not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketMode {
    /// `SOCK_RAW` with `IPPROTO_ICMP`
    Raw,
    /// `SOCK_DGRAM` with `IPPROTO_ICMP`
    Dgram,
}

impl SocketMode {
    /// Short name for logs and reports
    pub fn description(&self) -> &'static str {
        match self {
            SocketMode::Raw => "Raw",
            SocketMode::Dgram => "Datagram",
        }
    }
}
