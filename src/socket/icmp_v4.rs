//! IPv4 ICMP echo transport

use super::factory::create_icmp_socket;
use super::SocketMode;
use crate::dns::HostResolver;
use crate::probe::{ProbeOutcome, ProbeRequest, ProbeTransport};
use anyhow::{anyhow, Context, Result};
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpPacket, IcmpTypes};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use pnet::util::checksum as pnet_checksum;
use socket2::Socket as Socket2;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Size of ICMP echo payload
const ICMP_ECHO_PAYLOAD_SIZE: usize = 16;
/// IPv4 header minimum length in bytes
const IPV4_HEADER_MIN_LEN_BYTES: usize = 20;
/// Receive buffer size
const RECV_BUFFER_LEN: usize = 1500;

/// Room for the ancillary data of one datagram
#[cfg(target_os = "linux")]
#[repr(C, align(8))]
struct ControlBuffer([u8; 64]);

/// Fields of a received echo reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoReply {
    /// ICMP identifier
    pub identifier: u16,
    /// ICMP sequence number
    pub sequence: u16,
    /// TTL from the IP header, when the socket delivers it
    pub ttl: Option<u8>,
    /// Source address from the IP header, when the socket delivers it
    pub source: Option<Ipv4Addr>,
}

/// Build an ICMP echo request packet
pub fn build_echo_request(identifier: u16, sequence: u16) -> Result<Vec<u8>> {
    let mut icmp_buf =
        vec![0u8; MutableEchoRequestPacket::minimum_packet_size() + ICMP_ECHO_PAYLOAD_SIZE];
    let mut echo_req_packet = MutableEchoRequestPacket::new(&mut icmp_buf)
        .ok_or_else(|| anyhow!("Failed to create ICMP packet"))?;

    echo_req_packet.set_icmp_type(IcmpTypes::EchoRequest);
    echo_req_packet.set_icmp_code(pnet::packet::icmp::IcmpCode(0));
    echo_req_packet.set_identifier(identifier);
    echo_req_packet.set_sequence_number(sequence);

    // Payload carries identifier and sequence for validation
    let payload_data = (identifier as u32) << 16 | (sequence as u32);
    let mut final_payload = [0u8; ICMP_ECHO_PAYLOAD_SIZE];
    final_payload[..4].copy_from_slice(&payload_data.to_be_bytes());
    echo_req_packet.set_payload(&final_payload);

    let checksum = pnet_checksum(echo_req_packet.packet(), 1);
    echo_req_packet.set_checksum(checksum);

    Ok(icmp_buf)
}

impl EchoReply {
    /// Fill in the TTL from ancillary data when the packet itself lacked it
    pub fn or_ttl(self, ttl: Option<u8>) -> Self {
        Self {
            ttl: self.ttl.or(ttl),
            ..self
        }
    }
}

/// Receive one datagram together with the TTL the kernel attached to it
///
/// Linux datagram ICMP sockets strip the IP header, so the reply TTL is only
/// available as an `IP_TTL` control message (enabled with `IP_RECVTTL`).
#[cfg(target_os = "linux")]
fn recv_with_ttl(socket: &Socket2, buf: &mut [u8]) -> std::io::Result<(usize, Option<u8>)> {
    use std::os::fd::AsRawFd;

    let mut control = ControlBuffer([0u8; 64]);
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr().cast(),
        iov_len: buf.len(),
    };

    // SAFETY: an all-zero msghdr is valid; every pointer set below refers to a
    // buffer that outlives the recvmsg call
    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.0.as_mut_ptr().cast();
    msg.msg_controllen = control.0.len() as _;

    // SAFETY: the descriptor is owned by `socket` and `msg` is initialised above
    let received = unsafe { libc::recvmsg(socket.as_raw_fd(), &mut msg, libc::MSG_DONTWAIT) };
    if received < 0 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: the kernel filled `msg_control` and set `msg_controllen`
    let ttl = unsafe { ttl_from_control(&msg) };
    Ok((received as usize, ttl))
}

/// TTL carried by an `IP_TTL` control message of `msg`
///
/// # Safety
///
/// `msg.msg_control` must point to `msg.msg_controllen` readable bytes.
#[cfg(target_os = "linux")]
unsafe fn ttl_from_control(msg: &libc::msghdr) -> Option<u8> {
    let mut cmsg = libc::CMSG_FIRSTHDR(msg);
    while !cmsg.is_null() {
        let header = std::ptr::read_unaligned(cmsg);
        if header.cmsg_level == libc::IPPROTO_IP && header.cmsg_type == libc::IP_TTL {
            let ttl = std::ptr::read_unaligned(libc::CMSG_DATA(cmsg).cast::<libc::c_int>());
            return u8::try_from(ttl).ok();
        }
        cmsg = libc::CMSG_NXTHDR(msg, cmsg);
    }
    None
}

/// Parse a received datagram as an echo reply
///
/// Raw sockets (and datagram sockets on macOS) deliver the IPv4 header in
/// front of the ICMP message; Linux datagram sockets deliver the bare ICMP
/// message, in which case TTL and source are unknown.
pub fn parse_echo_reply(data: &[u8]) -> Option<EchoReply> {
    let has_ip_header = data.len() >= IPV4_HEADER_MIN_LEN_BYTES && data[0] >> 4 == 4;

    let (icmp_data, ttl, source) = if has_ip_header {
        let ipv4_packet = Ipv4Packet::new(data)?;
        let header_len = usize::from(ipv4_packet.get_header_length()) * 4;
        if header_len < IPV4_HEADER_MIN_LEN_BYTES || header_len > data.len() {
            return None;
        }
        (
            &data[header_len..],
            Some(ipv4_packet.get_ttl()),
            Some(ipv4_packet.get_source()),
        )
    } else {
        (data, None, None)
    };

    let icmp_packet = IcmpPacket::new(icmp_data)?;
    if icmp_packet.get_icmp_type() != IcmpTypes::EchoReply {
        return None;
    }
    let reply = EchoReplyPacket::new(icmp_data)?;

    Some(EchoReply {
        identifier: reply.get_identifier(),
        sequence: reply.get_sequence_number(),
        ttl,
        source,
    })
}

/// Echo request waiting for its reply
#[derive(Debug, Clone, Copy)]
struct PendingEcho {
    dest: Ipv4Addr,
    first_sequence: u16,
    count: u16,
    sent_at: Instant,
    timeout: Duration,
}

impl PendingEcho {
    fn matches_sequence(&self, sequence: u16) -> bool {
        sequence.wrapping_sub(self.first_sequence) < self.count
    }
}

/// ICMP echo transport over a non-blocking IPv4 socket
pub struct IcmpEchoTransport {
    socket: Socket2,
    mode: SocketMode,
    resolver: HostResolver,
    icmp_identifier: u16,
    next_sequence: u16,
    pending: Option<PendingEcho>,
}

impl IcmpEchoTransport {
    /// Open an ICMP socket (raw if permitted, datagram otherwise)
    pub fn open(resolver: HostResolver, preferred_mode: Option<SocketMode>) -> Result<Self> {
        let (socket, mode) = create_icmp_socket(preferred_mode)?;
        Ok(Self::new(socket, mode, resolver))
    }

    /// Wrap an already configured non-blocking ICMP socket
    pub fn new(socket: Socket2, mode: SocketMode, resolver: HostResolver) -> Self {
        Self {
            socket,
            mode,
            resolver,
            icmp_identifier: std::process::id() as u16,
            next_sequence: rand::random::<u16>(),
            pending: None,
        }
    }

    /// Socket mode in use
    pub fn mode(&self) -> SocketMode {
        self.mode
    }

    fn accepts(&self, pending: &PendingEcho, reply: &EchoReply) -> bool {
        if !pending.matches_sequence(reply.sequence) {
            return false;
        }
        match self.mode {
            // Raw sockets see every ICMP message on the host
            SocketMode::Raw => {
                reply.identifier == self.icmp_identifier
                    && reply.source.is_none_or(|src| src == pending.dest)
            }
            // The kernel rewrites the identifier and filters replies per socket
            SocketMode::Dgram => true,
        }
    }

    #[cfg(target_os = "linux")]
    fn receive(&self, buf: &mut [u8]) -> std::io::Result<(usize, Option<u8>)> {
        recv_with_ttl(&self.socket, buf)
    }

    #[cfg(not(target_os = "linux"))]
    fn receive(&self, buf: &mut [u8]) -> std::io::Result<(usize, Option<u8>)> {
        use std::io::Read;
        (&self.socket).read(buf).map(|size| (size, None))
    }

    /// Drain the socket looking for the pending reply
    fn drain(&mut self, pending: &PendingEcho) -> Option<EchoReply> {
        let mut recv_buf = [0u8; RECV_BUFFER_LEN];
        loop {
            match self.receive(&mut recv_buf) {
                Ok((size, ancillary_ttl)) => {
                    if let Some(reply) = parse_echo_reply(&recv_buf[..size]) {
                        let reply = reply.or_ttl(ancillary_ttl);
                        if self.accepts(pending, &reply) {
                            return Some(reply);
                        }
                        trace!(sequence = reply.sequence, "ignoring unrelated echo reply");
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::Interrupted =>
                {
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, "ICMP receive failed");
                    return None;
                }
            }
        }
    }
}

impl ProbeTransport for IcmpEchoTransport {
    fn issue(&mut self, host: &str, request: &ProbeRequest) -> Result<()> {
        let dest = match self.resolver.resolve(host)? {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(_) => return Err(anyhow!("IPv6 target not supported by IPv4 socket")),
        };

        let count = request.count.max(1);
        let first_sequence = self.next_sequence;
        let target_addr = SocketAddr::V4(SocketAddrV4::new(dest, 0));

        for i in 0..count {
            let packet = build_echo_request(self.icmp_identifier, first_sequence.wrapping_add(i))?;
            self.socket
                .send_to(&packet, &target_addr.into())
                .with_context(|| format!("Failed to send ICMP echo request to {dest}"))?;
        }
        self.next_sequence = first_sequence.wrapping_add(count);

        self.pending = Some(PendingEcho {
            dest,
            first_sequence,
            count,
            sent_at: Instant::now(),
            timeout: request.timeout,
        });
        Ok(())
    }

    fn poll(&mut self) -> Option<ProbeOutcome> {
        let pending = self.pending?;

        if let Some(reply) = self.drain(&pending) {
            self.pending = None;
            let rtt_ms = pending.sent_at.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
            return Some(ProbeOutcome::Reply {
                rtt_ms,
                ttl: reply.ttl,
            });
        }

        if pending.sent_at.elapsed() >= pending.timeout {
            self.pending = None;
            return Some(ProbeOutcome::TimedOut);
        }
        None
    }

    fn abandon(&mut self) {
        self.pending = None;
    }
}
