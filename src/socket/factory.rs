//! Factory for creating ICMP echo sockets with automatic fallback

use super::SocketMode;
use anyhow::{anyhow, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::{debug, info};

// Common POSIX error codes
const EPERM: i32 = 1; // Operation not permitted
const EACCES: i32 = 13; // Permission denied

/// Try to create an IPv4 ICMP socket of the given mode
fn try_create_socket(mode: SocketMode) -> Result<Socket, std::io::Error> {
    let socket_type = match mode {
        SocketMode::Raw => Type::RAW,
        SocketMode::Dgram => Type::DGRAM,
    };
    Socket::new(Domain::IPV4, socket_type, Some(Protocol::ICMPV4))
}

/// Ask the kernel to attach each datagram's TTL as an `IP_TTL` control message
///
/// Datagram ICMP sockets on Linux deliver replies without the IP header, so
/// this is the only way to learn the reply TTL.
#[cfg(target_os = "linux")]
fn enable_ttl_delivery(socket: &Socket) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    let enable: libc::c_int = 1;
    // SAFETY: the descriptor is owned by `socket` and the option value points
    // at a live c_int of the stated length
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_RECVTTL,
            (&enable as *const libc::c_int).cast(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

fn is_permission_error(io_err: &std::io::Error) -> bool {
    matches!(io_err.kind(), std::io::ErrorKind::PermissionDenied)
        || io_err
            .raw_os_error()
            .map(|code| code == EPERM || code == EACCES)
            .unwrap_or(false)
}

/// Create a non-blocking ICMP socket
///
/// With no preference, a raw socket is tried first and a datagram ICMP
/// socket second, since the latter works without root on Linux (with a
/// configured ping group) and macOS.
pub fn create_icmp_socket(preferred_mode: Option<SocketMode>) -> Result<(Socket, SocketMode)> {
    let user_specified_mode = preferred_mode.is_some();
    let socket_modes = match preferred_mode {
        Some(mode) => vec![mode],
        None => vec![SocketMode::Raw, SocketMode::Dgram],
    };

    let mut last_error = None;
    for mode in socket_modes {
        match try_create_socket(mode) {
            Ok(socket) => {
                if mode == SocketMode::Dgram {
                    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
                    socket.bind(&bind_addr.into())?;
                    #[cfg(target_os = "linux")]
                    if let Err(e) = enable_ttl_delivery(&socket) {
                        tracing::warn!(error = %e, "reply TTL will be unknown");
                    }
                }
                socket.set_nonblocking(true)?;
                info!(mode = mode.description(), "using ICMP socket");
                return Ok((socket, mode));
            }
            Err(io_err) => {
                if is_permission_error(&io_err) {
                    if user_specified_mode {
                        return Err(anyhow!(
                            "Failed to create {} ICMP socket: {}.\n\
                             Raw sockets require root or CAP_NET_RAW; datagram ICMP sockets require\n\
                             root or a configured ping group (Linux): sudo sysctl -w net.ipv4.ping_group_range=\"0 65535\"",
                            mode.description(),
                            io_err
                        ));
                    }
                    debug!(mode = mode.description(), "permission denied, trying fallback");
                } else {
                    debug!(mode = mode.description(), error = %io_err, "socket creation failed");
                }
                last_error = Some(anyhow::Error::from(io_err));
            }
        }
    }

    if user_specified_mode {
        Err(last_error.unwrap_or_else(|| anyhow!("Failed to create requested socket mode")))
    } else {
        Err(anyhow!(
            "Failed to create any ICMP socket. Both modes require elevated privileges:\n\
             - Raw ICMP: Requires root or CAP_NET_RAW capability\n\
             - DGRAM ICMP: Requires root or configured ping_group_range (Linux)\n\n\
             Solutions:\n\
             1. Run with sudo: sudo {}\n\
             2. On Linux, configure ping group: sudo sysctl -w net.ipv4.ping_group_range=\"0 65535\"",
            std::env::args().collect::<Vec<_>>().join(" ")
        ))
    }
}
