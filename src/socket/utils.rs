//! Privilege checks for opening ICMP sockets

/// Kernel setting listing the groups allowed to open datagram ICMP sockets
#[cfg(target_os = "linux")]
const PING_GROUP_RANGE_PATH: &str = "/proc/sys/net/ipv4/ping_group_range";

/// Check if running as root
pub fn is_root() -> bool {
    #[cfg(any(target_os = "linux", target_os = "freebsd", target_os = "openbsd"))]
    {
        // SAFETY: geteuid has no preconditions and cannot fail
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(all(
        unix,
        not(any(target_os = "linux", target_os = "freebsd", target_os = "openbsd"))
    ))]
    {
        unsafe {
            extern "C" {
                fn geteuid() -> u32;
            }
            geteuid() == 0
        }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Parse the `low high` pair of `net.ipv4.ping_group_range`
///
/// The kernel disables unprivileged ping by setting `low` above `high`, in
/// which case this returns `None`.
pub fn parse_ping_group_range(contents: &str) -> Option<(u32, u32)> {
    let mut fields = contents.split_whitespace();
    let low = fields.next()?.parse().ok()?;
    let high = fields.next()?.parse().ok()?;
    (low <= high).then_some((low, high))
}

/// Check if this process can send ICMP echo requests without root
pub fn has_non_root_capability() -> bool {
    #[cfg(target_os = "linux")]
    {
        match std::fs::read_to_string(PING_GROUP_RANGE_PATH) {
            Ok(contents) => {
                // SAFETY: getegid has no preconditions and cannot fail
                let gid = unsafe { libc::getegid() };
                parse_ping_group_range(&contents).is_some_and(|(low, high)| (low..=high).contains(&gid))
            }
            // Without procfs, let socket creation decide
            Err(_) => true,
        }
    }
    #[cfg(target_os = "macos")]
    {
        // macOS has DGRAM ICMP support
        true
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        // BSDs and unknown platforms require root for ICMP
        false
    }
}
