//! UDP socket wrangling
// (c) 2024 Ross Younger

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// The unspecified address, any port, in the address family needed to reach `peer`
#[must_use]
pub fn unspecified_for(peer: &SocketAddr) -> SocketAddr {
    match peer {
        SocketAddr::V4(_) => SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0).into(),
    }
}

/// Picks the address to send to from a name lookup: the first IPv4 address if there is one, else the first address.
///
/// Resolvers often list IPv6 first, but a receiver listening on `0.0.0.0` only hears IPv4.
#[must_use]
pub fn preferred_peer<I: IntoIterator<Item = SocketAddr>>(addrs: I) -> Option<SocketAddr> {
    let mut fallback = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        let _ = fallback.get_or_insert(addr);
    }
    fallback
}

/// Asks the kernel for a receive buffer of at least `wanted` bytes.
///
/// Returns the size actually granted. Failure is not fatal to a transfer, so callers usually just log it.
#[cfg(unix)]
pub fn set_receive_buffer<S: std::os::fd::AsFd>(socket: &S, wanted: usize) -> anyhow::Result<usize> {
    use nix::sys::socket::{getsockopt, setsockopt, sockopt};
    // Linux reports double what was asked for, to account for its own bookkeeping
    #[cfg(target_os = "linux")]
    let divisor = 2;
    #[cfg(not(target_os = "linux"))]
    let divisor = 1;

    let current = getsockopt(socket, sockopt::RcvBuf)? / divisor;
    if current < wanted {
        setsockopt(socket, sockopt::RcvBuf, &wanted)?;
    }
    Ok(getsockopt(socket, sockopt::RcvBuf)? / divisor)
}

/// Asks the kernel for a receive buffer of at least `wanted` bytes (unsupported on this platform)
#[cfg(not(unix))]
pub fn set_receive_buffer<S>(_socket: &S, _wanted: usize) -> anyhow::Result<usize> {
    anyhow::bail!("setting the socket receive buffer is not supported on this platform")
}
