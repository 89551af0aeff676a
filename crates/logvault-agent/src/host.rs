//! Host identity.
//!
//! The host id is the third partition segment of every key the agent writes.
//! It is resolved once at startup and never changes afterwards.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use tracing::{debug, info, warn};

/// Sentinel used when no address can be determined.
pub const UNKNOWN_HOST: &str = "unknown-ip";

/// Targets for the routing probe. Connecting a UDP socket sends nothing; it
/// only makes the OS pick the outbound interface.
const PROBE_TARGETS: [&str; 2] = ["10.254.254.254:1", "192.0.2.1:80"];

/// Identifier of the producing machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostId(String);

impl HostId {
    /// Wraps a known host id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The unknown-host sentinel.
    #[must_use]
    pub fn unknown() -> Self {
        Self(UNKNOWN_HOST.to_string())
    }

    /// Resolves the host id.
    ///
    /// Order: the configured override, then the site-local IPv4 address of
    /// the outbound interface, then the first IPv4 address the hostname
    /// resolves to, then [`UNKNOWN_HOST`].
    #[must_use]
    pub fn detect(override_id: Option<&str>) -> Self {
        if let Some(id) = override_id.filter(|id| !id.trim().is_empty()) {
            info!(host_id = %id, "using configured host id");
            return Self::new(id);
        }

        if let Some(ip) = probe_outbound_ipv4() {
            info!(host_id = %ip, "detected site-local address");
            return Self::new(ip.to_string());
        }

        if let Some(ip) = resolve_hostname_ipv4() {
            warn!(host_id = %ip, "no site-local address found, using hostname address");
            return Self::new(ip.to_string());
        }

        warn!(host_id = UNKNOWN_HOST, "could not determine host address");
        Self::unknown()
    }

    /// The id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the unknown-host sentinel.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_HOST
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Site-local, non-loopback IPv4 addresses identify a host on its network.
fn is_site_local(ip: Ipv4Addr) -> bool {
    ip.is_private() && !ip.is_loopback()
}

fn probe_outbound_ipv4() -> Option<Ipv4Addr> {
    PROBE_TARGETS.iter().find_map(|target| {
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).ok()?;
        if let Err(e) = socket.connect(target) {
            debug!(target = %target, error = %e, "routing probe failed");
            return None;
        }
        match socket.local_addr().ok()?.ip() {
            IpAddr::V4(ip) if is_site_local(ip) => Some(ip),
            other => {
                debug!(target = %target, address = %other, "probe address is not site-local");
                None
            }
        }
    })
}

fn resolve_hostname_ipv4() -> Option<Ipv4Addr> {
    let name = hostname::get().ok()?.to_string_lossy().to_string();
    let addrs = (name.as_str(), 0).to_socket_addrs().ok()?;
    first_ipv4(addrs.map(|a| a.ip()))
}

fn first_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|ip| match ip {
        IpAddr::V4(v4) if !v4.is_unspecified() => Some(v4),
        _ => None,
    })
}
