//! Server-side request forgery guard
//!
//! A URL is accepted only when every address its host resolves to is globally
//! routable. Resolution happens fresh on every call; any failure rejects.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::lookup_host;
use tracing::debug;
use url::{Host, Url};

/// Outcome of inspecting a URL
#[derive(Debug, Clone)]
pub struct SsrfVerdict {
    pub allowed: bool,
    /// Host name as it appears in the URL (brackets stripped for IPv6)
    pub host: String,
    /// Every address the host resolved to
    pub addresses: Vec<SocketAddr>,
}

impl SsrfVerdict {
    fn denied(host: impl Into<String>) -> Self {
        Self {
            allowed: false,
            host: host.into(),
            addresses: Vec::new(),
        }
    }
}

/// Returns true if `url` refers to a global resource
pub async fn verify(url: &str) -> bool {
    inspect(url).await.allowed
}

/// Resolve the host of `url` and judge the full address set
pub async fn inspect(url: &str) -> SsrfVerdict {
    let parsed = match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
        _ => return SsrfVerdict::denied(""),
    };
    let port = parsed.port_or_known_default().unwrap_or(80);

    let (host, addresses) = match parsed.host() {
        Some(Host::Ipv4(ip)) => (ip.to_string(), vec![SocketAddr::new(IpAddr::V4(ip), port)]),
        Some(Host::Ipv6(ip)) => (ip.to_string(), vec![SocketAddr::new(IpAddr::V6(ip), port)]),
        Some(Host::Domain(domain)) => match lookup_host((domain, port)).await {
            Ok(addrs) => (domain.to_string(), addrs.collect()),
            Err(e) => {
                debug!(host = %domain, error = %e, "Host resolution failed");
                return SsrfVerdict::denied(domain);
            }
        },
        None => return SsrfVerdict::denied(""),
    };

    let allowed = !addresses.is_empty() && addresses.iter().all(|addr| is_global(addr.ip()));
    debug!(host = %host, addresses = ?addresses, allowed, "SSRF verdict");
    SsrfVerdict {
        allowed,
        host,
        addresses,
    }
}

/// Whether `ip` is publicly routable
pub fn is_global(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_global_v4(v4),
        IpAddr::V6(v6) => is_global_v6(v6),
    }
}

fn is_global_v4(ip: Ipv4Addr) -> bool {
    let [a, b, c, d] = ip.octets();
    // 192.0.0.9 (PCP anycast) and 192.0.0.10 (TURN anycast) are globally reachable
    if a == 192 && b == 0 && c == 0 && (d == 9 || d == 10) {
        return true;
    }
    !(ip.is_unspecified()
        || a == 0
        || ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        // shared address space 100.64.0.0/10
        || (a == 100 && (b & 0b1100_0000) == 64)
        // IETF protocol assignments 192.0.0.0/24
        || (a == 192 && b == 0 && c == 0)
        // benchmarking 198.18.0.0/15
        || (a == 198 && (b & 0xfe) == 18)
        // reserved 240.0.0.0/4
        || a >= 240)
}

fn is_global_v6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_global_v4(mapped);
    }
    let segments = ip.segments();
    !(ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_multicast()
        // unique local fc00::/7
        || (segments[0] & 0xfe00) == 0xfc00
        // link local fe80::/10 and deprecated site local fec0::/10
        || (segments[0] & 0xffc0) == 0xfe80
        || (segments[0] & 0xffc0) == 0xfec0
        // documentation 2001:db8::/32
        || (segments[0] == 0x2001 && segments[1] == 0x0db8)
        // IETF protocol assignments 2001::/23, minus its global sub-blocks
        || (segments[0] == 0x2001 && segments[1] < 0x0200 && !is_global_ietf_v6(ip))
        // 6to4 2002::/16
        || segments[0] == 0x2002
        // discard-only 100::/64
        || (segments[0] == 0x0100 && segments[1] == 0 && segments[2] == 0 && segments[3] == 0)
        // local-use NAT64 64:ff9b:1::/48
        || (segments[0] == 0x0064 && segments[1] == 0xff9b && segments[2] == 0x0001))
}

/// Globally reachable blocks inside 2001::/23
fn is_global_ietf_v6(ip: Ipv6Addr) -> bool {
    let segments = ip.segments();
    let second = segments[1];
    // 2001:1::1 and 2001:1::2 anycast
    (second == 0x0001
        && segments[2..7].iter().all(|s| *s == 0)
        && (segments[7] == 1 || segments[7] == 2))
        // AMT 2001:3::/32
        || second == 0x0003
        // AS112-v6 2001:4:112::/48
        || (second == 0x0004 && segments[2] == 0x0112)
        // ORCHIDv2 2001:20::/28 and DRIP 2001:30::/28
        || (second & 0xfff0) == 0x0020
        || (second & 0xfff0) == 0x0030
}
