//! IP address helpers used by the IP chain steps
//!
//! IPv6 literals are canonicalized to eight zero-padded groups; IPv4
//! literals are returned unchanged.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

use ipnet::IpNet;

const BLACKLIST: &[&str] = &[
    "192.168.0.0/16",
    "172.16.0.0/12",
    "10.0.0.0/8",
    "224.0.0.0/4",
    "127.0.0.0/8",
    "fc00::/7",
    "ff00::/8",
    "ff00::/12",
];

fn blacklist() -> &'static [IpNet] {
    static NETS: OnceLock<Vec<IpNet>> = OnceLock::new();
    NETS.get_or_init(|| BLACKLIST.iter().filter_map(|net| net.parse().ok()).collect())
}

/// Full, zero-padded form of an IPv6 address.
pub fn expand_ipv6(addr: &Ipv6Addr) -> String {
    addr.segments()
        .iter()
        .map(|segment| format!("{:04x}", segment))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parses either family and returns the canonical text.
pub fn normalize_ip(text: &str) -> Option<String> {
    match text.parse::<IpAddr>().ok()? {
        IpAddr::V4(addr) => Some(addr.to_string()),
        IpAddr::V6(addr) => Some(expand_ipv6(&addr)),
    }
}

pub fn normalize_ipv4(text: &str) -> Option<String> {
    text.parse::<Ipv4Addr>().ok().map(|addr| addr.to_string())
}

pub fn normalize_ipv6(text: &str) -> Option<String> {
    text.parse::<Ipv6Addr>().ok().map(|addr| expand_ipv6(&addr))
}

/// Failure modes of CIDR parsing, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CidrError {
    Notation,
    Address,
    PrefixLength,
}

impl CidrError {
    pub fn message(&self) -> &'static str {
        match self {
            CidrError::Notation => "Invalid CIDR (subnet) notation",
            CidrError::Address => "Invalid IP",
            CidrError::PrefixLength => "Invalid subnet length",
        }
    }
}

/// Validates `addr/len` and returns it with the address canonicalized.
pub fn normalize_cidr(text: &str) -> Result<String, CidrError> {
    let mut parts = text.split('/');
    let (addr, len) = match (parts.next(), parts.next(), parts.next()) {
        (Some(addr), Some(len), None) => (addr, len),
        _ => return Err(CidrError::Notation),
    };

    let addr = addr.parse::<IpAddr>().map_err(|_| CidrError::Address)?;
    let len = len.parse::<u8>().map_err(|_| CidrError::PrefixLength)?;
    let max = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    if len > max {
        return Err(CidrError::PrefixLength);
    }

    let canonical = match addr {
        IpAddr::V4(addr) => addr.to_string(),
        IpAddr::V6(addr) => expand_ipv6(&addr),
    };
    Ok(format!("{}/{}", canonical, len))
}

/// True when the address falls in a private, loopback or multicast range.
pub fn is_blacklisted(addr: &IpAddr) -> bool {
    blacklist().iter().any(|net| net.contains(addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv6_is_fully_expanded() {
        assert_eq!(
            normalize_ip("2001:db8::1:0:0:1").as_deref(),
            Some("2001:0db8:0000:0000:0001:0000:0000:0001")
        );
        assert_eq!(
            normalize_ipv6("::1").as_deref(),
            Some("0000:0000:0000:0000:0000:0000:0000:0001")
        );
    }

    #[test]
    fn test_ipv4_is_unchanged() {
        assert_eq!(normalize_ip("192.168.0.1").as_deref(), Some("192.168.0.1"));
        assert!(normalize_ipv4("::1").is_none());
        assert!(normalize_ipv6("1.2.3.4").is_none());
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(normalize_ip("12345").is_none());
        assert!(normalize_ip("fc00:1:0:0:1").is_none());
        assert!(normalize_ip("").is_none());
    }

    #[test]
    fn test_cidr() {
        assert_eq!(normalize_cidr("192.168.0.1/2").unwrap(), "192.168.0.1/2");
        assert_eq!(
            normalize_cidr("2001:db8::1:0:0:1/64").unwrap(),
            "2001:0db8:0000:0000:0001:0000:0000:0001/64"
        );
        assert_eq!(normalize_cidr("192.168.0.1"), Err(CidrError::Notation));
        assert_eq!(normalize_cidr("1.2.3/8"), Err(CidrError::Address));
        assert_eq!(normalize_cidr("192.168.0.1/33"), Err(CidrError::PrefixLength));
        assert_eq!(normalize_cidr("::1/129"), Err(CidrError::PrefixLength));
    }

    #[test]
    fn test_blacklist() {
        let blocked = ["192.168.0.1", "10.0.0.1", "127.0.0.1", "224.0.0.5", "fc00::1", "ff02::1"];
        for addr in blocked {
            assert!(is_blacklisted(&addr.parse().unwrap()), "{} should be blocked", addr);
        }
        assert!(!is_blacklisted(&"173.45.245.32".parse().unwrap()));
        assert!(!is_blacklisted(&"2001:db8::1".parse().unwrap()));
    }
}
