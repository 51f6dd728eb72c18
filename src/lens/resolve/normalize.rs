//! Address normalization
//!
//! Turns a raw input token into the canonical form used as the cache and
//! deduplication key. Textually different but semantically identical tokens
//! ("1.1.1.1", "001.1.1.1", "1.1.1.1/32") all map to one key, and a network
//! token is truncated to its true network address ("10.0.0.9/8" becomes
//! "10.0.0.0/8"). Pure parsing, no I/O.

use ipnet::Ipv4Net;
use std::fmt;
use std::net::Ipv4Addr;

/// Canonical form of an input token: a single IPv4 host or an IPv4 network.
///
/// A `/32` network folds into the host variant so that "a.b.c.d" and
/// "a.b.c.d/32" share one cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalizedAddress {
    Host(Ipv4Addr),
    Net(Ipv4Net),
}

impl NormalizedAddress {
    /// The host address, when this is a single host rather than a network.
    /// Reverse DNS applies only to hosts.
    pub fn host(&self) -> Option<Ipv4Addr> {
        match self {
            NormalizedAddress::Host(ip) => Some(*ip),
            NormalizedAddress::Net(_) => None,
        }
    }

    /// The address used for well-known-range classification: the host itself,
    /// or the network address.
    pub fn classify_addr(&self) -> Ipv4Addr {
        match self {
            NormalizedAddress::Host(ip) => *ip,
            NormalizedAddress::Net(net) => net.addr(),
        }
    }
}

impl fmt::Display for NormalizedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedAddress::Host(ip) => write!(f, "{}", ip),
            NormalizedAddress::Net(net) => write!(f, "{}", net),
        }
    }
}

/// Input token that does not parse as an IPv4 address or network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAddress(pub String);

impl fmt::Display for InvalidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid IPv4 address or network: {:?}", self.0)
    }
}

impl std::error::Error for InvalidAddress {}

/// Parse a raw token into its canonical form.
///
/// Accepts IPv4 addresses ("a.b.c.d") and IPv4 CIDR networks ("a.b.c.d/n"),
/// with surrounding whitespace and per-octet leading zeros tolerated.
/// Hostnames, IPv6, and malformed octets are rejected.
pub fn normalize(token: &str) -> Result<NormalizedAddress, InvalidAddress> {
    let trimmed = token.trim();
    let invalid = || InvalidAddress(token.to_string());

    let (addr_part, prefix_part) = match trimmed.split_once('/') {
        Some((a, p)) => (a, Some(p)),
        None => (trimmed, None),
    };

    let addr = parse_octets(addr_part).ok_or_else(invalid)?;

    let prefix_len = match prefix_part {
        None => return Ok(NormalizedAddress::Host(addr)),
        Some(p) => parse_prefix_len(p).ok_or_else(invalid)?,
    };

    if prefix_len == 32 {
        // a /32 is a host; fold it into the bare-address key
        return Ok(NormalizedAddress::Host(addr));
    }

    let net = Ipv4Net::new(addr, prefix_len).map_err(|_| invalid())?;
    Ok(NormalizedAddress::Net(net.trunc()))
}

/// Parse dotted-quad octets, tolerating leading zeros ("001.2.3.4").
fn parse_octets(s: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut count = 0;

    for part in s.split('.') {
        if count == 4 || part.is_empty() || part.len() > 3 {
            return None;
        }
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: u16 = part.parse().ok()?;
        if value > 255 {
            return None;
        }
        octets[count] = value as u8;
        count += 1;
    }

    if count != 4 {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

fn parse_prefix_len(s: &str) -> Option<u8> {
    if s.is_empty() || s.len() > 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u8 = s.parse().ok()?;
    (value <= 32).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_and_slash32_share_key() {
        let bare = normalize("1.1.1.1").unwrap();
        let slash32 = normalize("1.1.1.1/32").unwrap();
        assert_eq!(bare, slash32);
        assert_eq!(bare.to_string(), "1.1.1.1");
    }

    #[test]
    fn test_leading_zeros_collapse() {
        assert_eq!(
            normalize("001.002.003.004").unwrap(),
            normalize("1.2.3.4").unwrap()
        );
    }

    #[test]
    fn test_whitespace_trimmed() {
        assert_eq!(
            normalize("  10.20.30.40\t").unwrap().to_string(),
            "10.20.30.40"
        );
    }

    #[test]
    fn test_network_truncated_to_network_address() {
        let net = normalize("10.0.0.9/8").unwrap();
        assert_eq!(net.to_string(), "10.0.0.0/8");
        assert_eq!(net, normalize("10.0.0.0/8").unwrap());
    }

    #[test]
    fn test_host_accessor() {
        assert!(normalize("1.1.1.1").unwrap().host().is_some());
        assert!(normalize("1.1.1.0/24").unwrap().host().is_none());
    }

    #[test]
    fn test_rejects_hostnames_and_ipv6() {
        assert!(normalize("example.com").is_err());
        assert!(normalize("2001:db8::1").is_err());
        assert!(normalize("::1").is_err());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(normalize("").is_err());
        assert!(normalize("256.1.1.1").is_err());
        assert!(normalize("1.1.1").is_err());
        assert!(normalize("1.1.1.1.1").is_err());
        assert!(normalize("1.1.1.1/33").is_err());
        assert!(normalize("1.1.1.1/").is_err());
        assert!(normalize("1.1.1.1/ 24").is_err());
        assert!(normalize("not-an-ip").is_err());
    }

    #[test]
    fn test_invalid_address_reports_token() {
        let err = normalize("bogus").unwrap_err();
        assert_eq!(err.0, "bogus");
        assert!(err.to_string().contains("bogus"));
    }
}
