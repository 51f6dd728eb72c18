//! Best-effort reverse DNS
//!
//! Reverse lookups are supplementary: a record is complete without one, so
//! any failure (no PTR record, timeout, resolver error) yields `None` and is
//! never surfaced as an error.

use dns_lookup::lookup_addr;
use std::net::IpAddr;
use tracing::debug;

/// A hostname-from-address lookup. Implemented by [`PtrResolver`]; test
/// doubles implement it to avoid touching the system resolver.
pub trait ReverseLookup {
    fn resolve(&self, ip: IpAddr) -> Option<String>;
}

/// Reverse resolver backed by the operating environment's resolver.
pub struct PtrResolver;

impl ReverseLookup for PtrResolver {
    fn resolve(&self, ip: IpAddr) -> Option<String> {
        match lookup_addr(&ip) {
            Ok(host) => clean_hostname(ip, host),
            Err(e) => {
                debug!("reverse lookup failed for {}: {}", ip, e);
                None
            }
        }
    }
}

/// Trim the trailing dot and discard self-referential answers (some
/// platforms return the address itself when no PTR record exists).
fn clean_hostname(ip: IpAddr, raw: String) -> Option<String> {
    let host = raw.strip_suffix('.').unwrap_or(&raw);
    if host.is_empty() || host == ip.to_string() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip() -> IpAddr {
        "192.0.2.1".parse().unwrap()
    }

    #[test]
    fn test_clean_hostname_trims_trailing_dot() {
        assert_eq!(
            clean_hostname(ip(), "host.example.com.".to_string()),
            Some("host.example.com".to_string())
        );
    }

    #[test]
    fn test_clean_hostname_discards_self_answer() {
        assert_eq!(clean_hostname(ip(), "192.0.2.1".to_string()), None);
        assert_eq!(clean_hostname(ip(), String::new()), None);
    }

    #[test]
    fn test_clean_hostname_passthrough() {
        assert_eq!(
            clean_hostname(ip(), "host.example.com".to_string()),
            Some("host.example.com".to_string())
        );
    }
}
