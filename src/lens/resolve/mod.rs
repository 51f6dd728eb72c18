//! Resolution engine
//!
//! [`ResolveLens`] orchestrates one batch run: normalize and deduplicate the
//! input tokens, serve what the cache can, then walk the remaining addresses
//! sequentially through the registry client and the reverse resolver,
//! pausing between bursts to stay inside the public services' rate limits.
//! Per-address failures are recorded and never abort the batch.

pub mod normalize;
pub mod rdap;
pub mod reverse;
pub mod types;

pub use self::types::{FailureReason, Outcome, Resolution, RunStats, TokenResolution};

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cache::{NetworkCache, ResolvedNetwork, DEFAULT_CACHE_TTL};
use crate::config::SpyglassConfig;
use self::normalize::{normalize, NormalizedAddress};
use self::rdap::{RdapClient, RirLookup, RirRecord};
use self::reverse::{PtrResolver, ReverseLookup};

const PRIVATE_DESCR: &str = "Private (RFC 1918 or APIPA) range";
const LOOPBACK_DESCR: &str = "Loopback range";
const MULTICAST_DESCR: &str = "Multicast range";
const RESERVED_DESCR: &str = "Reserved IP range";

/// Tuning knobs for one engine run, usually derived from
/// [`SpyglassConfig::resolve_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Cache entries older than this are re-resolved
    pub ttl: Duration,
    /// Network lookups between cooldown pauses
    pub pause_every: usize,
    /// Length of a cooldown pause
    pub cooldown: Duration,
    /// Network lookups between cache checkpoints
    pub save_interval: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            pause_every: 10,
            cooldown: Duration::from_secs(2),
            save_interval: 100,
        }
    }
}

/// The lookup engine. Owns the cache for the duration of a run and drives
/// the registry client and reverse resolver for every cache miss.
pub struct ResolveLens<R, P> {
    cache: NetworkCache,
    rir: R,
    reverse: P,
    opts: ResolveOptions,
}

impl ResolveLens<RdapClient, PtrResolver> {
    /// Engine with the production RDAP client and system resolver.
    pub fn new(cache: NetworkCache, config: &SpyglassConfig) -> Self {
        Self::with_components(
            cache,
            RdapClient::new(config.request_interval(), config.request_timeout()),
            PtrResolver,
            config.resolve_options(),
        )
    }
}

impl<R: RirLookup, P: ReverseLookup> ResolveLens<R, P> {
    pub fn with_components(cache: NetworkCache, rir: R, reverse: P, opts: ResolveOptions) -> Self {
        Self {
            cache,
            rir,
            reverse,
            opts,
        }
    }

    pub fn cache(&self) -> &NetworkCache {
        &self.cache
    }

    pub fn into_cache(self) -> NetworkCache {
        self.cache
    }

    /// Resolve a batch of address tokens.
    ///
    /// Every input token gets exactly one entry in the returned
    /// [`Resolution`], in input order; tokens sharing a normalized form share
    /// one record and one lookup. The cache is persisted before returning; a
    /// failed save is logged but does not discard the in-memory result.
    pub fn resolve_batch(&mut self, tokens: &[String]) -> (Resolution, RunStats) {
        let now = Utc::now();
        let mut stats = RunStats::default();

        // Normalize and group: distinct keys in first-seen order, plus the
        // key each token mapped to (None for invalid tokens).
        let mut order: Vec<(String, NormalizedAddress)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut token_keys: Vec<Option<String>> = Vec::with_capacity(tokens.len());

        for token in tokens {
            match normalize(token) {
                Ok(addr) => {
                    let key = addr.to_string();
                    if seen.insert(key.clone()) {
                        order.push((key.clone(), addr));
                    }
                    token_keys.push(Some(key));
                }
                Err(_) => {
                    stats.invalid += 1;
                    token_keys.push(None);
                }
            }
        }

        // Partition into locally answerable and cache-miss addresses.
        let mut outcomes: HashMap<String, Outcome> = HashMap::new();
        let mut worklist: Vec<(String, NormalizedAddress)> = Vec::new();

        for (key, addr) in &order {
            if let Some(descr) = known_range_description(addr.classify_addr()) {
                outcomes.insert(
                    key.clone(),
                    Outcome::Resolved(ResolvedNetwork::known(key, descr)),
                );
                continue;
            }

            match self.cache.get(key) {
                Some(entry) if entry.is_fresh(now, self.opts.ttl) => {
                    stats.cache_hits += 1;
                    outcomes.insert(key.clone(), Outcome::Resolved(entry.clone()));
                }
                _ => worklist.push((key.clone(), *addr)),
            }
        }

        // Work the misses sequentially, pacing between bursts.
        for (key, addr) in worklist {
            stats.lookups += 1;

            match self.rir.query(&addr) {
                Ok(record) => {
                    let fqdn = addr
                        .host()
                        .and_then(|ip| self.reverse.resolve(IpAddr::V4(ip)));
                    let entry = build_entry(&key, record, fqdn);
                    self.cache.put(entry.clone());
                    outcomes.insert(key, Outcome::Resolved(entry));
                }
                Err(e) => {
                    warn!("lookup failed for {}: {}", key, e);
                    stats.not_found += 1;
                    self.cache.record_not_found(&key);
                    outcomes.insert(
                        key,
                        Outcome::Unresolved(FailureReason::LookupFailure(e.to_string())),
                    );
                }
            }

            if self.opts.pause_every > 0 && stats.lookups % self.opts.pause_every == 0 {
                stats.cooldowns += 1;
                info!(
                    "sleeping {:?} after another {} lookups (total {})",
                    self.opts.cooldown, self.opts.pause_every, stats.lookups
                );
                if self.opts.cooldown > Duration::ZERO {
                    thread::sleep(self.opts.cooldown);
                }
            }

            if self.opts.save_interval > 0 && stats.lookups % self.opts.save_interval == 0 {
                if let Err(e) = self.cache.save() {
                    warn!("cache checkpoint failed: {:#}", e);
                }
            }
        }

        // Persist once at the end; the in-memory result survives a failed save.
        if self.cache.is_dirty() {
            if let Err(e) = self.cache.save() {
                error!("failed to persist cache: {:#}", e);
            }
        }
        if let Err(e) = self.cache.save_not_found() {
            warn!("failed to record not-found addresses: {:#}", e);
        }

        // Fan each distinct outcome back out to every original token.
        let records = tokens
            .iter()
            .zip(token_keys)
            .map(|(token, key)| {
                let outcome = match key {
                    None => Outcome::Unresolved(FailureReason::InvalidAddress),
                    Some(key) => outcomes
                        .get(&key)
                        .cloned()
                        .unwrap_or(Outcome::Unresolved(FailureReason::InvalidAddress)),
                };
                TokenResolution {
                    token: token.clone(),
                    outcome,
                }
            })
            .collect();

        info!("{}", stats);
        (Resolution::new(records), stats)
    }
}

fn build_entry(key: &str, record: RirRecord, fqdn: Option<String>) -> ResolvedNetwork {
    ResolvedNetwork {
        address: key.to_string(),
        cidr: record.cidr,
        name: record.name,
        description: record.description,
        country: record.country,
        registry: record.registry,
        fqdn,
        last_resolved: Utc::now(),
    }
}

/// Well-known ranges resolve locally: they carry no registry data worth
/// querying and would otherwise pollute the cache.
fn known_range_description(addr: Ipv4Addr) -> Option<&'static str> {
    if addr.is_private() || addr.is_link_local() {
        Some(PRIVATE_DESCR)
    } else if addr.is_loopback() {
        Some(LOOPBACK_DESCR)
    } else if addr.is_multicast() {
        Some(MULTICAST_DESCR)
    } else if addr.is_unspecified() || addr.is_broadcast() || addr.octets()[0] >= 240 {
        Some(RESERVED_DESCR)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::rdap::LookupError;
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct ScriptedRir {
        fail: HashSet<String>,
    }

    impl ScriptedRir {
        fn ok() -> Self {
            Self {
                fail: HashSet::new(),
            }
        }

        fn failing(keys: &[&str]) -> Self {
            Self {
                fail: keys.iter().map(|k| k.to_string()).collect(),
            }
        }
    }

    impl RirLookup for ScriptedRir {
        fn query(&mut self, addr: &NormalizedAddress) -> Result<RirRecord, LookupError> {
            let key = addr.to_string();
            if self.fail.contains(&key) {
                return Err(LookupError::NotFound);
            }
            Ok(RirRecord {
                name: format!("NET-{}", key),
                handle: key.clone(),
                cidr: "203.0.113.0/24".to_string(),
                country: "US".to_string(),
                registry: "arin".to_string(),
                description: "Test allocation".to_string(),
            })
        }
    }

    struct NoReverse;

    impl ReverseLookup for NoReverse {
        fn resolve(&self, _ip: IpAddr) -> Option<String> {
            None
        }
    }

    struct FixedReverse(&'static str);

    impl ReverseLookup for FixedReverse {
        fn resolve(&self, _ip: IpAddr) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn quick_opts() -> ResolveOptions {
        ResolveOptions {
            cooldown: Duration::from_millis(1),
            ..ResolveOptions::default()
        }
    }

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn lens_in(dir: &TempDir, rir: ScriptedRir) -> ResolveLens<ScriptedRir, NoReverse> {
        let cache = NetworkCache::load(dir.path().join("cache.json"));
        ResolveLens::with_components(cache, rir, NoReverse, quick_opts())
    }

    #[test]
    fn test_dedup_shares_one_lookup() {
        let dir = TempDir::new().unwrap();
        let mut lens = lens_in(&dir, ScriptedRir::ok());

        let (resolution, stats) =
            lens.resolve_batch(&tokens(&["203.0.113.5", "203.0.113.5", "203.0.113.5/32"]));

        assert_eq!(stats.lookups, 1);
        assert_eq!(resolution.len(), 3);
        let first = resolution.records()[0].outcome.record().unwrap();
        for record in resolution.records() {
            assert_eq!(record.outcome.record().unwrap(), first);
        }
    }

    #[test]
    fn test_second_run_is_all_cache_hits() {
        let dir = TempDir::new().unwrap();
        let input = tokens(&["203.0.113.5", "198.51.100.7"]);

        let mut lens = lens_in(&dir, ScriptedRir::ok());
        let (_, first) = lens.resolve_batch(&input);
        assert_eq!(first.lookups, 2);
        assert_eq!(first.cache_hits, 0);

        // fresh engine over the persisted cache
        let mut lens = lens_in(&dir, ScriptedRir::ok());
        let (resolution, second) = lens.resolve_batch(&input);
        assert_eq!(second.lookups, 0);
        assert_eq!(second.cache_hits, 2);
        assert_eq!(resolution.resolved_count(), 2);
    }

    #[test]
    fn test_partial_failure_continues_batch() {
        let dir = TempDir::new().unwrap();
        let input = tokens(&[
            "203.0.113.1",
            "203.0.113.2",
            "203.0.113.3",
            "203.0.113.4",
            "203.0.113.5",
        ]);
        let mut lens = lens_in(&dir, ScriptedRir::failing(&["203.0.113.3"]));

        let (resolution, stats) = lens.resolve_batch(&input);

        assert_eq!(stats.lookups, 5);
        assert_eq!(stats.not_found, 1);
        assert_eq!(resolution.resolved_count(), 4);
        assert!(matches!(
            resolution.get("203.0.113.3"),
            Some(Outcome::Unresolved(FailureReason::LookupFailure(_)))
        ));
    }

    #[test]
    fn test_ttl_expiry_triggers_relookup() {
        let dir = TempDir::new().unwrap();
        let mut cache = NetworkCache::load(dir.path().join("cache.json"));

        let mut stale = ResolvedNetwork::known("203.0.113.5", "old");
        stale.last_resolved = Utc::now() - chrono::Duration::days(15);
        cache.put(stale);
        let mut fresh = ResolvedNetwork::known("198.51.100.7", "recent");
        fresh.last_resolved = Utc::now() - chrono::Duration::days(13);
        cache.put(fresh);

        let mut lens =
            ResolveLens::with_components(cache, ScriptedRir::ok(), NoReverse, quick_opts());
        let (_, stats) = lens.resolve_batch(&tokens(&["203.0.113.5", "198.51.100.7"]));

        assert_eq!(stats.lookups, 1, "only the expired entry is re-resolved");
        assert_eq!(stats.cache_hits, 1);
        // refreshed entry carries new metadata
        assert_eq!(
            lens.cache().get("203.0.113.5").unwrap().name,
            "NET-203.0.113.5"
        );
    }

    #[test]
    fn test_cooldown_every_ten_lookups() {
        let dir = TempDir::new().unwrap();
        let input: Vec<String> = (1..=21).map(|i| format!("203.0.113.{}", i)).collect();
        let mut lens = lens_in(&dir, ScriptedRir::ok());

        let (_, stats) = lens.resolve_batch(&input);

        assert_eq!(stats.lookups, 21);
        assert_eq!(stats.cooldowns, 2, "pauses after the 10th and 20th lookup");
    }

    #[test]
    fn test_invalid_token_counts_in_neither_stat() {
        let dir = TempDir::new().unwrap();
        let mut lens = lens_in(&dir, ScriptedRir::ok());

        let (resolution, stats) = lens.resolve_batch(&tokens(&["not-an-ip"]));

        assert_eq!(stats.cache_hits, 0);
        assert_eq!(stats.lookups, 0);
        assert_eq!(stats.invalid, 1);
        assert_eq!(
            resolution.get("not-an-ip"),
            Some(&Outcome::Unresolved(FailureReason::InvalidAddress))
        );
    }

    #[test]
    fn test_well_known_ranges_resolve_locally() {
        let dir = TempDir::new().unwrap();
        let mut lens = lens_in(&dir, ScriptedRir::ok());

        let (resolution, stats) = lens.resolve_batch(&tokens(&[
            "192.168.1.1",
            "127.0.0.1",
            "224.0.0.5",
            "240.0.0.1",
        ]));

        assert_eq!(stats.lookups, 0);
        assert_eq!(stats.cache_hits, 0);
        assert_eq!(resolution.resolved_count(), 4);
        let private = resolution.get("192.168.1.1").unwrap().record().unwrap();
        assert_eq!(private.description, PRIVATE_DESCR);
        assert!(
            !lens.cache().is_dirty(),
            "well-known ranges are never cached"
        );
    }

    #[test]
    fn test_reverse_lookup_for_hosts_only() {
        let dir = TempDir::new().unwrap();
        let cache = NetworkCache::load(dir.path().join("cache.json"));
        let mut lens = ResolveLens::with_components(
            cache,
            ScriptedRir::ok(),
            FixedReverse("host.example.com"),
            quick_opts(),
        );

        let (resolution, _) = lens.resolve_batch(&tokens(&["203.0.113.5", "203.0.113.0/24"]));

        let host = resolution.get("203.0.113.5").unwrap().record().unwrap();
        assert_eq!(host.fqdn.as_deref(), Some("host.example.com"));
        let net = resolution.get("203.0.113.0/24").unwrap().record().unwrap();
        assert_eq!(net.fqdn, None);
    }

    #[test]
    fn test_failed_save_still_returns_result() {
        let dir = TempDir::new().unwrap();
        // parent directory does not exist, so the save step must fail
        let cache = NetworkCache::load(dir.path().join("missing-subdir").join("cache.json"));
        let mut lens =
            ResolveLens::with_components(cache, ScriptedRir::ok(), NoReverse, quick_opts());

        let (resolution, stats) = lens.resolve_batch(&tokens(&["203.0.113.5"]));

        assert_eq!(stats.lookups, 1);
        assert_eq!(resolution.resolved_count(), 1);
    }

    #[test]
    fn test_mixed_batch_fan_out_keeps_input_order() {
        let dir = TempDir::new().unwrap();
        let input = tokens(&["203.0.113.5", "bogus", "10.0.0.1", "203.0.113.5"]);
        let mut lens = lens_in(&dir, ScriptedRir::ok());

        let (resolution, stats) = lens.resolve_batch(&input);

        assert_eq!(resolution.len(), 4);
        let tokens_out: Vec<&str> = resolution
            .records()
            .iter()
            .map(|r| r.token.as_str())
            .collect();
        assert_eq!(tokens_out, vec!["203.0.113.5", "bogus", "10.0.0.1", "203.0.113.5"]);
        assert_eq!(stats.lookups, 1);
        assert_eq!(stats.invalid, 1);
    }
}
