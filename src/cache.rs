//! Persistent lookup cache
//!
//! This module provides the on-disk cache that lets repeated runs skip RIR
//! queries for addresses resolved recently. The store is a single
//! human-readable JSON file mapping a normalized address string to the record
//! resolved for it, together with the timestamp of the resolution.
//!
//! Freshness is decided by the caller: the store itself never expires or
//! deletes entries, and `get` never touches the network. Saving uses a
//! write-to-temp-then-rename discipline so an interrupted run cannot leave a
//! truncated cache file behind.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default cache file name, looked up relative to the working directory
pub const DEFAULT_CACHE_FILE: &str = "ip_networks_cache.json";

/// File collecting addresses whose RIR lookup failed
pub const NOT_FOUND_FILE: &str = "not_found_list.txt";

/// Default lifetime of a cache entry (14 days)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// A resolved address or network record as returned by an RIR, plus the
/// reverse-DNS hostname when one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedNetwork {
    /// Normalized address this record was resolved for
    pub address: String,
    /// Covering CIDR block(s) reported by the registry
    #[serde(default)]
    pub cidr: String,
    /// Network name from the registry
    #[serde(default)]
    pub name: String,
    /// Registrant organization or registry remarks
    #[serde(default)]
    pub description: String,
    /// Country the block is registered in
    #[serde(default)]
    pub country: String,
    /// Registry responsible for the block (arin, ripe, apnic, ...)
    #[serde(default)]
    pub registry: String,
    /// Reverse-DNS hostname, for host addresses only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    /// When this record was last resolved
    pub last_resolved: DateTime<Utc>,
}

impl ResolvedNetwork {
    /// Build a record for a well-known range (private, loopback, ...) that is
    /// resolved locally and never cached.
    pub fn known(address: &str, description: &str) -> Self {
        Self {
            address: address.to_string(),
            cidr: String::new(),
            name: String::new(),
            description: description.to_string(),
            country: String::new(),
            registry: String::new(),
            fqdn: None,
            last_resolved: Utc::now(),
        }
    }

    /// True iff the record was resolved less than `ttl` ago at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now.signed_duration_since(self.last_resolved);
        age.num_seconds() < ttl.as_secs() as i64
    }
}

/// Persistent address-to-record store.
///
/// Owned exclusively by one engine run at a time; concurrent runs against the
/// same file are not supported (last writer wins on save).
pub struct NetworkCache {
    path: PathBuf,
    entries: HashMap<String, ResolvedNetwork>,
    not_found: Vec<String>,
    dirty: bool,
}

impl NetworkCache {
    /// Load the cache from `path`. A missing file yields an empty store; an
    /// unreadable or corrupt file is logged and also yields an empty store,
    /// so a damaged cache never blocks a run.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, ResolvedNetwork>>(&content)
            {
                Ok(entries) => {
                    info!("loaded {} cached entries from {:?}", entries.len(), path);
                    entries
                }
                Err(e) => {
                    warn!(
                        "cache file {:?} is corrupt, starting with an empty cache: {}",
                        path, e
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(
                    "unable to read cache file {:?}, starting with an empty cache: {}",
                    path, e
                );
                HashMap::new()
            }
        };

        Self {
            path,
            entries,
            not_found: Vec::new(),
            dirty: false,
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in the store
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if entries were added since the last save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Look up a record by its normalized address key. Never performs any
    /// network access; freshness is the caller's decision.
    pub fn get(&self, key: &str) -> Option<&ResolvedNetwork> {
        self.entries.get(key)
    }

    /// Insert or overwrite the record stored under its address key.
    pub fn put(&mut self, entry: ResolvedNetwork) {
        self.entries.insert(entry.address.clone(), entry);
        self.dirty = true;
    }

    /// Remember an address whose RIR lookup failed; flushed to
    /// `not_found_list.txt` next to the cache file by [`save_not_found`].
    ///
    /// [`save_not_found`]: NetworkCache::save_not_found
    pub fn record_not_found(&mut self, address: &str) {
        self.not_found.push(address.to_string());
    }

    /// Count entries older than `ttl` at `now`.
    pub fn stale_count(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        self.entries
            .values()
            .filter(|e| !e.is_fresh(now, ttl))
            .count()
    }

    /// Drop all entries from the in-memory store.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }

    /// Persist the store to disk. The file is written next to its final
    /// location and atomically renamed into place, so a crash mid-write
    /// leaves the previous cache intact.
    pub fn save(&mut self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| anyhow!("Failed to serialize cache: {}", e))?;

        write_atomic(&self.path, content.as_bytes())
            .map_err(|e| anyhow!("Failed to write cache file {:?}: {}", self.path, e))?;

        info!("cached {} entries to {:?}", self.entries.len(), self.path);
        self.dirty = false;
        Ok(())
    }

    /// Append the not-found addresses collected during this run to
    /// `not_found_list.txt` in the cache file's directory, then reset the
    /// list. A run with no failures writes nothing.
    pub fn save_not_found(&mut self) -> Result<()> {
        if self.not_found.is_empty() {
            return Ok(());
        }

        let path = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.join(NOT_FOUND_FILE))
            .unwrap_or_else(|| PathBuf::from(NOT_FOUND_FILE));

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| anyhow!("Failed to open {:?}: {}", path, e))?;

        for address in &self.not_found {
            writeln!(file, "{}", address)
                .map_err(|e| anyhow!("Failed to append to {:?}: {}", path, e))?;
        }

        self.not_found.clear();
        Ok(())
    }
}

/// Write `contents` to `path` through a temporary sibling file and an atomic
/// rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_entry(address: &str) -> ResolvedNetwork {
        ResolvedNetwork {
            address: address.to_string(),
            cidr: "1.1.1.0/24".to_string(),
            name: "APNIC-LABS".to_string(),
            description: "APNIC and Cloudflare DNS Resolver project".to_string(),
            country: "AU".to_string(),
            registry: "apnic".to_string(),
            fqdn: Some("one.one.one.one".to_string()),
            last_resolved: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_yields_empty_store() {
        let dir = TempDir::new().unwrap();
        let cache = NetworkCache::load(dir.path().join("missing.json"));
        assert!(cache.is_empty());
        assert!(!cache.is_dirty());
    }

    #[test]
    fn test_corrupt_file_yields_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not valid json").unwrap();

        let cache = NetworkCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = NetworkCache::load(&path);
        cache.put(sample_entry("1.1.1.1"));
        cache.put(sample_entry("9.9.9.0/24"));
        cache.save().unwrap();
        assert!(!cache.is_dirty());

        let reloaded = NetworkCache::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.get("1.1.1.1"),
            cache.get("1.1.1.1"),
            "round-trip must preserve all fields including timestamps"
        );
        assert_eq!(reloaded.get("9.9.9.0/24"), cache.get("9.9.9.0/24"));
    }

    #[test]
    fn test_put_overwrites() {
        let dir = TempDir::new().unwrap();
        let mut cache = NetworkCache::load(dir.path().join("cache.json"));

        cache.put(sample_entry("1.1.1.1"));
        let mut updated = sample_entry("1.1.1.1");
        updated.name = "UPDATED".to_string();
        cache.put(updated);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("1.1.1.1").unwrap().name, "UPDATED");
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = NetworkCache::load(&path);
        cache.put(sample_entry("1.1.1.1"));
        cache.save().unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_is_fresh_boundaries() {
        let now = Utc::now();
        let mut entry = sample_entry("1.1.1.1");

        entry.last_resolved = now - chrono::Duration::days(13);
        assert!(entry.is_fresh(now, DEFAULT_CACHE_TTL));

        entry.last_resolved = now - chrono::Duration::days(15);
        assert!(!entry.is_fresh(now, DEFAULT_CACHE_TTL));
    }

    #[test]
    fn test_stale_count() {
        let dir = TempDir::new().unwrap();
        let mut cache = NetworkCache::load(dir.path().join("cache.json"));
        let now = Utc::now();

        let mut stale = sample_entry("1.1.1.1");
        stale.last_resolved = now - chrono::Duration::days(20);
        cache.put(stale);
        cache.put(sample_entry("9.9.9.9"));

        assert_eq!(cache.stale_count(now, DEFAULT_CACHE_TTL), 1);
    }

    #[test]
    fn test_save_not_found_appends_and_resets() {
        let dir = TempDir::new().unwrap();
        let mut cache = NetworkCache::load(dir.path().join("cache.json"));

        cache.record_not_found("203.0.113.7");
        cache.save_not_found().unwrap();
        cache.record_not_found("203.0.113.8");
        cache.save_not_found().unwrap();
        // empty flush writes nothing further
        cache.save_not_found().unwrap();

        let content = fs::read_to_string(dir.path().join(NOT_FOUND_FILE)).unwrap();
        assert_eq!(content, "203.0.113.7\n203.0.113.8\n");
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let mut cache = NetworkCache::load(dir.path().join("cache.json"));
        cache.put(sample_entry("1.1.1.1"));
        cache.save().unwrap();

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.is_dirty());
    }
}
