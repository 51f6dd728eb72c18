use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_FILE;
use crate::lens::resolve::ResolveOptions;

pub struct SpyglassConfig {
    /// Path to the persistent lookup cache file
    pub cache_file: String,

    /// Cache entry lifetime in days (default: 14)
    pub cache_ttl_days: u64,

    /// Number of network lookups between cooldown pauses (default: 10)
    pub pause_every: usize,

    /// Cooldown pause length in seconds (default: 2)
    pub cooldown_secs: u64,

    /// Number of network lookups between cache checkpoints (default: 100)
    pub save_interval: usize,

    /// Minimum spacing between outbound RDAP requests in milliseconds
    /// (default: 500)
    pub request_interval_ms: u64,

    /// Timeout for a single RDAP request in seconds (default: 30)
    pub request_timeout_secs: u64,
}

const EMPTY_CONFIG: &str = r#"### spyglass configuration file

### path to the persistent lookup cache
# cache_file = "ip_networks_cache.json"

### cache entry lifetime (in days)
# cache_ttl_days = 14

### outbound request pacing
# pause_every = 10            # lookups between cooldown pauses
# cooldown_secs = 2           # cooldown pause length
# save_interval = 100         # lookups between cache checkpoints
# request_interval_ms = 500   # minimum spacing between RDAP requests
# request_timeout_secs = 30
"#;

impl Default for SpyglassConfig {
    fn default() -> Self {
        Self {
            cache_file: DEFAULT_CACHE_FILE.to_string(),
            cache_ttl_days: 14,
            pause_every: 10,
            cooldown_secs: 2,
            save_interval: 100,
            request_interval_ms: 500,
            request_timeout_secs: 30,
        }
    }
}

impl SpyglassConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<SpyglassConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.spyglass/spyglass.toml as the configuration file
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let spyglass_dir = format!("{}/.spyglass", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(spyglass_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create spyglass directory: {}", e))?;
                let p = format!("{}/spyglass.toml", spyglass_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of SPYGLASS)
        // E.g., `SPYGLASS_CACHE_FILE=./cache.json spyglass ...` would set the
        // cache file path
        builder = builder.add_source(config::Environment::with_prefix("SPYGLASS"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let values = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let defaults = SpyglassConfig::default();

        let cache_file = values
            .get("cache_file")
            .cloned()
            .unwrap_or(defaults.cache_file);

        let cache_ttl_days = values
            .get("cache_ttl_days")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cache_ttl_days);

        let pause_every = values
            .get("pause_every")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.pause_every);

        let cooldown_secs = values
            .get("cooldown_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cooldown_secs);

        let save_interval = values
            .get("save_interval")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.save_interval);

        let request_interval_ms = values
            .get("request_interval_ms")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.request_interval_ms);

        let request_timeout_secs = values
            .get("request_timeout_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        Ok(SpyglassConfig {
            cache_file,
            cache_ttl_days,
            pause_every,
            cooldown_secs,
            save_interval,
            request_interval_ms,
            request_timeout_secs,
        })
    }

    /// Get cache TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_days * 24 * 60 * 60)
    }

    /// Get cooldown pause as Duration
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Get minimum RDAP request spacing as Duration
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    /// Get RDAP request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Engine options derived from this configuration
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            ttl: self.cache_ttl(),
            pause_every: self.pause_every,
            cooldown: self.cooldown(),
            save_interval: self.save_interval,
        }
    }
}
