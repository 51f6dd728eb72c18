//! RDAP registry client
//!
//! One blocking query per address against the public `rdap.org` bootstrap
//! service, which redirects to the RIR responsible for the block. Requests
//! are spaced by a fixed minimum interval, and timeouts are retried a bounded
//! number of times; every other failure is returned to the caller with a
//! reason code and never aborts a batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use ureq::Agent;

use super::normalize::NormalizedAddress;

const RDAP_BASE_URL: &str = "https://rdap.org/ip";

/// Give up after this many timed-out attempts for one address
const RETRY_COUNT_MAX: u32 = 3;

/// Pause between retries after a timeout
const TIMEOUT_PAUSE: Duration = Duration::from_secs(10);

/// Registration metadata for one address or network, as reported by its RIR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RirRecord {
    /// Network name (e.g. "APNIC-LABS")
    pub name: String,
    /// Registry object handle
    pub handle: String,
    /// Covering CIDR block(s)
    pub cidr: String,
    /// Country of registration, when reported
    pub country: String,
    /// Responsible registry (arin, ripe, apnic, lacnic, afrinic)
    pub registry: String,
    /// Registrant organization or registry remarks
    pub description: String,
}

/// Why a registry query failed. Reported per address; the batch continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The registry has no record for this address
    NotFound,
    /// The service asked us to slow down
    RateLimited,
    /// The request timed out after all retries
    Timeout,
    /// Transport-level failure (connect, TLS, unexpected status)
    Transport(String),
    /// The response body could not be parsed as RDAP JSON
    Malformed(String),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::NotFound => write!(f, "address not found in registry data"),
            LookupError::RateLimited => write!(f, "rate limited by registry service"),
            LookupError::Timeout => write!(f, "request timed out"),
            LookupError::Transport(msg) => write!(f, "transport error: {}", msg),
            LookupError::Malformed(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl std::error::Error for LookupError {}

/// A single-address registry lookup. Implemented by [`RdapClient`]; test
/// doubles implement it to script engine behavior.
pub trait RirLookup {
    fn query(&mut self, addr: &NormalizedAddress) -> Result<RirRecord, LookupError>;
}

/// Blocking RDAP client with fixed inter-request pacing.
pub struct RdapClient {
    agent: Agent,
    base_url: String,
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RdapClient {
    pub fn new(min_interval: Duration, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            base_url: RDAP_BASE_URL.to_string(),
            min_interval,
            last_request: None,
        }
    }

    /// Sleep until at least `min_interval` has passed since the last request.
    fn pace(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_request = Some(Instant::now());
    }

    fn fetch(&self, url: &str) -> Result<Value, LookupError> {
        let mut response = self
            .agent
            .get(url)
            .header("Accept", "application/rdap+json")
            .call()
            .map_err(classify)?;

        response
            .body_mut()
            .read_json::<Value>()
            .map_err(|e| LookupError::Malformed(e.to_string()))
    }
}

impl RirLookup for RdapClient {
    fn query(&mut self, addr: &NormalizedAddress) -> Result<RirRecord, LookupError> {
        let url = format!("{}/{}", self.base_url, addr);
        let mut attempts = 0;

        loop {
            self.pace();
            debug!("querying {}", url);

            match self.fetch(&url) {
                Ok(value) => return record_from_response(&value),
                Err(LookupError::Timeout) => {
                    attempts += 1;
                    if attempts >= RETRY_COUNT_MAX {
                        return Err(LookupError::Timeout);
                    }
                    info!(
                        "pausing lookups for {}s after a likely timeout ({} of {} attempts)",
                        TIMEOUT_PAUSE.as_secs(),
                        attempts,
                        RETRY_COUNT_MAX
                    );
                    thread::sleep(TIMEOUT_PAUSE);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn classify(err: ureq::Error) -> LookupError {
    match err {
        ureq::Error::StatusCode(404) => LookupError::NotFound,
        ureq::Error::StatusCode(429) => LookupError::RateLimited,
        ureq::Error::Timeout(_) => LookupError::Timeout,
        ureq::Error::Io(ref e) if e.kind() == std::io::ErrorKind::TimedOut => LookupError::Timeout,
        other => LookupError::Transport(other.to_string()),
    }
}

// =============================================================================
// Response parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct RdapNetwork {
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default, rename = "startAddress")]
    start_address: Option<String>,
    #[serde(default, rename = "endAddress")]
    end_address: Option<String>,
    #[serde(default, rename = "cidr0_cidrs")]
    cidrs: Vec<RdapCidr>,
    #[serde(default)]
    port43: Option<String>,
    #[serde(default)]
    remarks: Vec<RdapRemark>,
    #[serde(default)]
    entities: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RdapCidr {
    #[serde(default)]
    v4prefix: Option<String>,
    #[serde(default)]
    length: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct RdapRemark {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Vec<String>,
}

fn record_from_response(value: &Value) -> Result<RirRecord, LookupError> {
    let network: RdapNetwork = serde_json::from_value(value.clone())
        .map_err(|e| LookupError::Malformed(e.to_string()))?;

    let handle = network.handle.unwrap_or_default();
    let name = network.name.unwrap_or_default();

    if handle.is_empty() && name.is_empty() && network.cidrs.is_empty() {
        return Err(LookupError::Malformed(
            "response carries no network object".to_string(),
        ));
    }

    let cidr = format_cidrs(&network.cidrs, &network.start_address, &network.end_address);
    let registry = derive_registry(network.port43.as_deref(), &handle);
    let description = registrant_name(&network.entities)
        .or_else(|| remark_text(&network.remarks))
        .unwrap_or_default();

    Ok(RirRecord {
        name,
        handle,
        cidr,
        country: network.country.unwrap_or_default(),
        registry,
        description,
    })
}

/// Join the reported CIDR blocks, falling back to the raw address range.
fn format_cidrs(
    cidrs: &[RdapCidr],
    start: &Option<String>,
    end: &Option<String>,
) -> String {
    let blocks: Vec<String> = cidrs
        .iter()
        .filter_map(|c| match (&c.v4prefix, c.length) {
            (Some(prefix), Some(length)) => Some(format!("{}/{}", prefix, length)),
            _ => None,
        })
        .collect();

    if !blocks.is_empty() {
        return blocks.join(", ");
    }

    match (start, end) {
        (Some(s), Some(e)) => format!("{} - {}", s, e),
        _ => String::new(),
    }
}

/// The registry name is not a literal RDAP field; derive it from the whois
/// referral host, falling back to well-known handle suffixes.
fn derive_registry(port43: Option<&str>, handle: &str) -> String {
    const REGISTRIES: [&str; 5] = ["arin", "ripe", "apnic", "lacnic", "afrinic"];

    if let Some(host) = port43 {
        let host = host.to_lowercase();
        for registry in REGISTRIES {
            if host.contains(registry) {
                return registry.to_string();
            }
        }
    }

    let handle = handle.to_uppercase();
    if handle.ends_with("-RIPE") {
        "ripe".to_string()
    } else if handle.ends_with("-AP") {
        "apnic".to_string()
    } else if handle.starts_with("NET-") {
        "arin".to_string()
    } else {
        String::new()
    }
}

/// Name of the registrant entity, dug out of its jCard.
fn registrant_name(entities: &[Value]) -> Option<String> {
    let has_role = |entity: &Value, role: &str| {
        entity
            .get("roles")
            .and_then(Value::as_array)
            .map(|roles| roles.iter().any(|r| r.as_str() == Some(role)))
            .unwrap_or(false)
    };

    let registrant = entities
        .iter()
        .find(|e| has_role(e, "registrant"))
        .or_else(|| entities.first())?;

    // jCard layout: ["vcard", [["version", {}, "text", "4.0"], ["fn", {}, "text", "Org Name"], ...]]
    let properties = registrant
        .get("vcardArray")
        .and_then(Value::as_array)?
        .get(1)
        .and_then(Value::as_array)?;

    properties.iter().find_map(|prop| {
        let prop = prop.as_array()?;
        if prop.first()?.as_str()? == "fn" {
            let text = prop.get(3)?.as_str()?;
            (!text.is_empty()).then(|| text.to_string())
        } else {
            None
        }
    })
}

fn remark_text(remarks: &[RdapRemark]) -> Option<String> {
    let remark = remarks
        .iter()
        .find(|r| {
            r.title
                .as_deref()
                .map(|t| t.eq_ignore_ascii_case("description"))
                .unwrap_or(false)
        })
        .or_else(|| remarks.first())?;

    let text = remark.description.join(" ");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_apnic_style_response() {
        let value = json!({
            "objectClassName": "ip network",
            "handle": "1.1.1.0 - 1.1.1.255",
            "name": "APNIC-LABS",
            "country": "AU",
            "startAddress": "1.1.1.0",
            "endAddress": "1.1.1.255",
            "cidr0_cidrs": [{"v4prefix": "1.1.1.0", "length": 24}],
            "port43": "whois.apnic.net",
            "remarks": [
                {"title": "description", "description": ["APNIC and Cloudflare DNS Resolver project"]}
            ]
        });

        let record = record_from_response(&value).unwrap();
        assert_eq!(record.name, "APNIC-LABS");
        assert_eq!(record.cidr, "1.1.1.0/24");
        assert_eq!(record.country, "AU");
        assert_eq!(record.registry, "apnic");
        assert_eq!(
            record.description,
            "APNIC and Cloudflare DNS Resolver project"
        );
    }

    #[test]
    fn test_record_prefers_registrant_entity() {
        let value = json!({
            "handle": "NET-8-8-8-0-2",
            "name": "GOGL",
            "startAddress": "8.8.8.0",
            "endAddress": "8.8.8.255",
            "cidr0_cidrs": [{"v4prefix": "8.8.8.0", "length": 24}],
            "port43": "whois.arin.net",
            "entities": [
                {
                    "roles": ["registrant"],
                    "vcardArray": ["vcard", [
                        ["version", {}, "text", "4.0"],
                        ["fn", {}, "text", "Google LLC"]
                    ]]
                }
            ]
        });

        let record = record_from_response(&value).unwrap();
        assert_eq!(record.registry, "arin");
        assert_eq!(record.description, "Google LLC");
        assert_eq!(record.country, "");
    }

    #[test]
    fn test_cidr_falls_back_to_address_range() {
        let value = json!({
            "handle": "192.0.2.0-RIPE",
            "name": "TEST-NET",
            "startAddress": "192.0.2.0",
            "endAddress": "192.0.2.255"
        });

        let record = record_from_response(&value).unwrap();
        assert_eq!(record.cidr, "192.0.2.0 - 192.0.2.255");
        assert_eq!(record.registry, "ripe");
    }

    #[test]
    fn test_multiple_cidrs_joined() {
        let cidrs = vec![
            RdapCidr {
                v4prefix: Some("10.0.0.0".to_string()),
                length: Some(9),
            },
            RdapCidr {
                v4prefix: Some("10.128.0.0".to_string()),
                length: Some(9),
            },
        ];
        assert_eq!(
            format_cidrs(&cidrs, &None, &None),
            "10.0.0.0/9, 10.128.0.0/9"
        );
    }

    #[test]
    fn test_derive_registry_from_port43() {
        assert_eq!(derive_registry(Some("whois.ripe.net"), ""), "ripe");
        assert_eq!(derive_registry(Some("whois.lacnic.net"), ""), "lacnic");
        assert_eq!(derive_registry(None, "AS-EXAMPLE-AP"), "apnic");
        assert_eq!(derive_registry(None, "UNKNOWN"), "");
    }

    #[test]
    fn test_empty_response_is_malformed() {
        let value = json!({"notices": []});
        assert!(matches!(
            record_from_response(&value),
            Err(LookupError::Malformed(_))
        ));
    }

    #[test]
    fn test_lookup_error_display() {
        assert_eq!(
            LookupError::NotFound.to_string(),
            "address not found in registry data"
        );
        assert!(LookupError::Transport("boom".to_string())
            .to_string()
            .contains("boom"));
    }
}
