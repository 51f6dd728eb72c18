#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Spyglass - an IP-to-RIR resolution toolkit
//!
//! Spyglass resolves IPv4 addresses and networks into Regional Internet
//! Registry (RIR) registration information and reverse-DNS hostnames. It can
//! be used as both a command-line application and a library.
//!
//! Lookups go through a persistent on-disk cache so that repeated runs over
//! overlapping address sets avoid redundant RDAP queries, and outbound
//! requests are paced to stay within the public registry services' limits.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - **[`cache`]**: The persistent JSON cache store (`NetworkCache`) and the
//!   resolved-record type (`ResolvedNetwork`)
//! - **[`lens`]**: High-level business logic
//!   - `resolve`: The lookup engine (`ResolveLens`), address normalization,
//!     the RDAP client, and the reverse-DNS resolver
//!   - `export`: Flat-record projections of a run (JSON, CSV)
//!   - `sheet`: In-place annotation of SSL-inspection spreadsheets (CSV)
//!   - `utils`: Output format helpers
//! - **[`config`]**: Configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use spyglass::{NetworkCache, ResolveLens, SpyglassConfig};
//!
//! let config = SpyglassConfig::new(&None)?;
//! let cache = NetworkCache::load(&config.cache_file);
//! let mut lens = ResolveLens::new(cache, &config);
//!
//! let tokens = vec!["1.1.1.1".to_string(), "9.9.9.0/24".to_string()];
//! let (resolution, stats) = lens.resolve_batch(&tokens);
//!
//! println!("{} cache hits | {} lookups", stats.cache_hits, stats.lookups);
//! for record in resolution.records() {
//!     println!("{}: {:?}", record.token, record.outcome);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod lens;

// =============================================================================
// Configuration (always available)
// =============================================================================

pub use config::SpyglassConfig;

// =============================================================================
// Cache store
// =============================================================================

pub use cache::{
    NetworkCache, ResolvedNetwork, DEFAULT_CACHE_FILE, DEFAULT_CACHE_TTL, NOT_FOUND_FILE,
};

// =============================================================================
// Resolution engine
// =============================================================================

pub use lens::resolve::normalize::{normalize, InvalidAddress, NormalizedAddress};
pub use lens::resolve::rdap::{LookupError, RdapClient, RirLookup, RirRecord};
pub use lens::resolve::reverse::{PtrResolver, ReverseLookup};
pub use lens::resolve::{ResolveLens, ResolveOptions};
pub use lens::resolve::types::{FailureReason, Outcome, Resolution, RunStats, TokenResolution};

// =============================================================================
// Projections
// =============================================================================

pub use lens::export::{export_csv_file, export_json, export_json_file, record_to_json};
pub use lens::sheet::{annotate_sheet, SheetSummary};
pub use lens::utils::OutputFormat;
