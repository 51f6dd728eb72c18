//! Resolution engine types

use serde::Serialize;
use std::fmt;

use crate::cache::ResolvedNetwork;

/// Why a token ended up unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// The token never parsed as an IPv4 address or network; no network
    /// access was attempted for it
    InvalidAddress,
    /// The registry query was attempted and failed, with the reason
    LookupFailure(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InvalidAddress => write!(f, "invalid address"),
            FailureReason::LookupFailure(reason) => write!(f, "lookup failed: {}", reason),
        }
    }
}

/// What one input token resolved to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    Resolved(ResolvedNetwork),
    Unresolved(FailureReason),
}

impl Outcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Outcome::Resolved(_))
    }

    pub fn record(&self) -> Option<&ResolvedNetwork> {
        match self {
            Outcome::Resolved(record) => Some(record),
            Outcome::Unresolved(_) => None,
        }
    }
}

/// One input token together with its outcome. Tokens that normalize to the
/// same key share a record but keep their own entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenResolution {
    pub token: String,
    pub outcome: Outcome,
}

/// The outcome of a batch run, in input order, one entry per input token.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
    records: Vec<TokenResolution>,
}

impl Resolution {
    pub(crate) fn new(records: Vec<TokenResolution>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[TokenResolution] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Outcome for the first entry matching `token`.
    pub fn get(&self, token: &str) -> Option<&Outcome> {
        self.records
            .iter()
            .find(|r| r.token == token)
            .map(|r| &r.outcome)
    }

    pub fn resolved_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome.is_resolved())
            .count()
    }
}

/// Counters for one engine invocation, reset each run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Distinct addresses served from a fresh cache entry
    pub cache_hits: usize,
    /// Network lookups attempted, including failed ones
    pub lookups: usize,
    /// Tokens rejected by the normalizer
    pub invalid: usize,
    /// Attempted lookups that failed
    pub not_found: usize,
    /// Cooldown pauses taken between lookup bursts
    pub cooldowns: usize,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cache hits | {} lookups | {} not found | {} invalid",
            self.cache_hits, self.lookups, self.not_found, self.invalid
        )
    }
}
