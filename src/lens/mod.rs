//! Lens module
//!
//! This module provides high-level "lens" abstractions that combine business
//! logic with output formatting. Lenses are designed to be reusable across
//! different interfaces (CLI, library consumers).
//!
//! # Architecture
//!
//! - `resolve`: the lookup engine ([`ResolveLens`]) plus its collaborators:
//!   address normalization, the RDAP client, and the reverse-DNS resolver
//! - `export`: flat-record projections of a finished run (JSON, CSV)
//! - `sheet`: in-place annotation of SSL-inspection spreadsheets (CSV)
//! - `utils`: shared output-format helpers
//!
//! All resolution work goes through [`ResolveLens`]; `export` and `sheet` are
//! thin adapters that map one engine run onto their respective output shapes.
//!
//! [`ResolveLens`]: resolve::ResolveLens

pub mod export;
pub mod resolve;
pub mod sheet;
pub mod utils;
