//! Collector adapters.
//!
//! - [`csv`]: OSS PM dumps, one retrieval cycle per `/metrics` scrape
//! - [`json`]: metrics-query endpoints served on per-application paths
//! - [`exposition`]: per-scrape Prometheus registration of samples

pub mod csv;
pub mod exposition;
pub mod json;
