//! OSS PM counter exporter library.
//!
//! Harvests performance-management counter dumps from an OSS, copies them
//! out of the OSS container, converts them into labeled Prometheus samples
//! and correlates RAN/Core dumps into an aggregation report.
//!
//! # Modules
//!
//! - [`window`]: collection time window
//! - [`oss`]: OSS performance-data requests
//! - [`remote`]: container copy channel and service-account tokens
//! - [`tabular`]: PM dump loading
//! - [`descriptors`]: metric definition files
//! - [`aggregator`]: sample extraction and per-location correlation
//! - [`lifecycle`]: family files, archive tree and API staging
//! - [`pipeline`]: the per-family retrieval cycle
//! - [`collectors`]: scrape-time adapters and exposition
//!
//! # Usage
//!
//! ```rust
//! use oss_pm_exporter::aggregator::generic::extract_generic;
//! use oss_pm_exporter::descriptors::parse_pm_descriptors;
//! use oss_pm_exporter::tabular::Dataset;
//!
//! let yaml = "metrics:\n  du_power:\n    description: DU_Power_Consumption\n    type: gauge\n    labels: [a, b, c, d, e, f, g]\n    value_sequence: 7\n";
//! let descriptors = parse_pm_descriptors(yaml, "p5g_exporter").unwrap();
//!
//! let row: Vec<String> = ["1", "DU", "du-1", "t0", "900", "OK", "LOC1", "42.5"]
//!     .iter()
//!     .map(|s| s.to_string())
//!     .collect();
//! let dataset = Dataset::from_rows(vec![vec![], vec![], vec![], row]);
//!
//! let samples = extract_generic(&dataset, &descriptors[0]).unwrap();
//! assert_eq!(samples[0].name, "p5g_exporter_du_power");
//! assert_eq!(samples[0].value, 42.5);
//! ```

pub mod aggregator;
pub mod collectors;
pub mod descriptors;
pub mod error;
pub mod lifecycle;
pub mod oss;
pub mod pipeline;
pub mod remote;
pub mod tabular;
pub mod window;

pub use error::PmError;
