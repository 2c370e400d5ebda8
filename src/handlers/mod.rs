//! HTTP endpoint handlers for the exporter.
//!
//! - `/metrics`: PM samples plus self-metrics
//! - `/<path>`: application metric paths
//! - `/api/metrics`: aggregation report
//! - `/health`: cycle statistics
//! - `/config`: effective configuration
//! - `/`: landing page

pub mod aggregate;
pub mod config;
pub mod device;
pub mod health;
pub mod metrics;
pub mod root;

// Re-export handlers
pub use aggregate::aggregate_handler;
pub use config::config_handler;
pub use device::device_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
