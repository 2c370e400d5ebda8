//! CLI arguments and subcommands for oss-pm-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parses the level names used in config files and the `LEVEL` variable.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "off" => Some(LogLevel::Off),
            "error" | "fatal" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Log line encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Accepts `json` and `text`, plus `console` as used by older deployments.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "text" | "console" => Some(LogFormat::Text),
            _ => None,
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format for `collect`
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SampleFormat {
    /// Prometheus text exposition
    Prometheus,
    Json,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "oss-pm-exporter",
    about = "Prometheus exporter for OSS performance-management counters",
    long_about = "Prometheus exporter for OSS performance-management counters.\n\n\
                  Requests PM counter dumps from the OSS for the last collection window, \
                  copies them out of the OSS container, exposes them as labeled Prometheus \
                  samples and serves a per-location RAN/Core aggregation report.",
    version = env!("CARGO_PKG_VERSION"),
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides config and LEVEL)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Log encoding (overrides config and ENCODE)
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// PM metric definition file
    #[arg(long)]
    pub metric_config: Option<PathBuf>,

    /// Application metric definition file
    #[arg(long)]
    pub app_config: Option<PathBuf>,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration, metric definitions and directories
    Check {
        /// Also connect to the cluster with the configured kubeconfig
        #[arg(long)]
        cluster: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run one collection cycle and print the samples
    Collect {
        /// Read the dumps already in the CSV directory; no OSS request, no archiving
        #[arg(long)]
        offline: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "prometheus")]
        format: SampleFormat,
    },

    /// Build the aggregation report from the API directory and print it
    Report {
        /// Compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },

    /// Generate synthetic PM dumps
    GenerateTestdata {
        /// Output directory
        #[arg(short = 'o', long, default_value = "testdata")]
        output: PathBuf,

        /// Number of distinct locations
        #[arg(long, default_value_t = 4)]
        locations: usize,

        /// Data rows per location
        #[arg(long, default_value_t = 3)]
        rows_per_location: usize,
    },
}
