//! Config command implementation.
//!
//! Writes a default configuration file in YAML, JSON or TOML.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("config_local.yml"));

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# OSS PM Exporter Configuration
# =============================
#
# Server
# ------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 8080                   # HTTP port
# enable_health: true          # Enable /health endpoint
#
# Logging (env: LEVEL, ENCODE)
# ----------------------------
# log_level: "info"            # off, error, warn, info, debug, trace
# log_format: "text"           # text or json
#
# Metric definitions
# ------------------
# metric_config: cnf_config.yml   # PM counter descriptors served on /metrics
# app_config: app_config.yml      # Per-path metrics-query descriptors
# metric_prefix: p5g_exporter     # Prefix of PM and self-metric names
#
# Files (env: CSV_PATH, API_PATH, FAMILY_NAME, RAN_NAME, CORE_NAME)
# -----------------------------------------------------------------
# file:
#   csv_path: /data/pm          # Fresh dumps and the <date>/<HHMM-HHMM> archive
#   api_path: /data/pm/api      # Flat copies read by /api/metrics
#   family_name: [...]          # Families requested every cycle
#   ran_name: [...]             # RAN dumps staged for /api/metrics
#   core_name: [...]            # Core dumps staged for /api/metrics
#
# OSS (env: CURL_URL, OSS_USERNAME, OSS_PASSWORD)
# -----------------------------------------------
# oss:
#   url: https://oss:7443/oss/performanceData
#   username / password         # Basic auth
#   timeout_seconds: 5          # Per request
#   pacing_ms: 1000             # Delay after each successful family
#   family_deadline_seconds     # Bound on request + copy of one family
#
# Cluster
# -------
# cluster:
#   kubeconfig: null            # null = $KUBECONFIG or ~/.kube/config
#   container: {namespace: usm-compact, pod: mfsm-0, container: process}
#
# Monitoring tokens (env: MEC_CONFIG)
# -----------------------------------
# monitoring:
#   kubeconfig: /mnt/data/config
#   token_prefix: p5g_mec       # Descriptors with this prefix get a bearer token
#   service_account: {namespace: openshift-monitoring, name: prometheus-k8s}
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}
