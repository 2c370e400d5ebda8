//! Configuration management for oss-pm-exporter.
//!
//! This module handles loading, merging, and validating configuration from files,
//! environment variables and CLI arguments. It supports YAML, JSON, and TOML formats.
//!
//! Precedence: CLI > environment > config file > default.

use oss_pm_exporter::aggregator::report::ReportSources;
use oss_pm_exporter::aggregator::schema::DumpSchema;
use oss_pm_exporter::remote::{ContainerRef, ServiceAccountRef};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::{Args, ConfigFormat, LogFormat, LogLevel};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_METRIC_CONFIG: &str = "cnf_config.yml";
pub const DEFAULT_APP_CONFIG: &str = "app_config.yml";
pub const DEFAULT_METRIC_PREFIX: &str = "p5g_exporter";
pub const DEFAULT_OSS_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PACING_MS: u64 = 1000;
pub const DEFAULT_MEC_CONFIG: &str = "/mnt/data/config";
pub const DEFAULT_TOKEN_PREFIX: &str = "p5g_mec";

const REDACTED: &str = "********";

/// Local directories and the family lists driving a cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Where fresh dumps land and the archive tree lives
    #[serde(alias = "CSV_PATH")]
    pub csv_path: Option<PathBuf>,
    /// Flat directory read by /api/metrics
    #[serde(alias = "API_PATH")]
    pub api_path: Option<PathBuf>,
    /// Families requested from the OSS every cycle
    #[serde(alias = "FAMILY_NAME")]
    pub family_name: Vec<String>,
    /// RAN dumps staged for the aggregation API
    #[serde(alias = "RAN_NAME")]
    pub ran_name: Vec<String>,
    /// Core dumps staged for the aggregation API
    #[serde(alias = "CORE_NAME")]
    pub core_name: Vec<String>,
}

/// OSS performance-data endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OssConfig {
    #[serde(alias = "curl_url", alias = "CURL_URL")]
    pub url: Option<String>,
    #[serde(alias = "oss_username", alias = "OSS_USERNAME")]
    pub username: Option<String>,
    #[serde(alias = "oss_password", alias = "OSS_PASSWORD")]
    pub password: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Delay after each successful family request
    pub pacing_ms: Option<u64>,
    /// Upper bound for request + copy of one family (unset = none)
    pub family_deadline_seconds: Option<u64>,
}

impl Default for OssConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            timeout_seconds: Some(DEFAULT_OSS_TIMEOUT_SECS),
            pacing_ms: Some(DEFAULT_PACING_MS),
            family_deadline_seconds: None,
        }
    }
}

/// Container holding the dumps produced by the OSS.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Kubeconfig path; unset means $KUBECONFIG or ~/.kube/config
    pub kubeconfig: Option<PathBuf>,
    pub container: ContainerRef,
}

/// Token minting for metrics-query descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    #[serde(alias = "mec_config", alias = "MEC_CONFIG")]
    pub kubeconfig: Option<PathBuf>,
    pub token_prefix: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub service_account: ServiceAccountRef,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            kubeconfig: Some(PathBuf::from(DEFAULT_MEC_CONFIG)),
            token_prefix: Some(DEFAULT_TOKEN_PREFIX.into()),
            timeout_seconds: Some(DEFAULT_OSS_TIMEOUT_SECS),
            service_account: ServiceAccountRef::default(),
        }
    }
}

/// Aggregation report inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub sources: ReportSources,
    pub schema: DumpSchema,
}

/// Effective configuration. Keys absent from a config file keep their
/// default values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Feature flags
    pub enable_health: Option<bool>,

    // Logging
    #[serde(alias = "LEVEL")]
    pub log_level: Option<String>,
    #[serde(alias = "ENCODE", alias = "log_encode")]
    pub log_format: Option<String>,

    // Metric definition files
    #[serde(alias = "metric-config")]
    pub metric_config: Option<PathBuf>,
    #[serde(alias = "app-config", alias = "config-metrics")]
    pub app_config: Option<PathBuf>,
    pub metric_prefix: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    pub file: FileConfig,
    #[serde(alias = "exporter")]
    pub oss: OssConfig,
    pub cluster: ClusterConfig,
    pub monitoring: MonitoringConfig,
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            enable_health: Some(true),
            log_level: Some("info".into()),
            log_format: Some("text".into()),
            metric_config: Some(PathBuf::from(DEFAULT_METRIC_CONFIG)),
            app_config: Some(PathBuf::from(DEFAULT_APP_CONFIG)),
            metric_prefix: Some(DEFAULT_METRIC_PREFIX.into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            file: FileConfig::default(),
            oss: OssConfig::default(),
            cluster: ClusterConfig::default(),
            monitoring: MonitoringConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Config {
    pub fn csv_path(&self) -> PathBuf {
        self.file
            .csv_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn api_path(&self) -> PathBuf {
        self.file
            .api_path
            .clone()
            .unwrap_or_else(|| self.csv_path().join("api"))
    }

    pub fn metric_config_path(&self) -> PathBuf {
        self.metric_config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_METRIC_CONFIG))
    }

    pub fn app_config_path(&self) -> PathBuf {
        self.app_config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_APP_CONFIG))
    }

    pub fn metric_prefix(&self) -> &str {
        self.metric_prefix.as_deref().unwrap_or(DEFAULT_METRIC_PREFIX)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::from_name)
            .unwrap_or(LogLevel::Info)
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
            .as_deref()
            .and_then(LogFormat::from_name)
            .unwrap_or(LogFormat::Text)
    }

    /// Copy safe to print or serve: the OSS password is masked.
    pub fn redacted(&self) -> Config {
        let mut copy = self.clone();
        if copy.oss.password.as_deref().is_some_and(|p| !p.is_empty()) {
            copy.oss.password = Some(REDACTED.to_string());
        }
        copy
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Applies environment overrides. Unset and empty variables are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("CSV_PATH") {
        config.file.csv_path = Some(PathBuf::from(v));
    }
    if let Some(v) = get("API_PATH") {
        config.file.api_path = Some(PathBuf::from(v));
    }
    if let Some(v) = get("FAMILY_NAME") {
        config.file.family_name = split_list(&v);
    }
    if let Some(v) = get("RAN_NAME") {
        config.file.ran_name = split_list(&v);
    }
    if let Some(v) = get("CORE_NAME") {
        config.file.core_name = split_list(&v);
    }
    if let Some(v) = get("CURL_URL") {
        config.oss.url = Some(v);
    }
    if let Some(v) = get("OSS_USERNAME") {
        config.oss.username = Some(v);
    }
    if let Some(v) = get("OSS_PASSWORD") {
        config.oss.password = Some(v);
    }
    if let Some(v) = get("MEC_CONFIG") {
        config.monitoring.kubeconfig = Some(PathBuf::from(v));
    }
    if let Some(v) = get("LEVEL") {
        config.log_level = Some(v.to_ascii_lowercase());
    }
    if let Some(v) = get("ENCODE") {
        config.log_format = Some(v.to_ascii_lowercase());
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = cfg.log_level.as_deref() {
        if LogLevel::from_name(level).is_none() {
            return Err(format!("Invalid log_level '{}'", level).into());
        }
    }
    if let Some(format) = cfg.log_format.as_deref() {
        if LogFormat::from_name(format).is_none() {
            return Err(format!("Invalid log_format '{}', expected 'text' or 'json'", format).into());
        }
    }

    if let Some(url) = cfg.oss.url.as_deref() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("OSS url must start with http:// or https://: {}", url).into());
        }
    }
    if !cfg.file.family_name.is_empty() && cfg.oss.url.is_none() {
        return Err("file.family_name is set but oss.url is not".into());
    }
    if cfg.oss.timeout_seconds == Some(0) {
        return Err("oss.timeout_seconds must be greater than 0".into());
    }
    if cfg.oss.family_deadline_seconds == Some(0) {
        return Err("oss.family_deadline_seconds must be greater than 0".into());
    }

    if cfg.csv_path() == cfg.api_path() {
        return Err("file.api_path must differ from file.csv_path".into());
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", what, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into()),
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Ok(_) => Ok(()),
    }
}

/// Resolves configuration from CLI args, environment, config file, and defaults.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    resolve_config_with_env(args, |key| std::env::var(key).ok())
}

pub fn resolve_config_with_env<F>(args: &Args, lookup: F) -> Result<Config, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref(), lookup("ENV").as_deref())?
    };

    apply_env_overrides(&mut config, &lookup);

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{level:?}").to_ascii_lowercase());
    }
    if let Some(format) = args.log_format {
        config.log_format = Some(format!("{format:?}").to_ascii_lowercase());
    }
    if let Some(path) = &args.metric_config {
        config.metric_config = Some(path.clone());
    }
    if let Some(path) = &args.app_config {
        config.app_config = Some(path.clone());
    }
    if args.disable_health {
        config.enable_health = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Default locations, searched in order. `ENV=prd` selects `config.yml`,
/// anything else `config_local.yml`.
fn default_locations(env: Option<&str>) -> Vec<PathBuf> {
    let local = match env {
        Some("prd") => "./config.yml",
        _ => "./config_local.yml",
    };
    vec![
        PathBuf::from(local),
        PathBuf::from("/etc/oss-pm-exporter/config.yaml"),
        PathBuf::from("/etc/oss-pm-exporter/config.yml"),
        PathBuf::from("/etc/oss-pm-exporter/config.json"),
    ]
}

/// Loads a config file; with no explicit path the default locations are
/// searched and a missing file yields the defaults.
pub fn load_config(path: Option<&Path>, env: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => match default_locations(env).into_iter().find(|p| p.exists()) {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders a config in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows the effective configuration (password redacted)
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = render_config(&config.redacted(), format)?;
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["oss-pm-exporter", "--no-config"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CSV_PATH", "/data/csv"),
            ("FAMILY_NAME", "DU Power Consumption, UECON_AMF"),
            ("CURL_URL", "https://oss.local/pm"),
            ("OSS_PASSWORD", "secret"),
            ("LEVEL", "DEBUG"),
            ("ENCODE", "JSON"),
            ("API_PATH", ""),
        ]
        .into_iter()
        .collect();

        let cfg = resolve_config_with_env(&args(&[]), |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.csv_path(), PathBuf::from("/data/csv"));
        assert_eq!(cfg.api_path(), PathBuf::from("/data/csv/api"));
        assert_eq!(cfg.file.family_name, vec!["DU Power Consumption", "UECON_AMF"]);
        assert_eq!(cfg.log_level(), LogLevel::Debug);
        assert_eq!(cfg.log_format(), LogFormat::Json);
        assert_eq!(cfg.redacted().oss.password.as_deref(), Some(REDACTED));
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn test_cli_beats_env() {
        let cfg = resolve_config_with_env(&args(&["--port", "9100", "--log-level", "warn"]), |k| {
            (k == "LEVEL").then(|| "debug".to_string())
        })
        .unwrap();
        assert_eq!(cfg.port, Some(9100));
        assert_eq!(cfg.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_yaml_file_with_legacy_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            r#"
file:
  csv_path: /data/csv
  api_path: /data/api
  family_name: ["Air MAC Packet", "AMFMS"]
  core_name: [AMFMS]
exporter:
  curl_url: https://oss.local:7443/oss/performanceData
  oss_username: oss
  oss_password: pw
monitoring:
  mec_config: /mnt/data/config
cluster:
  container:
    pod: mfsm-1
"#,
        )
        .unwrap();

        let cfg = load_config(Some(&path), None).unwrap();
        assert_eq!(cfg.file.family_name.len(), 2);
        assert_eq!(cfg.oss.username.as_deref(), Some("oss"));
        assert_eq!(cfg.cluster.container.pod, "mfsm-1");
        assert_eq!(cfg.cluster.container.namespace, "usm-compact");
        assert_eq!(cfg.report.sources.mac_packet, "Air_MAC_Packet");
        assert_eq!(cfg.port, Some(DEFAULT_PORT));
        assert_eq!(cfg.oss.pacing_ms, Some(DEFAULT_PACING_MS));
        assert_eq!(cfg.monitoring.token_prefix.as_deref(), Some(DEFAULT_TOKEN_PREFIX));
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut cfg = Config::default();
        cfg.file.family_name = vec!["AMFMS".into()];
        assert!(validate_effective_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.oss.url = Some("ftp://oss".into());
        assert!(validate_effective_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.log_format = Some("xml".into());
        assert!(validate_effective_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.enable_tls = Some(true);
        cfg.tls_cert_path = Some("/nonexistent/cert.pem".into());
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("tls_key_path"));
    }

    #[test]
    fn test_default_config_is_valid_and_serializes() {
        let cfg = Config::default();
        assert!(validate_effective_config(&cfg).is_ok());
        for format in [ConfigFormat::Yaml, ConfigFormat::Json, ConfigFormat::Toml] {
            assert!(render_config(&cfg, format).is_ok());
        }
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        assert!(load_config(Some(Path::new("/nonexistent/config.yml")), None).is_err());
    }

    #[test]
    fn test_default_locations_follow_env() {
        assert_eq!(default_locations(Some("prd"))[0], PathBuf::from("./config.yml"));
        assert_eq!(default_locations(None)[0], PathBuf::from("./config_local.yml"));
    }
}
