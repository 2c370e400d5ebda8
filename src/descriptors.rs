//! Metric descriptors loaded from the metric definition files.
//!
//! Two files feed the exporter:
//! - the PM metric file (`cnf_config.yml`), one entry per PM counter metric,
//!   whose `description` names the family dump to read and whose
//!   `value_sequence` is the value column;
//! - the application file (`app_config.yml`), mapping an HTTP path to the
//!   metrics-query descriptors served on that path.
//!
//! Both are read once before the first scrape and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::aggregator::generic::LABEL_COLUMNS;
use crate::error::PmError;

/// Prometheus metric type of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    /// Case-insensitive parse; `None` for anything but counter/gauge.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "counter" => Some(MetricKind::Counter),
            "gauge" => Some(MetricKind::Gauge),
            _ => None,
        }
    }
}

/// Declarative description of one exported metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub name: String,
    pub prefix: String,
    /// Raw type as written in the file. Unknown values are kept so the
    /// extractor can skip them with a warning at scrape time.
    pub kind: String,
    pub description: String,
    /// Label names; sample label values must follow this order.
    pub labels: Vec<String>,
    pub value_column: usize,
    pub url: Option<String>,
}

impl MetricDescriptor {
    /// Fully qualified metric name, `<prefix>_<name>`.
    pub fn fq_name(&self) -> String {
        if self.prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{}_{}", self.prefix, self.name)
        }
    }

    pub fn metric_kind(&self) -> Option<MetricKind> {
        MetricKind::parse(&self.kind)
    }
}

#[derive(Debug, Deserialize)]
struct PmMetricFile {
    #[serde(default)]
    metrics: BTreeMap<String, PmMetricEntry>,
}

#[derive(Debug, Deserialize)]
struct PmMetricEntry {
    description: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(alias = "value-sequence", alias = "valueSequence")]
    value_sequence: usize,
}

#[derive(Debug, Deserialize)]
struct AppCollector {
    #[serde(default)]
    collects: Vec<AppCollect>,
}

#[derive(Debug, Deserialize)]
struct AppCollect {
    #[serde(default)]
    metrics: BTreeMap<String, AppMetricEntry>,
}

#[derive(Debug, Deserialize)]
struct AppMetricEntry {
    #[serde(default)]
    prefix: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    description: String,
    url: String,
    #[serde(default)]
    labels: Vec<String>,
}

/// Immutable descriptor snapshot shared by all scrapes.
#[derive(Debug, Clone, Default)]
pub struct DescriptorSet {
    /// PM counter metrics served on the global `/metrics` path.
    pub pm: Vec<MetricDescriptor>,
    /// Metrics-query descriptors keyed by HTTP path (without leading `/`).
    pub apps: BTreeMap<String, Vec<MetricDescriptor>>,
}

impl DescriptorSet {
    /// Loads both descriptor files. A missing file yields an empty section
    /// and a warning; a malformed file is an error.
    pub fn load(pm_path: &Path, app_path: &Path, pm_prefix: &str) -> Result<Self, PmError> {
        let pm = match read_optional(pm_path)? {
            Some(content) => parse_pm_descriptors(&content, pm_prefix)?,
            None => Vec::new(),
        };
        let apps = match read_optional(app_path)? {
            Some(content) => parse_app_descriptors(&content)?,
            None => BTreeMap::new(),
        };

        info!(
            "Loaded {} PM metric descriptors and {} application paths",
            pm.len(),
            apps.len()
        );
        Ok(Self { pm, apps })
    }

    pub fn app_metric_count(&self) -> usize {
        self.apps.values().map(Vec::len).sum()
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, PmError> {
    if !path.exists() {
        warn!("Metric definition file not found: {}", path.display());
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(path)?))
}

/// Parses the PM metric definition file.
pub fn parse_pm_descriptors(content: &str, prefix: &str) -> Result<Vec<MetricDescriptor>, PmError> {
    let file: PmMetricFile = serde_yaml::from_str(content)
        .map_err(|e| PmError::Config(format!("invalid PM metric file: {e}")))?;

    let mut out = Vec::with_capacity(file.metrics.len());
    for (name, entry) in file.metrics {
        if entry.labels.len() != LABEL_COLUMNS {
            warn!(
                metric = %name,
                "PM metric declares {} labels but dumps carry {} label columns",
                entry.labels.len(),
                LABEL_COLUMNS
            );
        }
        if MetricKind::parse(&entry.kind).is_none() {
            warn!(metric = %name, kind = %entry.kind, "Metric type is not counter|gauge, it will be skipped");
        }
        out.push(MetricDescriptor {
            name,
            prefix: prefix.to_string(),
            kind: entry.kind,
            description: entry.description,
            labels: entry.labels,
            value_column: entry.value_sequence,
            url: None,
        });
    }
    Ok(out)
}

/// Parses the application definition file (path → metrics-query descriptors).
pub fn parse_app_descriptors(
    content: &str,
) -> Result<BTreeMap<String, Vec<MetricDescriptor>>, PmError> {
    let file: BTreeMap<String, AppCollector> = serde_yaml::from_str(content)
        .map_err(|e| PmError::Config(format!("invalid application metric file: {e}")))?;

    let mut out = BTreeMap::new();
    for (path, collector) in file {
        let path = path.trim_start_matches('/').to_string();
        if path.is_empty() || path == "metrics" || path.starts_with("api/") {
            return Err(PmError::Config(format!(
                "application path '/{path}' collides with a built-in endpoint"
            )));
        }

        let descriptors = collector
            .collects
            .into_iter()
            .flat_map(|c| c.metrics.into_iter())
            .map(|(name, entry)| MetricDescriptor {
                name,
                prefix: entry.prefix,
                kind: entry.kind,
                description: entry.description,
                labels: entry.labels,
                value_column: 0,
                url: Some(entry.url),
            })
            .collect();
        out.insert(path, descriptors);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PM_FILE: &str = r#"
metrics:
  du_power_consumption:
    description: DU_Power_Consumption
    type: gauge
    labels: [ne_id, ne_type, ne_name, init_time, duration, status, location]
    value_sequence: 7
  uecon_attempt:
    description: UECON_AMF
    type: Counter
    labels: [ne_id, ne_type, ne_name, init_time, duration, status, location]
    value_sequence: 7
"#;

    const APP_FILE: &str = r#"
mec:
  collects:
    - metrics:
        mec_cpu_usage:
          prefix: p5g_mec
          type: gauge
          description: mec cpu usage
          url: https://prometheus.example/api/v1/query?query=cpu
          labels: [container, cpu, endpoint, instance, job, mode, namespace, pod, service]
"#;

    #[test]
    fn test_parse_pm_descriptors() {
        let descriptors = parse_pm_descriptors(PM_FILE, "p5g_exporter").unwrap();
        assert_eq!(descriptors.len(), 2);
        let du = &descriptors[0];
        assert_eq!(du.fq_name(), "p5g_exporter_du_power_consumption");
        assert_eq!(du.description, "DU_Power_Consumption");
        assert_eq!(du.value_column, 7);
        assert_eq!(du.metric_kind(), Some(MetricKind::Gauge));
        assert_eq!(descriptors[1].metric_kind(), Some(MetricKind::Counter));
    }

    #[test]
    fn test_parse_app_descriptors() {
        let apps = parse_app_descriptors(APP_FILE).unwrap();
        let mec = &apps["mec"];
        assert_eq!(mec.len(), 1);
        assert_eq!(mec[0].fq_name(), "p5g_mec_mec_cpu_usage");
        assert_eq!(mec[0].labels.len(), 9);
        assert!(mec[0].url.is_some());
    }

    #[test]
    fn test_app_path_cannot_shadow_builtin() {
        let yaml = "metrics:\n  collects: []\n";
        assert!(parse_app_descriptors(yaml).is_err());
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        let yaml = "metrics:\n  x:\n    description: X\n    type: histogram\n    labels: []\n    value_sequence: 7\n";
        let descriptors = parse_pm_descriptors(yaml, "p").unwrap();
        assert_eq!(descriptors[0].metric_kind(), None);
    }
}
