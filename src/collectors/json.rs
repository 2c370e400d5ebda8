//! Metrics-query adapter for the per-path application endpoints.
//!
//! Each descriptor carries a query URL returning the usual
//! `{status, data: {resultType, result: [{metric, value}]}}` envelope. Which
//! fields of `metric` become label values is decided by the descriptor's
//! description (`cpu`, `memory` or `pod`); any other description uses the
//! descriptor's own label names.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregator::MetricSample;
use crate::descriptors::MetricDescriptor;
use crate::error::PmError;
use crate::remote::{ClusterAccess, ServiceAccountRef};

pub const CPU_LABELS: &[&str] = &[
    "container", "cpu", "endpoint", "instance", "job", "mode", "namespace", "pod", "service",
];
pub const MEMORY_LABELS: &[&str] = &[
    "container", "endpoint", "instance", "job", "namespace", "pod", "service",
];
pub const POD_LABELS: &[&str] = &["container", "namespace", "node", "pod"];

#[derive(Debug, Deserialize)]
struct QueryEnvelope {
    #[serde(default)]
    status: String,
    data: QueryData,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    /// `[timestamp, "value"]`
    #[serde(default)]
    value: Vec<serde_json::Value>,
}

/// Label fields selected for a descriptor.
pub fn label_fields(descriptor: &MetricDescriptor) -> Vec<&str> {
    let selected = if descriptor.description.contains("cpu") {
        Some(CPU_LABELS)
    } else if descriptor.description.contains("memory") {
        Some(MEMORY_LABELS)
    } else if descriptor.description.contains("pod") {
        Some(POD_LABELS)
    } else {
        None
    };
    match selected {
        Some(fields) => fields.to_vec(),
        None => descriptor.labels.iter().map(String::as_str).collect(),
    }
}

/// Converts a query response body into samples.
///
/// Rows whose value does not parse or whose label count does not match the
/// descriptor are skipped; an unreadable envelope fails the descriptor.
pub fn parse_query_response(body: &str, descriptor: &MetricDescriptor) -> Result<Vec<MetricSample>, PmError> {
    let Some(kind) = descriptor.metric_kind() else {
        warn!(
            metric = %descriptor.name,
            kind = %descriptor.kind,
            "Metric type support only counter|gauge, skip"
        );
        return Ok(Vec::new());
    };

    let envelope: QueryEnvelope = serde_json::from_str(body)
        .map_err(|e| PmError::parse(descriptor.description.clone(), e))?;
    if !envelope.status.is_empty() && envelope.status != "success" {
        debug!(metric = %descriptor.name, status = %envelope.status, "Query returned non-success status");
    }

    let fields = label_fields(descriptor);
    if fields.len() != descriptor.labels.len() {
        warn!(
            metric = %descriptor.name,
            selected = fields.len(),
            declared = descriptor.labels.len(),
            "Selected label fields do not match declared labels, skip"
        );
        return Ok(Vec::new());
    }

    let mut samples = Vec::with_capacity(envelope.data.result.len());
    for row in envelope.data.result {
        let raw = match row.value.get(1) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                warn!(metric = %descriptor.name, "Result row without value, skip");
                continue;
            }
        };
        let value: f64 = match raw.parse() {
            Ok(v) => v,
            Err(e) => {
                warn!(metric = %descriptor.name, value = %raw, error = %e, "Error parsing value");
                continue;
            }
        };
        let labels = fields
            .iter()
            .map(|f| row.metric.get(*f).cloned().unwrap_or_default())
            .collect();
        samples.push(MetricSample::new(descriptor, kind, labels, value));
    }
    Ok(samples)
}

/// Token minting for descriptors behind the cluster monitoring stack.
pub struct MonitoringAuth {
    pub access: ClusterAccess,
    pub account: ServiceAccountRef,
    /// Descriptors with this prefix are queried with a minted token.
    pub prefix: String,
}

/// Samples and failures of one application-path scrape.
#[derive(Debug, Default)]
pub struct JsonCycle {
    pub samples: Vec<MetricSample>,
    pub failures: Vec<(String, PmError)>,
}

pub struct JsonCollector {
    http: reqwest::Client,
    auth: Option<MonitoringAuth>,
}

impl JsonCollector {
    pub fn new(timeout: Duration, auth: Option<MonitoringAuth>) -> Result<Self, PmError> {
        // Query endpoints sit behind the cluster's internal CA; certificate
        // validation is off for this client only.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(|e| PmError::Config(format!("failed to build query HTTP client: {e}")))?;
        Ok(Self { http, auth })
    }

    async fn bearer_token(&self) -> String {
        let Some(auth) = &self.auth else {
            return String::new();
        };
        match auth.access.mint_token(&auth.account).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Service account token could not be minted, querying without it");
                String::new()
            }
        }
    }

    fn needs_token(&self, descriptor: &MetricDescriptor) -> bool {
        self.auth
            .as_ref()
            .is_some_and(|a| a.prefix == descriptor.prefix)
    }

    async fn scrape(&self, descriptor: &MetricDescriptor, token: &str) -> Result<Vec<MetricSample>, PmError> {
        let url = descriptor
            .url
            .as_deref()
            .ok_or_else(|| PmError::Config(format!("metric '{}' has no url", descriptor.name)))?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PmError::remote(&descriptor.name, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PmError::remote(&descriptor.name, format!("HTTP {status}")));
        }
        let body = response
            .text()
            .await
            .map_err(|e| PmError::remote(&descriptor.name, e))?;

        parse_query_response(&body, descriptor)
    }

    /// Queries every descriptor of one application path. A token is minted
    /// at most once per call.
    #[instrument(skip(self, descriptors), fields(metrics = descriptors.len()))]
    pub async fn collect(&self, descriptors: &[MetricDescriptor]) -> JsonCycle {
        let mut cycle = JsonCycle::default();
        let mut token: Option<String> = None;

        for descriptor in descriptors {
            let bearer = if self.needs_token(descriptor) {
                if token.is_none() {
                    token = Some(self.bearer_token().await);
                }
                token.as_deref().unwrap_or_default()
            } else {
                ""
            };

            match self.scrape(descriptor, bearer).await {
                Ok(mut samples) => {
                    info!(
                        metric = %descriptor.description,
                        kind = %descriptor.kind,
                        prefix = %descriptor.prefix,
                        samples = samples.len(),
                        "Metric saved"
                    );
                    cycle.samples.append(&mut samples);
                }
                Err(e) => {
                    warn!(metric = %descriptor.name, error = %e, "Scrape error");
                    cycle.failures.push((descriptor.name.clone(), e));
                }
            }
        }
        cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(description: &str, labels: &[&str]) -> MetricDescriptor {
        MetricDescriptor {
            name: "usage".into(),
            prefix: "p5g_mec".into(),
            kind: "gauge".into(),
            description: description.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            value_column: 0,
            url: Some("https://prometheus.local/api/v1/query?query=x".into()),
        }
    }

    const BODY: &str = r#"{
      "status": "success",
      "data": {
        "resultType": "vector",
        "result": [
          {"metric": {"container": "amf", "namespace": "core", "node": "w1", "pod": "amf-0"}, "value": [1695400000.1, "0.25"]},
          {"metric": {"container": "smf", "namespace": "core", "node": "w2", "pod": "smf-0"}, "value": [1695400000.1, "NaNx"]},
          {"metric": {"container": "upf", "namespace": "core", "pod": "upf-0"}, "value": [1695400000.1, "3"]}
        ]
      }
    }"#;

    #[test]
    fn test_pod_labels_and_value_skip() {
        let d = descriptor("mec pod restarts", POD_LABELS);
        let samples = parse_query_response(BODY, &d).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].labels, vec!["amf", "core", "w1", "amf-0"]);
        assert_eq!(samples[0].value, 0.25);
        assert_eq!(samples[1].labels[2], "");
        assert_eq!(samples[1].name, "p5g_mec_usage");
    }

    #[test]
    fn test_label_selection_by_description() {
        assert_eq!(label_fields(&descriptor("mec cpu usage", &[])).len(), 9);
        assert_eq!(label_fields(&descriptor("mec memory usage", &[])).len(), 7);
        assert_eq!(label_fields(&descriptor("node uptime", &["instance"])), vec!["instance"]);
    }

    #[test]
    fn test_label_count_mismatch_yields_nothing() {
        let d = descriptor("mec cpu usage", POD_LABELS);
        assert!(parse_query_response(BODY, &d).unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_envelope_is_parse_error() {
        let d = descriptor("mec pod", POD_LABELS);
        let err = parse_query_response("<html>", &d).unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn test_descriptor_without_url_is_reported() {
        let collector = JsonCollector::new(Duration::from_secs(1), None).unwrap();
        let mut d = descriptor("mec pod", POD_LABELS);
        d.url = None;
        let cycle = collector.collect(&[d]).await;
        assert!(cycle.samples.is_empty());
        assert_eq!(cycle.failures[0].1.kind(), "config");
    }
}
