//! Metric extraction and cross-file aggregation.
//!
//! - [`generic`]: descriptor-driven column → sample mapping for `/metrics`
//! - [`schema`]: named column layout of PM dumps with bounds-checked access
//! - [`correlation`]: per-location RAN/Core statistics
//! - [`report`]: the on-demand aggregation document

pub mod correlation;
pub mod generic;
pub mod report;
pub mod schema;

use serde::Serialize;

use crate::descriptors::{MetricDescriptor, MetricKind};

/// One labeled, typed value produced for a single scrape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
    /// Label values in the order of `label_names`.
    pub labels: Vec<String>,
    pub value: f64,
}

impl MetricSample {
    pub fn new(
        descriptor: &MetricDescriptor,
        kind: MetricKind,
        labels: Vec<String>,
        value: f64,
    ) -> Self {
        Self {
            name: descriptor.fq_name(),
            help: help_text(descriptor),
            kind,
            label_names: descriptor.labels.clone(),
            labels,
            value,
        }
    }
}

// Prometheus rejects an empty help string.
fn help_text(descriptor: &MetricDescriptor) -> String {
    if descriptor.description.trim().is_empty() {
        descriptor.fq_name()
    } else {
        descriptor.description.clone()
    }
}
