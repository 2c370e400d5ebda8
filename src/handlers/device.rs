//! Per-application metric paths.
//!
//! Each path from the application metric file is served from its own
//! registry so its series never mix with `/metrics` or with other paths.

use axum::extract::State;
use oss_pm_exporter::collectors::exposition::{encode_text, register_samples};
use prometheus::Registry;
use tracing::{debug, error, instrument, warn};

use super::metrics::MetricsError;
use crate::state::SharedState;

/// Handler for one application path. Unknown paths yield an empty body.
#[instrument(skip(state))]
pub async fn device_handler(State(state): State<SharedState>, app: String) -> Result<String, MetricsError> {
    debug!("Processing /{} request", app);

    let Some(descriptors) = state.descriptors.apps.get(&app) else {
        warn!(path = %app, "No metric definitions for path");
        return Ok(String::new());
    };

    let cycle = state.apps.collect(descriptors).await;
    for (metric, e) in &cycle.failures {
        debug!(path = %app, metric = %metric, kind = e.kind(), "Application metric failed");
    }
    if !cycle.failures.is_empty() {
        state
            .metrics
            .app_scrape_failures_total
            .with_label_values(&[app.as_str()])
            .inc_by(cycle.failures.len() as f64);
    }
    state.stats.record_app_scrape(cycle.failures.len());

    let registry = Registry::new();
    let exposition = register_samples(&registry, &cycle.samples);
    debug!(path = %app, emitted = exposition.emitted, skipped = exposition.skipped, "Application samples registered");

    encode_text(&[&registry]).map_err(|e| {
        error!("Failed to encode metrics for /{}: {}", app, e);
        MetricsError::EncodingFailed
    })
}
