//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every `/metrics` request runs one PM cycle under the cycle lock and
//! returns the self-metrics together with the freshly registered PM samples.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use oss_pm_exporter::collectors::exposition::{encode_text, register_samples};
use prometheus::Registry;
use std::time::Instant;
use tracing::{debug, error, instrument, warn};

use crate::state::SharedState;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Runs one PM cycle and registers its samples into `scrape_registry`.
/// Self-metrics and scrape statistics are updated from the cycle outcome.
pub async fn run_pm_cycle(state: &SharedState, scrape_registry: &Registry) {
    let Some(pm) = &state.pm else {
        debug!("PM collection disabled, serving self-metrics only");
        return;
    };

    let wait = Instant::now();
    let _guard = state.cycle_lock.lock().await;
    debug!(waited_ms = wait.elapsed().as_millis() as u64, "Cycle lock acquired");

    let start = Instant::now();
    let cycle = pm.collect().await;
    let exposition = register_samples(scrape_registry, &cycle.samples);
    let elapsed = start.elapsed().as_secs_f64();

    for (family, e) in &cycle.fetch.failed {
        state
            .metrics
            .family_failures_total
            .with_label_values(&[family.as_str(), e.kind()])
            .inc();
    }
    for failure in cycle
        .finalize
        .staged
        .failed
        .iter()
        .chain(cycle.finalize.archived.failed.iter())
    {
        warn!(file = %failure.name, error = %failure.error, "File transfer failed");
    }

    let succeeded = cycle.succeeded();
    state.metrics.cycles_total.inc();
    state.metrics.scrape_duration_seconds.set(elapsed);
    state.metrics.families_fetched.set(cycle.fetch.fetched.len() as f64);
    state.metrics.samples_emitted.set(exposition.emitted as f64);
    state
        .metrics
        .last_cycle_success
        .set(if succeeded { 1.0 } else { 0.0 });

    state.stats.record_cycle(
        cycle.window.time_folder(),
        elapsed,
        cycle.fetch.fetched.len(),
        cycle.fetch.failed.len(),
        cycle.metric_failures.len(),
        exposition.emitted,
    );
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    debug!("Processing /metrics request");

    let scrape_registry = Registry::new();
    run_pm_cycle(&state, &scrape_registry).await;

    encode_text(&[&state.registry, &scrape_registry]).map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        MetricsError::EncodingFailed
    })
}
