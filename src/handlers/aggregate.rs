//! `/api/metrics`: per-location RAN/Core aggregation report.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use oss_pm_exporter::aggregator::report::build_report;
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use crate::state::SharedState;

/// Body returned when a section cannot be built.
#[derive(Debug, Serialize)]
pub struct Unavailable {
    pub data: String,
    pub error: String,
}

fn unavailable(data: String, error: String) -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, Json(Unavailable { data, error })).into_response()
}

/// Handler for the /api/metrics endpoint.
///
/// Reads the staged dumps under the cycle lock so a running cycle never
/// hands out half-copied files.
#[instrument(skip(state))]
pub async fn aggregate_handler(State(state): State<SharedState>) -> Response {
    debug!("Processing /api/metrics request");

    let _guard = state.cycle_lock.lock().await;

    let config = state.config.clone();
    let result = tokio::task::spawn_blocking(move || {
        build_report(
            &config.api_path(),
            &config.file.core_name,
            &config.report.sources,
            &config.report.schema,
        )
    })
    .await;

    match result {
        Ok(Ok(report)) => {
            state.stats.record_report(true);
            Json(report).into_response()
        }
        Ok(Err(e)) => {
            warn!(section = e.section, kind = e.source.kind(), error = %e.source, "Aggregation report unavailable");
            state.stats.record_report(false);
            state
                .metrics
                .report_unavailable_total
                .with_label_values(&[e.section])
                .inc();
            unavailable(format!("{} is not found", e.section), e.source.to_string())
        }
        Err(e) => {
            error!("Aggregation task failed: {}", e);
            state.stats.record_report(false);
            unavailable("report is not available".to_string(), e.to_string())
        }
    }
}
