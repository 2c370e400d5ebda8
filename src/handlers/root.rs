//! Root endpoint handler for the landing page.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::SharedState;

const STYLE: &str = r#"
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; line-height: 1.6; }
        .container { max-width: 900px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); }
        h1 { color: #333; border-bottom: 3px solid #007bff; padding-bottom: 15px; }
        .info { background: #e9ecef; padding: 15px; border-radius: 4px; }
        .endpoint-list { list-style: none; padding: 0; }
        .endpoint-list li { margin: 12px 0; padding: 12px; background: #f8f9fa; border-left: 4px solid #007bff; border-radius: 4px; }
        .endpoint-list a { color: #007bff; text-decoration: none; font-weight: 600; }
        .endpoint-desc { color: #666; margin-top: 4px; }
"#;

fn endpoint(out: &mut String, path: &str, description: &str) {
    writeln!(
        out,
        r#"        <li><a href="{path}">{path}</a><div class="endpoint-desc">{description}</div></li>"#
    )
    .ok();
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let uptime = format!(
        "{}h {}m {}s",
        uptime_secs / 3600,
        (uptime_secs % 3600) / 60,
        uptime_secs % 60
    );

    let mut endpoints = String::new();
    endpoint(&mut endpoints, "/metrics", "PM counter samples and exporter self-metrics (one collection cycle per scrape)");
    endpoint(&mut endpoints, "/api/metrics", "Per-location RAN/Core aggregation report (JSON)");
    if state.config.enable_health.unwrap_or(true) {
        endpoint(&mut endpoints, "/health", "Collection cycle statistics (text)");
    }
    endpoint(&mut endpoints, "/config", "Effective configuration, password redacted");
    for (path, descriptors) in &state.descriptors.apps {
        endpoint(
            &mut endpoints,
            &format!("/{path}"),
            &format!("Application metrics ({} definitions)", descriptors.len()),
        );
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>OSS PM Exporter</title>
    <style>{STYLE}</style>
</head>
<body>
<div class="container">
    <h1>OSS PM Exporter</h1>
    <div class="info">Version {version} &middot; Uptime {uptime} &middot; {pm} PM metrics</div>
    <h2>Available Endpoints</h2>
    <ul class="endpoint-list">
{endpoints}    </ul>
</div>
</body>
</html>"#,
        version = env!("CARGO_PKG_VERSION"),
        pm = state.descriptors.pm.len(),
    );

    Html(html)
}
