//! Report command implementation.
//!
//! Builds the aggregation report from the staged dumps and prints it.

use anyhow::{Context, Result};
use oss_pm_exporter::aggregator::report::build_report;

use crate::config::Config;

/// Builds the aggregation report from the API directory and prints it.
pub fn command_report(compact: bool, config: &Config) -> Result<()> {
    let api_path = config.api_path();
    let report = build_report(
        &api_path,
        &config.file.core_name,
        &config.report.sources,
        &config.report.schema,
    )
    .with_context(|| format!("building report from {}", api_path.display()))?;

    let out = if compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{out}");
    Ok(())
}
