//! Collect command implementation.
//!
//! Runs one PM cycle outside the server and prints the samples.

use anyhow::{bail, Context, Result};
use oss_pm_exporter::aggregator::generic::extract_generic;
use oss_pm_exporter::aggregator::MetricSample;
use oss_pm_exporter::collectors::exposition::{encode_text, register_samples};
use oss_pm_exporter::descriptors::{DescriptorSet, MetricDescriptor};
use oss_pm_exporter::lifecycle::FileLifecycle;
use oss_pm_exporter::tabular::Dataset;
use prometheus::Registry;

use crate::cli::SampleFormat;
use crate::config::Config;
use crate::state::{build_pm_collector, lifecycle_for};

/// Reads the dumps already present in the CSV directory.
fn read_offline(lifecycle: &FileLifecycle, descriptors: &[MetricDescriptor]) -> Vec<MetricSample> {
    let mut samples = Vec::new();
    for descriptor in descriptors {
        let path = lifecycle.family_file(&descriptor.description);
        match Dataset::load(&path).and_then(|ds| extract_generic(&ds, descriptor)) {
            Ok(mut s) => samples.append(&mut s),
            Err(e) => eprintln!("⚠️  {}: {}", descriptor.name, e),
        }
    }
    samples
}

fn render(samples: &[MetricSample], format: SampleFormat) -> Result<String> {
    match format {
        SampleFormat::Json => serde_json::to_string_pretty(samples).context("failed to encode samples"),
        SampleFormat::Prometheus => {
            let registry = Registry::new();
            let stats = register_samples(&registry, samples);
            if stats.skipped > 0 {
                eprintln!("⚠️  {} samples skipped", stats.skipped);
            }
            encode_text(&[&registry]).context("failed to encode samples")
        }
    }
}

/// Runs one collection cycle and prints the samples.
pub async fn command_collect(offline: bool, format: SampleFormat, config: &Config) -> Result<()> {
    let descriptors = DescriptorSet::load(
        &config.metric_config_path(),
        &config.app_config_path(),
        config.metric_prefix(),
    )
    .with_context(|| format!("loading {}", config.metric_config_path().display()))?;
    if descriptors.pm.is_empty() {
        bail!(
            "no PM metrics defined in {}",
            config.metric_config_path().display()
        );
    }

    let samples = if offline {
        read_offline(&lifecycle_for(config), &descriptors.pm)
    } else {
        let collector = build_pm_collector(config, &descriptors)
            .context("building PM collector")?
            .context("oss.url is not configured; use --offline to read existing dumps")?;
        let cycle = collector.collect().await;
        for (family, e) in &cycle.fetch.failed {
            eprintln!("⚠️  family {}: {}", family, e);
        }
        for (metric, e) in &cycle.metric_failures {
            eprintln!("⚠️  {}: {}", metric, e);
        }
        cycle.samples
    };

    print!("{}", render(&samples, format)?);
    Ok(())
}
