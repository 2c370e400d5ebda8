//! Turns samples into Prometheus metric families.
//!
//! Samples are produced fresh on every scrape, so each scrape registers them
//! into a new [`Registry`] instead of mutating long-lived vectors. Series
//! that disappear from the dumps therefore disappear from the output.

use ahash::AHashMap;
use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::aggregator::MetricSample;
use crate::descriptors::MetricKind;

/// Buffer capacity for text encoding.
const BUFFER_CAP: usize = 256 * 1024;

enum Family {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

/// Counts from one registration pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpositionStats {
    pub emitted: usize,
    pub skipped: usize,
}

fn build_family(sample: &MetricSample) -> Result<Family, prometheus::Error> {
    let opts = Opts::new(sample.name.clone(), sample.help.clone());
    let label_names: Vec<&str> = sample.label_names.iter().map(String::as_str).collect();
    Ok(match sample.kind {
        MetricKind::Gauge => Family::Gauge(GaugeVec::new(opts, &label_names)?),
        MetricKind::Counter => Family::Counter(CounterVec::new(opts, &label_names)?),
    })
}

fn register_family(registry: &Registry, family: &Family) -> Result<(), prometheus::Error> {
    match family {
        Family::Gauge(v) => registry.register(Box::new(v.clone())),
        Family::Counter(v) => registry.register(Box::new(v.clone())),
    }
}

/// Registers `samples` into `registry`.
///
/// Samples whose family cannot be created or registered, whose label count
/// does not match, or counters with a negative value are skipped with a
/// warning; the rest are still emitted.
pub fn register_samples(registry: &Registry, samples: &[MetricSample]) -> ExpositionStats {
    let mut families: AHashMap<&str, Option<Family>> = AHashMap::new();
    let mut stats = ExpositionStats::default();

    for sample in samples {
        let entry = families.entry(sample.name.as_str()).or_insert_with(|| {
            match build_family(sample).and_then(|f| register_family(registry, &f).map(|_| f)) {
                Ok(f) => Some(f),
                Err(e) => {
                    warn!(metric = %sample.name, error = %e, "Cannot register metric family");
                    None
                }
            }
        });
        let Some(family) = entry else {
            stats.skipped += 1;
            continue;
        };

        if sample.labels.len() != sample.label_names.len() {
            warn!(
                metric = %sample.name,
                expected = sample.label_names.len(),
                found = sample.labels.len(),
                "Label count mismatch, sample skipped"
            );
            stats.skipped += 1;
            continue;
        }
        let values: Vec<&str> = sample.labels.iter().map(String::as_str).collect();

        let applied = match family {
            Family::Gauge(v) => v.get_metric_with_label_values(&values).map(|g| g.set(sample.value)),
            Family::Counter(v) => {
                if sample.value < 0.0 {
                    warn!(metric = %sample.name, value = sample.value, "Negative counter value skipped");
                    stats.skipped += 1;
                    continue;
                }
                v.get_metric_with_label_values(&values)
                    .map(|c| c.inc_by(sample.value))
            }
        };
        match applied {
            Ok(()) => stats.emitted += 1,
            Err(e) => {
                warn!(metric = %sample.name, error = %e, "Sample rejected");
                stats.skipped += 1;
            }
        }
    }

    stats
}

/// Encodes the families of all `registries` in text exposition format.
pub fn encode_text(registries: &[&Registry]) -> Result<String, prometheus::Error> {
    let families: Vec<_> = registries.iter().flat_map(|r| r.gather()).collect();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
