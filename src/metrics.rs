//! Prometheus self-metrics of the exporter.
//!
//! These live in the long-lived global registry. PM samples are never
//! registered here; they go into a fresh registry per scrape.

use prometheus::{Counter, CounterVec, Gauge, GaugeVec, Opts, Registry};

/// Self-metrics exposed next to the PM samples on `/metrics`.
#[derive(Clone)]
pub struct ExporterMetrics {
    pub build_info: GaugeVec,                  // labels: version, git_sha
    pub scrape_duration_seconds: Gauge,
    pub families_fetched: Gauge,
    pub family_failures_total: CounterVec,     // labels: family, kind
    pub samples_emitted: Gauge,
    pub last_cycle_success: Gauge,
    pub cycles_total: Counter,
    pub app_scrape_failures_total: CounterVec, // labels: path
    pub report_unavailable_total: CounterVec,  // labels: section
}

impl ExporterMetrics {
    pub fn new(registry: &Registry, prefix: &str) -> Result<Self, prometheus::Error> {
        let name = |suffix: &str| format!("{prefix}_{suffix}");

        let build_info = GaugeVec::new(
            Opts::new(name("build_info"), "Exporter build information"),
            &["version", "git_sha"],
        )?;
        let scrape_duration_seconds = Gauge::new(
            name("scrape_duration_seconds"),
            "Time spent running the last PM collection cycle",
        )?;
        let families_fetched = Gauge::new(
            name("families_fetched"),
            "Number of PM families retrieved in the last cycle",
        )?;
        let family_failures_total = CounterVec::new(
            Opts::new(
                name("family_failures_total"),
                "PM family retrievals that failed, by family and error kind",
            ),
            &["family", "kind"],
        )?;
        let samples_emitted = Gauge::new(
            name("samples_emitted"),
            "Number of PM samples exposed by the last cycle",
        )?;
        let last_cycle_success = Gauge::new(
            name("last_cycle_success"),
            "Whether the last PM cycle completed without failures (1) or not (0)",
        )?;
        let cycles_total = Counter::new(name("cycles_total"), "PM collection cycles run")?;
        let app_scrape_failures_total = CounterVec::new(
            Opts::new(
                name("app_scrape_failures_total"),
                "Application metric queries that failed, by path",
            ),
            &["path"],
        )?;
        let report_unavailable_total = CounterVec::new(
            Opts::new(
                name("report_unavailable_total"),
                "Aggregation report requests answered with 503, by missing section",
            ),
            &["section"],
        )?;

        registry.register(Box::new(build_info.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;
        registry.register(Box::new(families_fetched.clone()))?;
        registry.register(Box::new(family_failures_total.clone()))?;
        registry.register(Box::new(samples_emitted.clone()))?;
        registry.register(Box::new(last_cycle_success.clone()))?;
        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(app_scrape_failures_total.clone()))?;
        registry.register(Box::new(report_unavailable_total.clone()))?;

        build_info
            .with_label_values(&[env!("CARGO_PKG_VERSION"), option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")])
            .set(1.0);

        Ok(Self {
            build_info,
            scrape_duration_seconds,
            families_fetched,
            family_failures_total,
            samples_emitted,
            last_cycle_success,
            cycles_total,
            app_scrape_failures_total,
            report_unavailable_total,
        })
    }
}

/// Registers the process collector (cpu, memory, fds of the exporter).
#[cfg(target_os = "linux")]
pub fn register_process_collector(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(
        prometheus::process_collector::ProcessCollector::for_self(),
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn register_process_collector(_registry: &Registry) -> Result<(), prometheus::Error> {
    Ok(())
}
