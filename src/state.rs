//! Application state shared by the HTTP handlers.
//!
//! Everything here is built once before the server starts. Scrapes only
//! read it, apart from the cycle lock and the scrape statistics.

use oss_pm_exporter::collectors::csv::CsvCollector;
use oss_pm_exporter::collectors::json::{JsonCollector, MonitoringAuth};
use oss_pm_exporter::descriptors::DescriptorSet;
use oss_pm_exporter::lifecycle::FileLifecycle;
use oss_pm_exporter::oss::{OssClient, OssCredentials, DEFAULT_REQUEST_TIMEOUT};
use oss_pm_exporter::pipeline::{PipelineSettings, RetrievalPipeline, DEFAULT_PACING};
use oss_pm_exporter::remote::{ClusterAccess, ClusterCredentials};
use oss_pm_exporter::window::SystemClock;
use oss_pm_exporter::PmError;
use prometheus::Registry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::metrics::{register_process_collector, ExporterMetrics};
use crate::scrape_stats::ScrapeStats;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// PM collector wired to the live OSS and cluster.
pub type PmCollector = CsvCollector<OssClient, ClusterAccess>;

pub struct AppState {
    /// Long-lived registry holding only exporter self-metrics.
    pub registry: Registry,
    pub metrics: ExporterMetrics,
    pub config: Arc<Config>,
    pub descriptors: Arc<DescriptorSet>,
    /// `None` when no OSS endpoint is configured.
    pub pm: Option<PmCollector>,
    pub apps: JsonCollector,
    /// Serializes PM cycles; concurrent scrapes wait for the running one.
    pub cycle_lock: Mutex<()>,
    pub stats: Arc<ScrapeStats>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config, descriptors: DescriptorSet) -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();
        let metrics = ExporterMetrics::new(&registry, config.metric_prefix())?;
        register_process_collector(&registry)?;
        debug!("Prometheus registry initialized");

        let pm = build_pm_collector(&config, &descriptors)?;
        let apps = build_app_collector(&config)?;

        Ok(Self {
            registry,
            metrics,
            config: Arc::new(config),
            descriptors: Arc::new(descriptors),
            pm,
            apps,
            cycle_lock: Mutex::new(()),
            stats: Arc::new(ScrapeStats::new()),
            start_time: Instant::now(),
        })
    }
}

pub fn lifecycle_for(config: &Config) -> FileLifecycle {
    FileLifecycle::new(config.csv_path(), config.api_path())
}

pub fn pipeline_settings(config: &Config) -> PipelineSettings {
    PipelineSettings {
        families: config.file.family_name.clone(),
        ran_names: config.file.ran_name.clone(),
        core_names: config.file.core_name.clone(),
        pacing: config
            .oss
            .pacing_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PACING),
        family_deadline: config.oss.family_deadline_seconds.map(Duration::from_secs),
    }
}

/// Builds the PM collector, or `None` when `oss.url` is unset.
pub fn build_pm_collector(
    config: &Config,
    descriptors: &DescriptorSet,
) -> Result<Option<PmCollector>, PmError> {
    let Some(url) = config.oss.url.as_deref() else {
        info!("No OSS url configured, PM collection disabled");
        return Ok(None);
    };

    let timeout = config
        .oss
        .timeout_seconds
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
    let credentials = OssCredentials {
        username: config.oss.username.clone().unwrap_or_default(),
        password: config.oss.password.clone().unwrap_or_default(),
    };
    let requestor = OssClient::new(url, credentials, timeout)?;
    let access = ClusterAccess::new(
        ClusterCredentials::from_path(config.cluster.kubeconfig.as_deref()),
        config.cluster.container.clone(),
    );

    let pipeline = RetrievalPipeline::new(
        requestor,
        access,
        lifecycle_for(config),
        pipeline_settings(config),
    );
    Ok(Some(CsvCollector::new(
        pipeline,
        Arc::new(descriptors.pm.clone()),
        Arc::new(SystemClock),
    )))
}

/// Builds the metrics-query collector. Token minting is set up when a
/// monitoring kubeconfig is configured.
pub fn build_app_collector(config: &Config) -> Result<JsonCollector, PmError> {
    let timeout = config
        .monitoring
        .timeout_seconds
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

    let auth = config.monitoring.kubeconfig.as_ref().map(|path| MonitoringAuth {
        access: ClusterAccess::new(
            ClusterCredentials::KubeconfigPath(path.clone()),
            config.cluster.container.clone(),
        ),
        account: config.monitoring.service_account.clone(),
        prefix: config
            .monitoring
            .token_prefix
            .clone()
            .unwrap_or_else(|| crate::config::DEFAULT_TOKEN_PREFIX.to_string()),
    });
    JsonCollector::new(timeout, auth)
}
