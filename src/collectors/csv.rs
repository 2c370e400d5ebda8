//! PM counter collector: one retrieval cycle per scrape.
//!
//! Stage order within a cycle:
//! 1. fetch every family for the current window
//! 2. read each PM descriptor's family file into samples
//! 3. stage RAN/Core dumps for the aggregation API
//! 4. move the family files into the window archive

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::aggregator::generic::extract_generic;
use crate::aggregator::MetricSample;
use crate::descriptors::MetricDescriptor;
use crate::error::PmError;
use crate::oss::PmRequestor;
use crate::pipeline::{FetchReport, FinalizeReport, RetrievalPipeline};
use crate::remote::ArchiveSource;
use crate::tabular::Dataset;
use crate::window::{Clock, TimeWindow};

/// Everything one cycle produced.
#[derive(Debug)]
pub struct CsvCycle {
    pub window: TimeWindow,
    pub samples: Vec<MetricSample>,
    pub fetch: FetchReport,
    /// Metric name → reason, for descriptors whose dump could not be read.
    pub metric_failures: Vec<(String, PmError)>,
    pub finalize: FinalizeReport,
}

impl CsvCycle {
    /// True when every family was fetched and every metric was read.
    pub fn succeeded(&self) -> bool {
        self.fetch.all_succeeded() && self.metric_failures.is_empty()
    }
}

pub struct CsvCollector<R, A> {
    pipeline: RetrievalPipeline<R, A>,
    descriptors: Arc<Vec<MetricDescriptor>>,
    clock: Arc<dyn Clock>,
}

impl<R: PmRequestor, A: ArchiveSource> CsvCollector<R, A> {
    pub fn new(
        pipeline: RetrievalPipeline<R, A>,
        descriptors: Arc<Vec<MetricDescriptor>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pipeline,
            descriptors,
            clock,
        }
    }

    pub fn pipeline(&self) -> &RetrievalPipeline<R, A> {
        &self.pipeline
    }

    /// Reads each descriptor's family file. Missing and malformed dumps are
    /// recorded and skipped.
    pub fn read_samples(&self) -> (Vec<MetricSample>, Vec<(String, PmError)>) {
        let mut samples = Vec::new();
        let mut failures = Vec::new();

        for descriptor in self.descriptors.iter() {
            let path = self.pipeline.lifecycle().family_file(&descriptor.description);
            let result = Dataset::load(&path).and_then(|ds| {
                if !ds.has_data() {
                    warn!(metric = %descriptor.name, "No data rows in dump");
                }
                extract_generic(&ds, descriptor)
            });
            match result {
                Ok(mut s) => {
                    debug!(metric = %descriptor.name, samples = s.len(), "Metric extracted");
                    samples.append(&mut s);
                }
                Err(e) => {
                    warn!(metric = %descriptor.name, error = %e, kind = e.kind(), "Metric skipped");
                    failures.push((descriptor.name.clone(), e));
                }
            }
        }

        (samples, failures)
    }

    /// Runs one full cycle for the current window.
    #[instrument(skip(self))]
    pub async fn collect(&self) -> CsvCycle {
        let window = TimeWindow::from_clock(self.clock.as_ref());
        info!(
            start = %window.start_param(),
            end = %window.end_param(),
            "Starting PM collection cycle"
        );

        let fetch = self.pipeline.fetch_all(&window).await;
        let (samples, metric_failures) = self.read_samples();
        let finalize = self.pipeline.finalize(&window);

        info!(
            samples = samples.len(),
            failed_families = fetch.failed.len(),
            failed_metrics = metric_failures.len(),
            "PM collection cycle finished"
        );
        CsvCycle {
            window,
            samples,
            fetch,
            metric_failures,
            finalize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::FileLifecycle;
    use crate::pipeline::fakes::{FakeContainer, FakeOss};
    use crate::pipeline::PipelineSettings;
    use crate::window::FixedClock;
    use chrono::NaiveDate;
    use std::fs;
    use std::time::Duration;

    fn du_power_dump() -> String {
        let mut s = String::from("DU Power Consumption\n2023-09-23 01:15:00,2023-09-23 01:32:00\n");
        s.push_str("NE ID,NE Type,NE Name,Init Time,Duration,Status,Location,Power(W)\n");
        for i in 0..5 {
            s.push_str(&format!("{i},DU,du-{i},2023-09-23 01:15:00,900,OK,LOC{i},{}.5\n", 100 + i));
        }
        s
    }

    fn descriptor() -> MetricDescriptor {
        MetricDescriptor {
            name: "du_power_consumption".into(),
            prefix: "p5g_exporter".into(),
            kind: "gauge".into(),
            description: "DU_Power_Consumption".into(),
            labels: ["ne_id", "ne_type", "ne_name", "init_time", "duration", "status", "location"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            value_column: 7,
            url: None,
        }
    }

    #[tokio::test]
    async fn test_cycle_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let lifecycle = FileLifecycle::new(dir.path().join("csv"), dir.path().join("api"));
        fs::create_dir_all(lifecycle.csv_path()).unwrap();

        let mut container = FakeContainer::default();
        container.files.insert(
            "/home/vsm/pm/DU-Power-Consumption.remote.csv".into(),
            du_power_dump(),
        );
        let settings = PipelineSettings {
            families: vec!["DU Power Consumption".into()],
            ran_names: vec!["DU_Power_Consumption".into()],
            pacing: Duration::ZERO,
            ..PipelineSettings::default()
        };
        let pipeline = RetrievalPipeline::new(FakeOss::default(), container, lifecycle, settings);
        let now = NaiveDate::from_ymd_opt(2023, 9, 23)
            .unwrap()
            .and_hms_opt(1, 31, 0)
            .unwrap();
        let collector = CsvCollector::new(
            pipeline,
            Arc::new(vec![descriptor()]),
            Arc::new(FixedClock(now)),
        );

        let cycle = collector.collect().await;

        assert!(cycle.succeeded());
        assert_eq!(cycle.samples.len(), 5);
        assert_eq!(cycle.samples[4].value, 104.5);
        assert_eq!(cycle.samples[0].labels[6], "LOC0");

        let lc = collector.pipeline().lifecycle();
        let archived = lc.window_dir(&cycle.window).join("DU_Power_Consumption.csv");
        assert!(archived.exists());
        assert!(lc.api_path().join("DU_Power_Consumption.csv").exists());
        assert!(!lc.family_file("DU Power Consumption").exists());
    }

    #[tokio::test]
    async fn test_missing_dump_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let lifecycle = FileLifecycle::new(dir.path().join("csv"), dir.path().join("api"));
        fs::create_dir_all(lifecycle.csv_path()).unwrap();
        let settings = PipelineSettings {
            pacing: Duration::ZERO,
            ..PipelineSettings::default()
        };
        let pipeline = RetrievalPipeline::new(FakeOss::default(), FakeContainer::default(), lifecycle, settings);
        let collector = CsvCollector::new(
            pipeline,
            Arc::new(vec![descriptor()]),
            Arc::new(crate::window::SystemClock),
        );

        let cycle = collector.collect().await;

        assert!(cycle.samples.is_empty());
        assert_eq!(cycle.metric_failures.len(), 1);
        assert_eq!(cycle.metric_failures[0].1.kind(), "not_found");
        assert!(!cycle.succeeded());
    }
}
