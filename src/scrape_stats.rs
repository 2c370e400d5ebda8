//! Scrape statistics for the /health endpoint.
//!
//! Tracks cycle durations, per-cycle family and sample counts, and the
//! outcome of the last PM cycle and the last aggregation report.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::Instant;

use chrono::{DateTime, Local};

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            *self = RunningStat {
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
            };
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

/// `(current, average, max, min, count)`
pub type StatSnapshot = (f64, f64, f64, f64, u64);

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    pub fn snapshot(&self) -> StatSnapshot {
        match self.inner.lock() {
            Ok(s) => (s.last, s.avg(), s.max, s.min, s.count),
            Err(_) => (0.0, 0.0, 0.0, 0.0, 0),
        }
    }
}

/// Outcome of the most recent PM cycle.
#[derive(Debug, Clone)]
pub struct LastCycle {
    pub finished_at: DateTime<Local>,
    pub window: String,
    pub succeeded: bool,
}

pub struct ScrapeStats {
    pub cycle_duration_seconds: Stat,
    pub families_fetched: Stat,
    pub samples_emitted: Stat,
    pub cycles_total: AtomicU64,
    pub cycles_failed: AtomicU64,
    pub family_failures: AtomicU64,
    pub metric_failures: AtomicU64,
    pub app_scrapes: AtomicU64,
    pub app_scrape_failures: AtomicU64,
    pub reports_served: AtomicU64,
    pub reports_unavailable: AtomicU64,
    pub last_cycle: StdRwLock<Option<LastCycle>>,
    pub start_time: Instant,
}

impl Default for ScrapeStats {
    fn default() -> Self {
        Self {
            cycle_duration_seconds: Stat::default(),
            families_fetched: Stat::default(),
            samples_emitted: Stat::default(),
            cycles_total: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            family_failures: AtomicU64::new(0),
            metric_failures: AtomicU64::new(0),
            app_scrapes: AtomicU64::new(0),
            app_scrape_failures: AtomicU64::new(0),
            reports_served: AtomicU64::new(0),
            reports_unavailable: AtomicU64::new(0),
            last_cycle: StdRwLock::new(None),
            start_time: Instant::now(),
        }
    }
}

impl ScrapeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished PM cycle.
    pub fn record_cycle(
        &self,
        window: String,
        duration_secs: f64,
        fetched: usize,
        family_failures: usize,
        metric_failures: usize,
        samples: usize,
    ) {
        let succeeded = family_failures == 0 && metric_failures == 0;
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.family_failures
            .fetch_add(family_failures as u64, Ordering::Relaxed);
        self.metric_failures
            .fetch_add(metric_failures as u64, Ordering::Relaxed);
        self.cycle_duration_seconds.add_sample(duration_secs);
        self.families_fetched.add_sample(fetched as f64);
        self.samples_emitted.add_sample(samples as f64);

        if let Ok(mut guard) = self.last_cycle.write() {
            *guard = Some(LastCycle {
                finished_at: Local::now(),
                window,
                succeeded,
            });
        }
    }

    pub fn record_app_scrape(&self, failures: usize) {
        self.app_scrapes.fetch_add(1, Ordering::Relaxed);
        self.app_scrape_failures
            .fetch_add(failures as u64, Ordering::Relaxed);
    }

    pub fn record_report(&self, served: bool) {
        if served {
            self.reports_served.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reports_unavailable.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn last_cycle(&self) -> Option<LastCycle> {
        self.last_cycle.read().ok().and_then(|g| g.clone())
    }

    /// True until a cycle has run, then mirrors the last cycle's outcome.
    pub fn is_healthy(&self) -> bool {
        self.last_cycle().map_or(true, |c| c.succeeded)
    }

    pub fn cycle_success_rate(&self) -> f64 {
        let total = self.cycles_total.load(Ordering::Relaxed);
        let failed = self.cycles_failed.load(Ordering::Relaxed);
        if total == 0 {
            100.0
        } else {
            ((total - failed) as f64 / total as f64) * 100.0
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let left_col = 26usize;
        let col_w = 12usize;
        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - EXPORTER INTERNAL STATS").ok();
        writeln!(out, "==========================================").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "PM CYCLES").ok();
        writeln!(out, "---------").ok();

        let rows: [(&str, StatSnapshot, usize); 3] = [
            ("cycle_duration (s)", self.cycle_duration_seconds.snapshot(), 3),
            ("families_fetched", self.families_fetched.snapshot(), 0),
            ("samples_emitted", self.samples_emitted.snapshot(), 0),
        ];
        for (name, (cur, avg, max, min, _), precision) in rows {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                name,
                format!("{:.*}", precision, cur),
                format!("{:.*}", precision.max(1), avg),
                format!("{:.*}", precision, max),
                format!("{:.*}", precision, min),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "COUNTERS").ok();
        writeln!(out, "--------").ok();
        let counters = [
            ("cycles_total", self.cycles_total.load(Ordering::Relaxed)),
            ("cycles_failed", self.cycles_failed.load(Ordering::Relaxed)),
            ("family_failures", self.family_failures.load(Ordering::Relaxed)),
            ("metric_failures", self.metric_failures.load(Ordering::Relaxed)),
            ("app_scrapes", self.app_scrapes.load(Ordering::Relaxed)),
            ("app_scrape_failures", self.app_scrape_failures.load(Ordering::Relaxed)),
            ("reports_served", self.reports_served.load(Ordering::Relaxed)),
            ("reports_unavailable", self.reports_unavailable.load(Ordering::Relaxed)),
        ];
        for (name, value) in counters {
            writeln!(out, "{:left$} | {:>col$}", name, value, left = left_col, col = col_w).ok();
        }
        writeln!(
            out,
            "{:left$} | {:>col$}",
            "cycle_success_rate (%)",
            format!("{:.1}", self.cycle_success_rate()),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        match self.last_cycle() {
            Some(last) => {
                writeln!(
                    out,
                    "Last cycle: {} (window {}) - {}",
                    last.finished_at.format("%Y-%m-%d %H:%M:%S"),
                    last.window,
                    if last.succeeded { "success" } else { "failed" }
                )
                .ok();
            }
            None => {
                writeln!(out, "Last cycle: N/A").ok();
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stat() {
        let mut s = RunningStat::default();
        s.add(2.0);
        s.add(4.0);
        s.add(3.0);
        assert_eq!(s.avg(), 3.0);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 4.0);
        assert_eq!(s.last, 3.0);
    }

    #[test]
    fn test_health_follows_last_cycle() {
        let stats = ScrapeStats::new();
        assert!(stats.is_healthy());
        assert_eq!(stats.cycle_success_rate(), 100.0);

        stats.record_cycle("0115".into(), 1.5, 2, 1, 0, 10);
        assert!(!stats.is_healthy());

        stats.record_cycle("0130".into(), 1.0, 3, 0, 0, 12);
        assert!(stats.is_healthy());
        assert_eq!(stats.cycle_success_rate(), 50.0);
        assert_eq!(stats.family_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_render_table() {
        let stats = ScrapeStats::new();
        assert!(stats.render_table().contains("Last cycle: N/A"));

        stats.record_cycle("0130".into(), 0.25, 3, 0, 0, 12);
        stats.record_report(false);
        let table = stats.render_table();
        assert!(table.contains("PM CYCLES"));
        assert!(table.contains("window 0130"));
        assert!(table.contains("reports_unavailable"));
    }
}
