//! PM collection window computation.
//!
//! OSS counters are published on a lag, so every cycle asks for the window
//! `[now - 16min, now + 1min)` truncated to whole minutes. The window also
//! names the archive folders (`YYYY-MM-DD/HHMM-HHMM`).

use chrono::{Duration, Local, NaiveDateTime, Timelike};

/// Minutes subtracted from `now` for the window start.
pub const LOOKBACK_MINUTES: i64 = 16;
/// Minutes added to `now` for the window end.
pub const LEAD_MINUTES: i64 = 1;

/// Timestamp format expected by the OSS query parameters.
pub const PARAM_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Minute-aligned PM collection window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Computes the window for the given wall-clock instant.
    pub fn compute(now: NaiveDateTime) -> Self {
        Self {
            start: truncate_to_minute(now - Duration::minutes(LOOKBACK_MINUTES)),
            end: truncate_to_minute(now + Duration::minutes(LEAD_MINUTES)),
        }
    }

    pub fn from_clock(clock: &dyn Clock) -> Self {
        Self::compute(clock.now())
    }

    /// First-level archive folder, `YYYY-MM-DD` of the window start.
    pub fn date_folder(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// Second-level archive folder, `HHMM-HHMM`.
    pub fn time_folder(&self) -> String {
        format!("{}-{}", self.start.format("%H%M"), self.end.format("%H%M"))
    }

    pub fn start_param(&self) -> String {
        self.start.format(PARAM_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(PARAM_FORMAT).to_string()
    }
}

fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}
