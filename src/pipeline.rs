//! Retrieval cycle: OSS request → container copy → local family file.
//!
//! Families are processed one after another. A failing family is recorded
//! and the cycle moves on; a successful one is followed by a pacing delay so
//! the OSS is never asked for two dumps back to back.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::error::PmError;
use crate::lifecycle::{FileLifecycle, TransferSummary};
use crate::oss::PmRequestor;
use crate::remote::ArchiveSource;
use crate::window::TimeWindow;

/// Delay after each successful family request.
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Family names requested from the OSS, in request order.
    pub families: Vec<String>,
    /// Dumps staged for the aggregation API after each cycle.
    pub ran_names: Vec<String>,
    pub core_names: Vec<String>,
    pub pacing: Duration,
    /// Upper bound for request + copy of one family.
    pub family_deadline: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            families: Vec::new(),
            ran_names: Vec::new(),
            core_names: Vec::new(),
            pacing: DEFAULT_PACING,
            family_deadline: None,
        }
    }
}

/// Result of the fetch stage of one cycle.
#[derive(Debug)]
pub struct FetchReport {
    pub window: TimeWindow,
    /// Family → materialized local file.
    pub fetched: Vec<(String, PathBuf)>,
    pub failed: Vec<(String, PmError)>,
    pub elapsed: Duration,
}

impl FetchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of staging and archiving after the samples were read.
#[derive(Debug, Default)]
pub struct FinalizeReport {
    pub staged: TransferSummary,
    pub archived: TransferSummary,
}

pub struct RetrievalPipeline<R, A> {
    requestor: R,
    archive: A,
    lifecycle: FileLifecycle,
    settings: PipelineSettings,
}

impl<R: PmRequestor, A: ArchiveSource> RetrievalPipeline<R, A> {
    pub fn new(requestor: R, archive: A, lifecycle: FileLifecycle, settings: PipelineSettings) -> Self {
        Self {
            requestor,
            archive,
            lifecycle,
            settings,
        }
    }

    pub fn lifecycle(&self) -> &FileLifecycle {
        &self.lifecycle
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    async fn fetch_family(&self, family: &str, window: &TimeWindow) -> Result<PathBuf, PmError> {
        let remote_path = self.requestor.request_family(family, window).await?;
        let extracted = self
            .archive
            .copy_from_container(&remote_path, self.lifecycle.csv_path())
            .await?;
        self.lifecycle.materialize_family(&extracted, family)
    }

    async fn fetch_with_deadline(&self, family: &str, window: &TimeWindow) -> Result<PathBuf, PmError> {
        match self.settings.family_deadline {
            Some(limit) => tokio::time::timeout(limit, self.fetch_family(family, window))
                .await
                .unwrap_or_else(|_| {
                    Err(PmError::remote(family, format!("deadline of {limit:?} exceeded")))
                }),
            None => self.fetch_family(family, window).await,
        }
    }

    /// Fetches every configured family for `window`, then creates the
    /// window's archive directories.
    #[instrument(skip(self, window), fields(window = %window.time_folder()))]
    pub async fn fetch_all(&self, window: &TimeWindow) -> FetchReport {
        let started = Instant::now();
        let mut fetched = Vec::new();
        let mut failed = Vec::new();

        for family in &self.settings.families {
            match self.fetch_with_deadline(family, window).await {
                Ok(path) => {
                    debug!(family = %family, path = %path.display(), "Family fetched");
                    fetched.push((family.clone(), path));
                    if !self.settings.pacing.is_zero() {
                        tokio::time::sleep(self.settings.pacing).await;
                    }
                }
                Err(e) => {
                    warn!(family = %family, error = %e, kind = e.kind(), "Family fetch failed");
                    failed.push((family.clone(), e));
                }
            }
        }

        if let Err(e) = self.lifecycle.ensure_window_dirs(window) {
            warn!(error = %e, "Could not create archive directories");
        }

        let elapsed = started.elapsed();
        info!(
            fetched = fetched.len(),
            failed = failed.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Fetch stage finished"
        );
        FetchReport {
            window: *window,
            fetched,
            failed,
            elapsed,
        }
    }

    /// Stages the RAN and Core dumps for the aggregation API and archives
    /// every configured family into the window directory.
    pub fn finalize(&self, window: &TimeWindow) -> FinalizeReport {
        let mut names = self.settings.core_names.clone();
        names.extend(self.settings.ran_names.iter().cloned());

        FinalizeReport {
            staged: self.lifecycle.stage_for_api(&names),
            archived: self.lifecycle.archive_families(window, &self.settings.families),
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// Answers with a remote dump path unless the family is listed as failing.
    #[derive(Default)]
    pub struct FakeOss {
        pub failing: Vec<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl PmRequestor for FakeOss {
        async fn request_family(&self, family: &str, _window: &TimeWindow) -> Result<String, PmError> {
            self.calls.lock().unwrap().push(family.to_string());
            if self.failing.iter().any(|f| f == family) {
                return Err(PmError::remote(family, "HTTP 500"));
            }
            Ok(format!("/home/vsm/pm/{}.remote.csv", family.replace(' ', "-")))
        }
    }

    /// Writes canned content for a remote path into the destination.
    #[derive(Default)]
    pub struct FakeContainer {
        pub files: HashMap<String, String>,
    }

    impl ArchiveSource for FakeContainer {
        async fn copy_from_container(&self, remote_path: &str, dest_dir: &Path) -> Result<PathBuf, PmError> {
            let content = self
                .files
                .get(remote_path)
                .ok_or_else(|| PmError::remote(remote_path, "tar: No such file"))?;
            let base = remote_path.rsplit('/').next().unwrap_or(remote_path);
            let dest = dest_dir.join(base);
            std::fs::write(&dest, content)?;
            Ok(dest)
        }
    }
}
