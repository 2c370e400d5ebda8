//! File lifecycle of PM dumps on the exporter's local disk.
//!
//! ```text
//! <csv_path>/<family>.csv                          fresh dump, read by the scrape
//! <csv_path>/<YYYY-MM-DD>/<HHMM-HHMM>/<family>.csv archived after the scrape
//! <api_path>/<family>.csv                          flat copy read by /api/metrics
//! ```
//!
//! Family names are sanitized (space → `_`) before they become file names.
//! Batch operations report each file separately and never stop early.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::PmError;
use crate::window::TimeWindow;

/// File-name form of a family name.
pub fn sanitize_family_name(family: &str) -> String {
    family.replace(' ', "_")
}

/// One file that could not be moved or copied.
#[derive(Debug)]
pub struct FileFailure {
    pub name: String,
    pub error: PmError,
}

/// Outcome of a batch move/copy.
#[derive(Debug, Default)]
pub struct TransferSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<FileFailure>,
}

impl TransferSummary {
    fn record(&mut self, name: &str, result: Result<(), PmError>) {
        match result {
            Ok(()) => self.succeeded.push(name.to_string()),
            Err(error) => {
                warn!(file = name, error = %error, "File transfer failed");
                self.failed.push(FileFailure {
                    name: name.to_string(),
                    error,
                });
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FileLifecycle {
    csv_path: PathBuf,
    api_path: PathBuf,
}

impl FileLifecycle {
    pub fn new(csv_path: impl Into<PathBuf>, api_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            api_path: api_path.into(),
        }
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn api_path(&self) -> &Path {
        &self.api_path
    }

    /// `<csv_path>/<sanitized family>.csv`
    pub fn family_file(&self, family: &str) -> PathBuf {
        self.csv_path
            .join(format!("{}.csv", sanitize_family_name(family)))
    }

    pub fn window_dir(&self, window: &TimeWindow) -> PathBuf {
        self.csv_path
            .join(window.date_folder())
            .join(window.time_folder())
    }

    /// Renames a freshly extracted dump to its family file. When the rename
    /// fails the extracted file is removed so it cannot be picked up later
    /// under its remote name.
    pub fn materialize_family(&self, extracted: &Path, family: &str) -> Result<PathBuf, PmError> {
        let target = self.family_file(family);
        match fs::rename(extracted, &target) {
            Ok(()) => {
                debug!(from = %extracted.display(), to = %target.display(), "Family dump materialized");
                Ok(target)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(extracted) {
                    debug!(error = %cleanup, "Extracted file already gone");
                }
                Err(PmError::Io(e))
            }
        }
    }

    /// Creates `<csv_path>/<date>/<HHMM-HHMM>` if missing.
    pub fn ensure_window_dirs(&self, window: &TimeWindow) -> Result<PathBuf, PmError> {
        let dir = self.window_dir(window);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Moves each family file into the window's archive directory.
    pub fn archive_families(&self, window: &TimeWindow, families: &[String]) -> TransferSummary {
        let dir = self.window_dir(window);
        let mut summary = TransferSummary::default();

        for family in families {
            let name = sanitize_family_name(family);
            let from = self.family_file(family);
            let to = dir.join(format!("{name}.csv"));
            let result = if from.exists() {
                fs::rename(&from, &to).map_err(PmError::from)
            } else {
                Err(PmError::NotFound(from))
            };
            summary.record(&name, result);
        }

        if !summary.succeeded.is_empty() {
            info!(
                archived = summary.succeeded.len(),
                dir = %dir.display(),
                "Archived family dumps"
            );
        }
        summary
    }

    /// Copies each named dump into the flat API directory, overwriting the
    /// previous copy. The directory is recreated when absent.
    pub fn stage_for_api(&self, names: &[String]) -> TransferSummary {
        let mut summary = TransferSummary::default();

        if let Err(e) = fs::create_dir_all(&self.api_path) {
            for name in names {
                summary.record(
                    name,
                    Err(PmError::Io(std::io::Error::new(e.kind(), e.to_string()))),
                );
            }
            return summary;
        }

        for name in names {
            let from = self.family_file(name);
            let to = self
                .api_path
                .join(format!("{}.csv", sanitize_family_name(name)));
            let result = if from.exists() {
                fs::copy(&from, &to).map(|_| ()).map_err(PmError::from)
            } else {
                Err(PmError::NotFound(from))
            };
            summary.record(name, result);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> TimeWindow {
        TimeWindow::compute(
            NaiveDate::from_ymd_opt(2023, 9, 23)
                .unwrap()
                .and_hms_opt(1, 31, 0)
                .unwrap(),
        )
    }

    fn lifecycle(root: &Path) -> FileLifecycle {
        FileLifecycle::new(root.join("csv"), root.join("api"))
    }

    #[test]
    fn test_sanitize_family_name() {
        assert_eq!(sanitize_family_name("DU Power Consumption"), "DU_Power_Consumption");
        assert_eq!(sanitize_family_name("UECON_AMF"), "UECON_AMF");
    }

    #[test]
    fn test_materialize_family() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path());
        fs::create_dir_all(lc.csv_path()).unwrap();
        let extracted = lc.csv_path().join("performanceData_20231020_144317.csv");
        fs::write(&extracted, "x").unwrap();

        let out = lc.materialize_family(&extracted, "DU Power Consumption").unwrap();

        assert_eq!(out, lc.csv_path().join("DU_Power_Consumption.csv"));
        assert!(out.exists());
        assert!(!extracted.exists());
    }

    #[test]
    fn test_materialize_failure_removes_extracted_file() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path());
        fs::create_dir_all(lc.csv_path()).unwrap();
        // A non-empty directory at the target makes the rename fail.
        let target = lc.family_file("AMFMS");
        fs::create_dir_all(target.join("occupied")).unwrap();
        let extracted = lc.csv_path().join("performanceData_1.csv");
        fs::write(&extracted, "x").unwrap();

        assert!(lc.materialize_family(&extracted, "AMFMS").is_err());
        assert!(!extracted.exists());
    }

    #[test]
    fn test_archive_families_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path());
        fs::create_dir_all(lc.csv_path()).unwrap();
        fs::write(lc.family_file("AMFMS"), "a").unwrap();
        fs::write(lc.family_file("DU Power Consumption"), "b").unwrap();
        let w = window();
        lc.ensure_window_dirs(&w).unwrap();

        let families = vec![
            "Missing Family".to_string(),
            "AMFMS".to_string(),
            "DU Power Consumption".to_string(),
        ];
        let summary = lc.archive_families(&w, &families);

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].name, "Missing_Family");
        assert_eq!(summary.succeeded.len(), 2);
        let archived = lc.csv_path().join("2023-09-23").join("0115-0132");
        assert!(archived.join("AMFMS.csv").exists());
        assert!(archived.join("DU_Power_Consumption.csv").exists());
        assert!(!lc.family_file("AMFMS").exists());
    }

    #[test]
    fn test_stage_for_api_recreates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path());
        fs::create_dir_all(lc.csv_path()).unwrap();
        fs::write(lc.family_file("UECON_AMF"), "u").unwrap();

        let summary = lc.stage_for_api(&["UECON_AMF".to_string(), "AMFTPS".to_string()]);

        assert_eq!(summary.succeeded, vec!["UECON_AMF".to_string()]);
        assert_eq!(summary.failed[0].error.kind(), "not_found");
        assert_eq!(fs::read_to_string(lc.api_path().join("UECON_AMF.csv")).unwrap(), "u");
        assert!(lc.family_file("UECON_AMF").exists());
    }
}
