//! Error taxonomy for the retrieval and aggregation pipeline.
//!
//! Every failure is classified so callers can decide at the nearest
//! aggregation boundary whether to skip a file, a family, a location or a
//! whole section. Nothing here is fatal to a scrape on its own.

use std::path::PathBuf;

/// Errors produced by the PM pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PmError {
    /// Input file is absent. Callers skip the metric/family and continue.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Input file exists but could not be read as a delimited table.
    #[error("failed to read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    /// OSS request or container exec failure for one family.
    #[error("remote request failed for '{family}': {reason}")]
    RemoteRequest { family: String, reason: String },

    /// Malformed or missing numeric cell.
    #[error("parse error in {context}: {reason}")]
    Parse { context: String, reason: String },

    /// Cross-file correlation could not be completed for a location/domain.
    #[error("correlation failed for '{scope}': {reason}")]
    Correlation { scope: String, reason: String },

    /// Invalid configuration or descriptor file.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PmError {
    /// Short, stable name of the error class, used as log field and metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            PmError::NotFound(_) => "not_found",
            PmError::Read { .. } => "read",
            PmError::RemoteRequest { .. } => "remote_request",
            PmError::Parse { .. } => "parse",
            PmError::Correlation { .. } => "correlation",
            PmError::Config(_) => "config",
            PmError::Io(_) => "io",
        }
    }

    pub fn remote(family: impl Into<String>, reason: impl ToString) -> Self {
        PmError::RemoteRequest {
            family: family.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(context: impl Into<String>, reason: impl ToString) -> Self {
        PmError::Parse {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(PmError::NotFound(PathBuf::from("/x.csv")).kind(), "not_found");
        assert_eq!(PmError::remote("UECON_AMF", "timeout").kind(), "remote_request");
        assert_eq!(PmError::parse("row 4", "invalid float").kind(), "parse");
    }

    #[test]
    fn test_display_includes_context() {
        let err = PmError::remote("DU Power Consumption", "HTTP 500");
        let msg = err.to_string();
        assert!(msg.contains("DU Power Consumption"));
        assert!(msg.contains("HTTP 500"));
    }
}
