//! OSS performance-data requestor.
//!
//! One GET per counter family. The OSS answers with the path of the dump it
//! wrote inside its own container; the retrieval pipeline copies that file
//! out afterwards.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::PmError;
use crate::window::TimeWindow;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Asks the OSS to produce a dump for one family and window.
pub trait PmRequestor: Send + Sync {
    /// Returns the remote path of the produced dump.
    fn request_family(
        &self,
        family: &str,
        window: &TimeWindow,
    ) -> impl Future<Output = Result<String, PmError>> + Send;
}

#[derive(Debug, Clone)]
pub struct OssCredentials {
    pub username: String,
    pub password: String,
}

/// HTTP client for the OSS performance-data endpoint.
#[derive(Debug, Clone)]
pub struct OssClient {
    http: reqwest::Client,
    base_url: String,
    credentials: OssCredentials,
}

impl OssClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: OssCredentials,
        timeout: Duration,
    ) -> Result<Self, PmError> {
        // Trust boundary: the OSS endpoint is an internal system serving a
        // self-signed certificate. Certificate validation is off for this
        // client only; no other outbound client shares it.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(|e| PmError::Config(format!("failed to build OSS HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Full request URL for a family and window.
///
/// The `Family name` key keeps its space and spaces are sent as `%20`, which
/// is what the OSS parser expects.
pub fn query_url(base_url: &str, family: &str, window: &TimeWindow) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("Family name", family)
        .append_pair("startTime", &window.start_param())
        .append_pair("endTime", &window.end_param())
        .finish()
        .replace('+', "%20");

    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}{query}")
}

impl PmRequestor for OssClient {
    #[instrument(skip(self, window), fields(start = %window.start_param()))]
    async fn request_family(&self, family: &str, window: &TimeWindow) -> Result<String, PmError> {
        let url = query_url(&self.base_url, family, window);
        debug!(%url, "Requesting PM dump");

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|e| PmError::remote(family, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PmError::remote(family, format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PmError::remote(family, e))?;
        let remote_path = body.trim();
        if remote_path.is_empty() {
            return Err(PmError::remote(family, "empty response body"));
        }

        info!(family, remote_path, "OSS produced PM dump");
        Ok(remote_path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> TimeWindow {
        let now = NaiveDate::from_ymd_opt(2023, 9, 23)
            .unwrap()
            .and_hms_opt(1, 31, 12)
            .unwrap();
        TimeWindow::compute(now)
    }

    #[test]
    fn test_query_url_encodes_spaces_as_percent20() {
        let url = query_url("https://oss.local:7443/oss/performanceData", "DU Power Consumption", &window());
        assert!(url.starts_with("https://oss.local:7443/oss/performanceData?Family%20name=DU%20Power%20Consumption&"));
        assert!(url.contains("startTime=2023-09-23%2001%3A15%3A00"));
        assert!(url.contains("endTime=2023-09-23%2001%3A32%3A00"));
        assert!(!url.contains('+'));
    }

    #[test]
    fn test_query_url_appends_to_existing_query() {
        let url = query_url("https://oss.local/pm?site=a", "AMFMS", &window());
        assert!(url.starts_with("https://oss.local/pm?site=a&Family%20name=AMFMS"));
    }

    #[test]
    fn test_client_builds() {
        let client = OssClient::new(
            "https://oss.local",
            OssCredentials {
                username: "u".into(),
                password: "p".into(),
            },
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        assert_eq!(client.base_url(), "https://oss.local");
    }
}
