use async_trait::async_trait;

use super::{expect_ok, WorkloadClient};
use crate::error::{LoadTestError, Result};

/// Substring the landing page must contain.
pub const LIVENESS_MARKER: &str = "UiFrontend";

/// Fetches the landing page. Also used as the pre-run liveness probe.
pub struct BrowseClient {
    http: reqwest::Client,
    base_url: String,
}

impl BrowseClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl WorkloadClient for BrowseClient {
    async fn execute(&self) -> Result<()> {
        let response = self.http.get(format!("{}/", self.base_url)).send().await?;
        let status = response.status();
        let body = response.bytes().await;
        expect_ok(status)?;
        let body = body?;

        let page = String::from_utf8_lossy(&body);
        if !page.contains(LIVENESS_MARKER) {
            return Err(LoadTestError::ContentMismatch {
                marker: LIVENESS_MARKER.to_string(),
            });
        }
        Ok(())
    }
}
