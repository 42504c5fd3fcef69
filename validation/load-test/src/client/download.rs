use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;

use super::{expect_ok, WorkloadClient};
use crate::error::{LoadTestError, Result};
use crate::ring::DiscoveryRing;

/// Path prefix of thumbnail downloads returned by search.
pub const THUMBNAIL_PREFIX: &str = "/download/thumbnail_";

/// Map a thumbnail path to its full-size counterpart.
///
/// `/download/thumbnail_x.jpg` becomes `/download/x.jpg`; anything else
/// returns `None`.
pub fn full_size_path(path: &str) -> Option<String> {
    path.strip_prefix(THUMBNAIL_PREFIX)
        .map(|rest| format!("/download/{}", rest))
}

/// Downloads identifiers discovered by the search workload.
pub struct DownloadClient {
    http: reqwest::Client,
    base_url: String,
    ring: Arc<DiscoveryRing>,
    full_size_probability: f64,
}

impl DownloadClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        ring: Arc<DiscoveryRing>,
        full_size_probability: f64,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            ring,
            full_size_probability: full_size_probability.clamp(0.0, 1.0),
        }
    }

    fn url_for(&self, id: &str) -> String {
        if id.starts_with("http://") || id.starts_with("https://") {
            id.to_string()
        } else if id.starts_with('/') {
            format!("{}{}", self.base_url, id)
        } else {
            format!("{}/{}", self.base_url, id)
        }
    }
}

#[async_trait]
impl WorkloadClient for DownloadClient {
    async fn execute(&self) -> Result<()> {
        let id = self.ring.take().ok_or(LoadTestError::NoDownloadTargets)?;
        // Put it back so later cycles can reuse it; dropped if full.
        self.ring.offer(id.clone());

        let full_size = rand::thread_rng().gen_bool(self.full_size_probability);
        let path = if full_size {
            full_size_path(&id).unwrap_or(id)
        } else {
            id
        };

        let response = self.http.get(self.url_for(&path)).send().await?;
        let status = response.status();
        let body = response.bytes().await;
        expect_ok(status)?;

        if body?.is_empty() {
            return Err(LoadTestError::EmptyBody);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_size_path() {
        assert_eq!(
            full_size_path("/download/thumbnail_abc.jpg").as_deref(),
            Some("/download/abc.jpg")
        );
        assert_eq!(full_size_path("/download/abc.jpg"), None);
    }

    #[tokio::test]
    async fn test_empty_ring_fails_without_network() {
        // Port 9 (discard) would fail with a transport error if a request were made.
        let client = DownloadClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            Arc::new(DiscoveryRing::new(4)),
            0.0,
        );
        let err = client.execute().await.unwrap_err();
        assert!(matches!(err, LoadTestError::NoDownloadTargets));
    }
}
