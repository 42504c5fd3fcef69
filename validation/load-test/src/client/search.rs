use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::trace;

use super::{expect_ok, WorkloadClient};
use crate::error::Result;
use crate::ring::DiscoveryRing;

/// Runs keyword searches and feeds the results to the download workload.
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    categories: Vec<String>,
    ring: Arc<DiscoveryRing>,
}

impl SearchClient {
    /// `categories` should include `""` to exercise unfiltered searches.
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        categories: Vec<String>,
        ring: Arc<DiscoveryRing>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            categories,
            ring,
        }
    }
}

#[async_trait]
impl WorkloadClient for SearchClient {
    async fn execute(&self) -> Result<()> {
        let keyword = self
            .categories
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default();

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .form(&[("keyword", keyword.as_str())])
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await;
        expect_ok(status)?;
        let body = body?;

        let results: Vec<String> = serde_json::from_slice(&body)?;
        let found = results.len();
        let mut offered = 0;
        for id in results {
            if !self.ring.offer(id) {
                break;
            }
            offered += 1;
        }
        trace!(keyword = %keyword, found, offered, "Search complete");
        Ok(())
    }
}
