use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use reqwest::multipart::{Form, Part};

use super::{expect_ok, WorkloadClient};
use crate::catalog::Catalog;
use crate::error::Result;

/// Pool of synthetic user names `user1..=userN`.
#[derive(Debug, Clone, Copy)]
pub struct Users {
    count: u32,
}

impl Users {
    pub fn new(count: u32) -> Self {
        Self {
            count: count.max(1),
        }
    }

    pub fn pick(&self, rng: &mut impl Rng) -> String {
        format!("user{}", rng.gen_range(1..=self.count))
    }
}

/// Uploads a random fixture as a multipart form.
pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
    catalog: Arc<Catalog>,
    users: Users,
}

impl UploadClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        catalog: Arc<Catalog>,
        users: Users,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            catalog,
            users,
        }
    }
}

#[async_trait]
impl WorkloadClient for UploadClient {
    async fn execute(&self) -> Result<()> {
        // Pick before the first await; ThreadRng is not Send.
        let (fixture, username) = {
            let mut rng = rand::thread_rng();
            let fixtures = self.catalog.fixtures();
            let fixture = fixtures[rng.gen_range(0..fixtures.len())].clone();
            (fixture, self.users.pick(&mut rng))
        };

        let hashtags = serde_json::to_string(&[fixture.category.as_str()])?;
        let file_name = fixture
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = tokio::fs::read(&fixture.path).await?;

        let form = Form::new()
            .text("username", username)
            .text("hashtags", hashtags)
            .part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .http
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;

        expect_ok(response.status())
    }
}
