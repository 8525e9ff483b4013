use crate::config::Settings;
use crate::store::SnapshotSource;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;

/// Snapshot store published on a static web host.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSnapshotSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.snapshot_timeout_secs))
            .build()
            .context("failed to build snapshot store http client")?;

        Ok(Self::new(http, settings.snapshot_base.trim()))
    }

    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn is_absent(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

#[async_trait::async_trait]
impl SnapshotSource for HttpSnapshotSource {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let url = self.url(path);
        let res = self
            .http
            .head(&url)
            .send()
            .await
            .with_context(|| format!("snapshot probe failed: {url}"))?;

        let mut status = res.status();
        // Some static hosts reject HEAD; fall back to a plain GET.
        if status == StatusCode::METHOD_NOT_ALLOWED {
            status = self
                .http
                .get(&url)
                .send()
                .await
                .with_context(|| format!("snapshot probe failed: {url}"))?
                .status();
        }

        if status.is_success() {
            return Ok(true);
        }
        if is_absent(status) {
            return Ok(false);
        }
        anyhow::bail!("snapshot probe HTTP {status}: {url}")
    }

    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let url = self.url(path);
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("snapshot request failed: {url}"))?;

        let status = res.status();
        if is_absent(status) {
            return Ok(None);
        }
        if !status.is_success() {
            anyhow::bail!("snapshot HTTP {status}: {url}");
        }

        let bytes = res
            .bytes()
            .await
            .with_context(|| format!("failed to read snapshot body: {url}"))?;
        Ok(Some(bytes.to_vec()))
    }
}
