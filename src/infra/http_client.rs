use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::{Duration, Instant};

use crate::app::ports::ArchiveFetcher;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::period::Period;

pub const DEFAULT_BASE_URL: &str =
    "https://www.sec.gov/files/dera/data/financial-statement-data-sets";

/// Fetches quarterly archives from the SEC data set listing.
///
/// The SEC fair-access policy requires every request to declare who is
/// calling, so a contact string is sent as the `User-Agent`.
pub struct SecArchiveClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl SecArchiveClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        if user_agent.trim().is_empty() {
            return Err(PipelineError::Config(
                "user_agent must identify the caller (name and contact email)".to_string(),
            ));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        })
    }

    pub fn archive_url(&self, period: Period) -> String {
        format!("{}/{}", self.base_url, period.archive_name())
    }
}

#[async_trait]
impl ArchiveFetcher for SecArchiveClient {
    async fn fetch(&self, period: Period) -> Result<Vec<u8>> {
        let url = self.archive_url(period);
        tracing::info!("HTTP GET request to: {}", url);
        let started = Instant::now();
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
            .send()
            .await
            .inspect_err(|_| metrics::fetch::request_error())?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            metrics::fetch::not_published();
            return Err(PipelineError::NotYetPublished(period));
        }
        if !status.is_success() {
            metrics::fetch::request_error();
            return Err(PipelineError::Upstream { status: status.as_u16(), url });
        }
        let bytes = resp.bytes().await?.to_vec();
        metrics::fetch::request_success();
        metrics::fetch::request_duration(started.elapsed().as_secs_f64());
        metrics::fetch::archive_bytes(bytes.len());
        tracing::info!("HTTP response: status={}, size={} bytes", status.as_u16(), bytes.len());
        Ok(bytes)
    }
}
