use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_glue::error::DisplayErrorContext;
use aws_sdk_glue::Client;

use crate::app::ports::CatalogTrigger;
use crate::error::{PipelineError, Result};

/// Starts an AWS Glue crawler over the gold namespace. The crawl itself is
/// not awaited.
pub struct GlueCrawlerTrigger {
    client: Client,
    crawler_name: String,
}

impl GlueCrawlerTrigger {
    pub async fn new(crawler_name: &str, region: Option<&str>) -> Result<Self> {
        if crawler_name.trim().is_empty() {
            return Err(PipelineError::Config("crawler name must be set".to_string()));
        }
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let shared_config = loader.load().await;
        Ok(Self { client: Client::new(&shared_config), crawler_name: crawler_name.to_string() })
    }
}

#[async_trait]
impl CatalogTrigger for GlueCrawlerTrigger {
    async fn trigger(&self) -> Result<()> {
        tracing::info!("Starting Glue crawler: {}", self.crawler_name);
        match self.client.start_crawler().name(&self.crawler_name).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                // A crawl already in progress will pick up the new object.
                if err.as_service_error().map(|e| e.is_crawler_running_exception()).unwrap_or(false) {
                    tracing::info!("Crawler {} is already running", self.crawler_name);
                    return Ok(());
                }
                Err(PipelineError::catalog(format!(
                    "start_crawler({}) failed: {}",
                    self.crawler_name,
                    DisplayErrorContext(&err)
                )))
            }
        }
    }
}

/// Used when no crawler is configured.
pub struct NoopCatalog;

#[async_trait]
impl CatalogTrigger for NoopCatalog {
    async fn trigger(&self) -> Result<()> {
        tracing::debug!("No catalog crawler configured; skipping trigger");
        Ok(())
    }
}
