use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{PipelineConfig, ServerlessConfig};
use crate::error::PipelineError;
use crate::infra::glue_catalog::GlueCrawlerTrigger;
use crate::infra::http_client::SecArchiveClient;
use crate::infra::s3_store::S3ObjectStore;
use crate::period::Period;
use crate::pipeline::publish::GoldPublisher;
use crate::pipeline::stages::{run_period, PeriodOutcome, RunContext, Stage, StageFailure};

/// Status code plus message returned by a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self { status_code, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

impl From<&PipelineError> for InvocationResponse {
    fn from(err: &PipelineError) -> Self {
        match err {
            PipelineError::Config(_) => InvocationResponse::new(400, format!("Error: {}", err)),
            PipelineError::NotYetPublished(p) => InvocationResponse::new(
                404,
                format!("Failed to download data. The data for {} might not be available yet.", p),
            ),
            other => InvocationResponse::new(500, other.to_string()),
        }
    }
}

/// Runs extract, transform and load for `period` and maps the result to a
/// response.
pub async fn handle(ctx: &RunContext<'_>, period: Period) -> InvocationResponse {
    info!("--- Starting ETL Process for {} ---", period);
    match run_period(period, ctx).await {
        Ok(PeriodOutcome::Published { location, rows }) => {
            info!("--- ETL Process Complete ({} rows at {}) ---", rows, location);
            InvocationResponse::new(200, format!("Successfully processed and loaded data for {}.", period))
        }
        Ok(PeriodOutcome::AlreadyPublished { location }) => {
            InvocationResponse::new(200, format!("Data for {} is already published at {}.", period, location))
        }
        Ok(PeriodOutcome::Empty) => {
            warn!("No USD facts for {} after filtering; nothing published", period);
            InvocationResponse::new(200, format!("No data to publish for {} after filtering.", period))
        }
        Ok(PeriodOutcome::NotYetAvailable) => InvocationResponse::from(&PipelineError::NotYetPublished(period)),
        Err(StageFailure { stage, error }) => {
            error!("An error occurred during {}: {}", stage, error);
            let body = match stage {
                Stage::Extract => format!("Extraction failed: {}", error),
                Stage::Transform => format!("Transformation failed: {}", error),
                Stage::Load => format!("Loading failed: {}", error),
            };
            InvocationResponse::new(500, body)
        }
    }
}

/// Single-invocation entry point: configuration from the environment, period
/// from the wall clock. Missing configuration is reported before any network
/// or storage access.
pub async fn invoke_from_env() -> InvocationResponse {
    let serverless = match ServerlessConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return InvocationResponse::from(&e);
        }
    };
    let mut config = PipelineConfig::default();
    config.apply_env(|key| std::env::var(key).ok());
    config.storage.bucket = Some(serverless.bucket.clone());

    match build_and_handle(&config, &serverless, Period::current()).await {
        Ok(resp) => resp,
        Err(e) => {
            error!("Failed to initialize pipeline clients: {}", e);
            InvocationResponse::from(&e)
        }
    }
}

async fn build_and_handle(
    config: &PipelineConfig,
    serverless: &ServerlessConfig,
    period: Period,
) -> crate::error::Result<InvocationResponse> {
    let fetcher = SecArchiveClient::new(
        &config.source.base_url,
        &config.source.user_agent,
        Duration::from_secs(config.source.timeout_secs),
    )?;
    let store = Arc::new(S3ObjectStore::new(&config.storage).await?);
    let publisher = GoldPublisher::new(store, &config.storage.gold_prefix);
    let catalog = GlueCrawlerTrigger::new(&serverless.crawler_name, config.storage.region.as_deref()).await?;
    let ctx = RunContext {
        fetcher: &fetcher,
        publisher: &publisher,
        catalog: &catalog,
        strategy: config.transform.strategy()?,
        scratch_root: None,
    };
    Ok(handle(&ctx, period).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        let period = Period::new(2024, 2).unwrap();
        assert_eq!(InvocationResponse::from(&PipelineError::Config("missing".into())).status_code, 400);
        assert_eq!(InvocationResponse::from(&PipelineError::NotYetPublished(period)).status_code, 404);
        assert_eq!(InvocationResponse::from(&PipelineError::storage("denied")).status_code, 500);
    }

    #[test]
    fn serializes_lambda_style() {
        let json = serde_json::to_string(&InvocationResponse::new(200, "ok")).unwrap();
        assert_eq!(json, r#"{"statusCode":200,"body":"ok"}"#);
    }
}
