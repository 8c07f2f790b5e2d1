use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;

use crate::app::ports::ObjectStore;
use crate::config::StorageConfig;
use crate::error::{PipelineError, Result};

/// S3-backed object store. `PutObject` only exposes an object once the
/// upload has completed, which gives the publisher its commit semantics.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let bucket = config
            .bucket
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| PipelineError::Config("S3 bucket must be set".to_string()))?
            .to_string();
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;
        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.force_path_style {
            s3_builder = s3_builder.force_path_style(true);
        }
        let client = Client::from_conf(s3_builder.build());
        Ok(Self { client, bucket })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(PipelineError::storage(format!(
                        "head {} failed: {}",
                        self.describe(key),
                        DisplayErrorContext(&err)
                    )))
                }
            }
        }
    }

    async fn put_file(&self, local: &Path, key: &str) -> Result<()> {
        let body = ByteStream::from_path(local).await.map_err(|err| {
            PipelineError::storage(format!("failed to read {}: {}", local.display(), err))
        })?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/vnd.apache.parquet")
            .body(body)
            .send()
            .await
            .map_err(|err| {
                PipelineError::storage(format!(
                    "upload to {} failed: {}",
                    self.describe(key),
                    DisplayErrorContext(&err)
                ))
            })?;
        Ok(())
    }

    fn describe(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
