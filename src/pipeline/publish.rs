use std::path::Path;
use std::sync::Arc;

use crate::app::ports::ObjectStore;
use crate::error::Result;
use crate::period::Period;

/// Places period artifacts under the gold namespace of an [`ObjectStore`].
#[derive(Clone)]
pub struct GoldPublisher {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl GoldPublisher {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self { store, prefix: prefix.trim_matches('/').to_string() }
    }

    /// Object key for a period, e.g. `gold/2023_Q1_processed.parquet`.
    pub fn key_for(&self, period: Period) -> String {
        if self.prefix.is_empty() {
            period.artifact_name()
        } else {
            format!("{}/{}", self.prefix, period.artifact_name())
        }
    }

    pub fn location(&self, period: Period) -> String {
        self.store.describe(&self.key_for(period))
    }

    pub async fn is_published(&self, period: Period) -> Result<bool> {
        self.store.exists(&self.key_for(period)).await
    }

    /// Uploads `local` as the artifact for `period` and returns its location.
    pub async fn publish(&self, local: &Path, period: Period) -> Result<String> {
        let key = self.key_for(period);
        self.store.put_file(local, &key).await?;
        Ok(self.store.describe(&key))
    }
}
