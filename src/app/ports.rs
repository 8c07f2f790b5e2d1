use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::period::Period;

/// Downloads the quarterly archive for a period.
///
/// Implementations must map an upstream "not found" to
/// [`PipelineError::NotYetPublished`](crate::error::PipelineError::NotYetPublished).
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(&self, period: Period) -> Result<Vec<u8>>;
}

/// Durable key/value object storage for published artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Stores the file at `local` under `key`. A reader never observes a
    /// partially written object at `key`.
    async fn put_file(&self, local: &Path, key: &str) -> Result<()>;

    /// Human-readable location of `key`, for logs and responses.
    fn describe(&self, key: &str) -> String;
}

/// Asks an external catalog to re-scan the published namespace.
#[async_trait]
pub trait CatalogTrigger: Send + Sync {
    async fn trigger(&self) -> Result<()>;
}
