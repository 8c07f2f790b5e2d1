use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::app::ports::ObjectStore;
use crate::error::{PipelineError, Result};

/// Directory-backed object store. Keys map to relative paths under `root`.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return Err(PipelineError::storage(format!("invalid object key '{}'", key)));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn put_file(&self, local: &Path, key: &str) -> Result<()> {
        let dest = self.path_for(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut staging = dest.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        tokio::fs::copy(local, &staging).await?;
        tokio::fs::rename(&staging, &dest).await?;
        Ok(())
    }

    fn describe(&self, key: &str) -> String {
        self.root.join(key).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("bucket"));
        let src = dir.path().join("artifact.parquet");
        std::fs::write(&src, b"PAR1").unwrap();

        assert!(!store.exists("gold/a.parquet").await.unwrap());
        store.put_file(&src, "gold/a.parquet").await.unwrap();
        assert!(store.exists("gold/a.parquet").await.unwrap());
        assert!(!dir.path().join("bucket/gold/a.parquet.tmp").exists());
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.exists("../outside").await.is_err());
        assert!(store.exists("gold//x").await.is_err());
    }
}
