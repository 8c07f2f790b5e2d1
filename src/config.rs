//! Runtime configuration, read from TOML and overridden from the environment.
//!
//! Nothing in the core reads globals; drivers build a [`PipelineConfig`] and
//! pass the relevant parts into each operation.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::infra::http_client::DEFAULT_BASE_URL;
use crate::period::{Period, PeriodRange};
use crate::pipeline::transform::{Strategy, DEFAULT_BATCH_ROWS};

pub const DEFAULT_CONFIG_PATH: &str = "fsds.toml";
pub const DEFAULT_USER_AGENT: &str = "fsds-pipeline data-ops@example.com";
pub const DEFAULT_GOLD_PREFIX: &str = "gold";

pub const ENV_BUCKET: &str = "S3_BUCKET_NAME";
pub const ENV_CRAWLER: &str = "GLUE_CRAWLER_NAME";
pub const ENV_USER_AGENT: &str = "FSDS_USER_AGENT";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ENDPOINT: &str = "FSDS_S3_ENDPOINT";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub periods: PeriodsConfig,
    pub paths: PathsConfig,
    pub transform: TransformConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Contact string sent as `User-Agent`, e.g. "Jane Doe jane@example.com".
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PeriodsConfig {
    pub years: Vec<i32>,
    pub quarters: Vec<u8>,
    /// Last period known to be published, as `2024q1`. Defaults to the current quarter.
    pub until: Option<String>,
}

impl Default for PeriodsConfig {
    fn default() -> Self {
        Self { years: vec![2023, 2024], quarters: vec![1, 2, 3, 4], until: None }
    }
}

impl PeriodsConfig {
    pub fn range(&self) -> Result<PeriodRange> {
        let until = match &self.until {
            Some(s) => s.parse::<Period>()?,
            None => Period::current(),
        };
        PeriodRange::new(self.years.clone(), self.quarters.clone(), until)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root for extracted archives, one `{year}q{quarter}` directory per period.
    pub raw_dir: PathBuf,
    /// Root for locally written artifacts awaiting upload.
    pub processed_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { raw_dir: PathBuf::from("data"), processed_dir: PathBuf::from("processed_data") }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    InMemory,
    Chunked,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub strategy: StrategyKind,
    pub batch_rows: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self { strategy: StrategyKind::Chunked, batch_rows: DEFAULT_BATCH_ROWS }
    }
}

impl TransformConfig {
    pub fn strategy(&self) -> Result<Strategy> {
        match self.strategy {
            StrategyKind::InMemory => Ok(Strategy::InMemory),
            StrategyKind::Chunked if self.batch_rows == 0 => {
                Err(PipelineError::Config("batch_rows must be greater than zero".to_string()))
            }
            StrategyKind::Chunked => Ok(Strategy::Chunked { batch_rows: self.batch_rows }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub gold_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: None,
            endpoint: None,
            force_path_style: false,
            gold_prefix: DEFAULT_GOLD_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub crawler_name: Option<String>,
}

impl PipelineConfig {
    /// Loads `path`, or the defaults when `path` is `None` and
    /// `fsds.toml` is absent. An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        if !required && !config_path.exists() {
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Applies environment overrides using `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty(ENV_USER_AGENT) {
            self.source.user_agent = v;
        }
        if let Some(v) = non_empty(ENV_BUCKET) {
            self.storage.bucket = Some(v);
        }
        if let Some(v) = non_empty(ENV_REGION) {
            self.storage.region = Some(v);
        }
        if let Some(v) = non_empty(ENV_ENDPOINT) {
            self.storage.endpoint = Some(v);
            self.storage.force_path_style = true;
        }
        if let Some(v) = non_empty(ENV_CRAWLER) {
            self.catalog.crawler_name = Some(v);
        }
    }

    /// Loads the file then applies process environment overrides.
    pub fn from_sources(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }
}

/// The two values the single-invocation driver cannot run without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerlessConfig {
    pub bucket: String,
    pub crawler_name: String,
}

impl ServerlessConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = lookup(ENV_BUCKET).filter(|v| !v.trim().is_empty());
        let crawler_name = lookup(ENV_CRAWLER).filter(|v| !v.trim().is_empty());
        match (bucket, crawler_name) {
            (Some(bucket), Some(crawler_name)) => Ok(Self { bucket, crawler_name }),
            _ => Err(PipelineError::Config(format!(
                "{} and {} environment variables must be set",
                ENV_BUCKET, ENV_CRAWLER
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_without_file() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config.storage.gold_prefix, "gold");
        assert_eq!(config.transform.strategy().unwrap(), Strategy::Chunked { batch_rows: 500_000 });
        assert_eq!(config.paths.raw_dir, PathBuf::from("data"));
    }

    #[test]
    fn parses_sections() {
        let config = PipelineConfig::from_toml(
            r#"
            [periods]
            years = [2022]
            quarters = [3, 4]
            until = "2022q3"

            [transform]
            strategy = "in_memory"

            [storage]
            bucket = "fin-data"
            "#,
        )
        .unwrap();
        let periods = config.periods.range().unwrap().periods();
        assert_eq!(periods, vec![Period::new(2022, 3).unwrap()]);
        assert_eq!(config.transform.strategy().unwrap(), Strategy::InMemory);
        assert_eq!(config.storage.bucket.as_deref(), Some("fin-data"));
    }

    #[test]
    fn zero_batch_rows_is_rejected() {
        let config = PipelineConfig::from_toml("[transform]\nbatch_rows = 0").unwrap();
        assert!(matches!(config.transform.strategy(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = PipelineConfig::from_toml("[storage]\nbucket = \"from-file\"").unwrap();
        let env: HashMap<&str, &str> =
            [(ENV_BUCKET, "from-env"), (ENV_CRAWLER, "crawler"), (ENV_REGION, "")].into_iter().collect();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.storage.bucket.as_deref(), Some("from-env"));
        assert_eq!(config.catalog.crawler_name.as_deref(), Some("crawler"));
        assert_eq!(config.storage.region, None);
    }

    #[test]
    fn serverless_requires_both_values() {
        let only_bucket = |k: &str| (k == ENV_BUCKET).then(|| "bucket".to_string());
        assert!(matches!(ServerlessConfig::from_lookup(only_bucket), Err(PipelineError::Config(_))));

        let both = |k: &str| match k {
            ENV_BUCKET => Some("bucket".to_string()),
            ENV_CRAWLER => Some("crawler".to_string()),
            _ => None,
        };
        let config = ServerlessConfig::from_lookup(both).unwrap();
        assert_eq!(config.bucket, "bucket");
        assert_eq!(config.crawler_name, "crawler");
    }
}
