use crate::period::Period;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Delimited text error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream archive answered "not found"; the period is not released yet.
    #[error("Data for {0} is not published yet")]
    NotYetPublished(Period),

    #[error("Source archive returned HTTP {status} for {url}")]
    Upstream { status: u16, url: String },

    #[error("Missing source file: {0}")]
    MissingSource(String),

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Catalog trigger failed: {message}")]
    Catalog { message: String },

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// True when the error means "retry later" rather than a defect.
    pub fn is_not_yet_published(&self) -> bool {
        matches!(self, PipelineError::NotYetPublished(_))
    }

    pub fn storage(message: impl Into<String>) -> Self {
        PipelineError::Storage { message: message.into() }
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        PipelineError::Catalog { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
