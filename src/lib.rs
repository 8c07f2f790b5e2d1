//! Quarterly SEC financial statement data set ETL.
//!
//! Downloads the `sub`/`num`/`tag` extracts for a reporting period, joins
//! USD facts with filer and tag metadata, and publishes one Parquet artifact
//! per period to the gold layer of an object store.

pub mod app;
pub mod config;
pub mod error;
pub mod infra;
pub mod model;
pub mod observability;
pub mod period;
pub mod pipeline;

pub use error::{PipelineError, Result};
pub use period::Period;
