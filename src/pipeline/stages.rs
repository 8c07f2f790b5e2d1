//! The per-period operation: fetch, process, upload, and the composed run.
//!
//! Both drivers call into this module; neither carries pipeline logic of
//! its own.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::app::ports::{ArchiveFetcher, CatalogTrigger};
use crate::error::{PipelineError, Result};
use crate::model::EnrichedTable;
use crate::observability::metrics;
use crate::period::Period;
use crate::pipeline::parquet_out::{artifact_row_count, write_parquet};
use crate::pipeline::publish::GoldPublisher;
use crate::pipeline::source::{
    extract_archive, read_facts, read_submissions, read_tags, FactBatches, RawPeriodFiles,
};
use crate::pipeline::transform::{join_batch, transform_chunked, ReferenceTables, Strategy, TransformStats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded { files: usize },
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Written { rows: usize, path: PathBuf },
    AlreadyPresent,
    /// No USD fact survived the joins; nothing was written.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { location: String },
    AlreadyPublished,
    MissingArtifact,
}

/// Downloads and extracts a period into `raw_root/{year}q{quarter}` unless
/// it is already there.
///
/// Extraction happens in a `.partial` sibling that is renamed into place
/// once complete.
pub async fn fetch_period(period: Period, fetcher: &dyn ArchiveFetcher, raw_root: &Path) -> Result<FetchOutcome> {
    let dir = raw_root.join(period.slug());
    if RawPeriodFiles::present(&dir) {
        info!("Data for {} already exists. Skipping download.", period);
        return Ok(FetchOutcome::AlreadyPresent);
    }

    let bytes = fetcher.fetch(period).await?;

    let staging = raw_root.join(format!("{}.partial", period.slug()));
    let target = dir.clone();
    let files = tokio::task::spawn_blocking(move || -> Result<usize> {
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        let written = extract_archive(&bytes, &staging)?;
        if target.exists() {
            std::fs::remove_dir_all(&target)?;
        }
        std::fs::rename(&staging, &target)?;
        Ok(written.len())
    })
    .await??;

    info!("Successfully extracted {} files for {} into {}", files, period, dir.display());
    Ok(FetchOutcome::Downloaded { files })
}

/// Reads the extracts and applies the join with the chosen strategy.
/// Submissions and tags are loaded once and shared by every batch.
pub fn load_and_transform(files: &RawPeriodFiles, strategy: Strategy) -> Result<(EnrichedTable, TransformStats)> {
    let refs = ReferenceTables::new(read_submissions(&files.submissions)?, read_tags(&files.tags)?);
    info!(
        submissions = refs.submission_count(),
        tags = refs.tag_count(),
        "Loaded reference tables"
    );
    match strategy {
        Strategy::InMemory => {
            let facts = read_facts(&files.facts)?;
            Ok(join_batch(&facts, &refs))
        }
        Strategy::Chunked { batch_rows } => {
            info!("Processing '{}' in chunks of {} rows", files.facts.display(), batch_rows);
            transform_chunked(FactBatches::open(&files.facts, batch_rows)?, &refs)
        }
    }
}

/// Transforms one extracted period into a local Parquet artifact.
pub fn process_period(period: Period, raw_dir: &Path, out_path: &Path, strategy: Strategy) -> Result<ProcessOutcome> {
    if out_path.exists() {
        info!("Result file {} already exists. Skipping.", out_path.display());
        return Ok(ProcessOutcome::AlreadyPresent);
    }
    let files = RawPeriodFiles::locate(raw_dir)?;

    let started = Instant::now();
    let (table, stats) = load_and_transform(&files, strategy)?;
    metrics::transform::period_transformed(stats.rows_out, stats.unresolved_dropped, started.elapsed().as_secs_f64());
    info!(
        strategy = strategy.label(),
        facts_read = stats.facts_read,
        usd_facts = stats.usd_facts,
        dropped = stats.unresolved_dropped,
        rows_out = stats.rows_out,
        batches = stats.batches,
        "Transformed {}",
        period
    );

    if table.is_empty() {
        warn!("No data to save for {} after filtering.", period);
        return Ok(ProcessOutcome::Empty);
    }

    let rows = table.len();
    write_parquet(&table, out_path)?;
    drop(table);
    info!("Saved {} rows for {} to {}", rows, period, out_path.display());
    Ok(ProcessOutcome::Written { rows, path: out_path.to_path_buf() })
}

/// Publishes a local artifact unless the period is already in the gold layer.
pub async fn upload_period(period: Period, local: &Path, publisher: &GoldPublisher) -> Result<UploadOutcome> {
    if publisher.is_published(period).await? {
        info!("{} already published at {}", period, publisher.location(period));
        return Ok(UploadOutcome::AlreadyPublished);
    }
    if !local.is_file() {
        return Ok(UploadOutcome::MissingArtifact);
    }
    let rows = artifact_row_count(local)?;
    info!("Uploading {} ({} rows)...", local.display(), rows);
    let location = publisher.publish(local, period).await?;
    info!("Successfully uploaded processed data to {}", location);
    Ok(UploadOutcome::Uploaded { location })
}

/// Which part of a composed run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extraction",
            Stage::Transform => "transformation",
            Stage::Load => "loading",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("An error occurred during {stage}: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub error: PipelineError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageFailure>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageFailure> {
        self.map_err(|error| StageFailure { stage, error })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodOutcome {
    Published { location: String, rows: usize },
    AlreadyPublished { location: String },
    NotYetAvailable,
    Empty,
}

/// Collaborators for a composed extract/transform/load run.
pub struct RunContext<'a> {
    pub fetcher: &'a dyn ArchiveFetcher,
    pub publisher: &'a GoldPublisher,
    pub catalog: &'a dyn CatalogTrigger,
    pub strategy: Strategy,
    /// Parent for the run-scoped scratch directory; the system temp dir if `None`.
    pub scratch_root: Option<PathBuf>,
}

/// Runs extract, transform and load for one period.
///
/// Skips all work if the gold artifact already exists. Scratch files live
/// in a directory removed when the run returns. A catalog trigger failure
/// is reported as a load failure but the artifact stays published.
pub async fn run_period(period: Period, ctx: &RunContext<'_>) -> std::result::Result<PeriodOutcome, StageFailure> {
    if ctx.publisher.is_published(period).await.at(Stage::Extract)? {
        let location = ctx.publisher.location(period);
        info!("{} already published at {}; skipping", period, location);
        return Ok(PeriodOutcome::AlreadyPublished { location });
    }

    let prefix = format!("fsds-{}-", period.slug());
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix);
    let scratch = match &ctx.scratch_root {
        Some(root) => {
            std::fs::create_dir_all(root).map_err(PipelineError::from).at(Stage::Extract)?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    }
    .map_err(PipelineError::from)
    .at(Stage::Extract)?;

    info!("Step 1: Fetching data for {}", period);
    match fetch_period(period, ctx.fetcher, scratch.path()).await {
        Ok(_) => {}
        Err(PipelineError::NotYetPublished(p)) => {
            warn!("The data for {} might not be available yet.", p);
            return Ok(PeriodOutcome::NotYetAvailable);
        }
        Err(e) => return Err(StageFailure { stage: Stage::Extract, error: e }),
    }

    info!("Step 2: Transforming data for {}", period);
    let raw_dir = scratch.path().join(period.slug());
    let out_path = scratch.path().join("processed").join(period.artifact_name());
    let strategy = ctx.strategy;
    let outcome = {
        let out_path = out_path.clone();
        tokio::task::spawn_blocking(move || process_period(period, &raw_dir, &out_path, strategy))
            .await
            .map_err(PipelineError::from)
            .and_then(|r| r)
            .at(Stage::Transform)?
    };
    let rows = match outcome {
        ProcessOutcome::Written { rows, .. } => rows,
        ProcessOutcome::Empty => return Ok(PeriodOutcome::Empty),
        ProcessOutcome::AlreadyPresent => artifact_row_count(&out_path).at(Stage::Transform)?.max(0) as usize,
    };

    info!("Step 3: Uploading {} and starting catalog crawl", period);
    let location = ctx.publisher.publish(&out_path, period).await.at(Stage::Load)?;
    info!("Successfully uploaded processed data to {}", location);

    let triggered = ctx.catalog.trigger().await;
    metrics::catalog::triggered(triggered.is_ok());
    triggered.at(Stage::Load)?;

    drop(scratch);
    Ok(PeriodOutcome::Published { location, rows })
}
