use std::path::PathBuf;
use tracing::{error, info, warn, Instrument};

use crate::app::ports::ArchiveFetcher;
use crate::error::PipelineError;
use crate::observability::metrics;
use crate::period::Period;
use crate::pipeline::publish::GoldPublisher;
use crate::pipeline::stages::{
    fetch_period, process_period, run_period, upload_period, FetchOutcome, PeriodOutcome, ProcessOutcome, RunContext,
    UploadOutcome,
};
use crate::pipeline::transform::Strategy;

/// Per-stage tally for a multi-period run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub skipped: usize,
    pub not_available: usize,
    pub empty: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.not_available + self.empty + self.failed
    }

    fn record_failure(&mut self, stage: &'static str, period: Period, err: &dyn std::fmt::Display) {
        error!("{} failed for {}: {}", stage, period, err);
        metrics::periods::failed(stage);
        self.failed += 1;
    }
}

/// Multi-period driver over a statically configured list of periods.
///
/// A failure for one period is logged and counted; the loop always moves on
/// to the next period.
pub struct BatchUseCase {
    periods: Vec<Period>,
    raw_root: PathBuf,
    processed_root: PathBuf,
}

impl BatchUseCase {
    pub fn new(periods: Vec<Period>, raw_root: impl Into<PathBuf>, processed_root: impl Into<PathBuf>) -> Self {
        Self { periods, raw_root: raw_root.into(), processed_root: processed_root.into() }
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn raw_dir(&self, period: Period) -> PathBuf {
        self.raw_root.join(period.slug())
    }

    pub fn artifact_path(&self, period: Period) -> PathBuf {
        self.processed_root.join(period.artifact_name())
    }

    /// Stage 1: download and extract every period not yet on disk.
    pub async fn fetch_all(&self, fetcher: &dyn ArchiveFetcher) -> BatchSummary {
        const STAGE: &str = "fetch";
        info!("--- Starting historical data acquisition for {} periods ---", self.periods.len());
        let mut summary = BatchSummary::default();
        if let Err(e) = tokio::fs::create_dir_all(&self.raw_root).await {
            error!("Cannot create raw data directory {}: {}", self.raw_root.display(), e);
            summary.failed = self.periods.len();
            return summary;
        }
        for &period in &self.periods {
            let span = tracing::info_span!("period", period = %period, stage = STAGE);
            match fetch_period(period, fetcher, &self.raw_root).instrument(span).await {
                Ok(FetchOutcome::Downloaded { .. }) => {
                    metrics::periods::completed(STAGE);
                    summary.completed += 1;
                }
                Ok(FetchOutcome::AlreadyPresent) => {
                    metrics::periods::skipped(STAGE);
                    summary.skipped += 1;
                }
                Err(PipelineError::NotYetPublished(p)) => {
                    warn!("Could not download data for {}. It may not be available yet.", p);
                    metrics::periods::not_available(STAGE);
                    summary.not_available += 1;
                }
                Err(e) => summary.record_failure(STAGE, period, &e),
            }
        }
        info!("--- Acquisition complete: {:?} ---", summary);
        summary
    }

    /// Stage 2: transform every extracted period into a local artifact.
    pub async fn process_all(&self, strategy: Strategy) -> BatchSummary {
        const STAGE: &str = "process";
        info!("--- Starting data processing ({}) ---", strategy.label());
        let mut summary = BatchSummary::default();
        for &period in &self.periods {
            let span = tracing::info_span!("period", period = %period, stage = STAGE);
            let raw_dir = self.raw_dir(period);
            let out_path = self.artifact_path(period);
            let result = tokio::task::spawn_blocking(move || {
                let _entered = span.enter();
                process_period(period, &raw_dir, &out_path, strategy)
            })
            .await
            .map_err(PipelineError::from)
            .and_then(|r| r);
            match result {
                Ok(ProcessOutcome::Written { .. }) => {
                    metrics::periods::completed(STAGE);
                    summary.completed += 1;
                }
                Ok(ProcessOutcome::AlreadyPresent) => {
                    metrics::periods::skipped(STAGE);
                    summary.skipped += 1;
                }
                Ok(ProcessOutcome::Empty) => {
                    metrics::periods::empty(STAGE);
                    summary.empty += 1;
                }
                Err(PipelineError::MissingSource(path)) => {
                    warn!("Raw data files not found for {} ({}). Run the fetch stage first. Skipping.", period, path);
                    metrics::periods::not_available(STAGE);
                    summary.not_available += 1;
                }
                Err(e) => summary.record_failure(STAGE, period, &e),
            }
        }
        info!("--- Processing complete: {:?} ---", summary);
        summary
    }

    /// Stage 3: upload every local artifact not yet in the gold layer.
    pub async fn upload_all(&self, publisher: &GoldPublisher) -> BatchSummary {
        const STAGE: &str = "upload";
        info!("--- Starting upload to the gold layer ---");
        let mut summary = BatchSummary::default();
        for &period in &self.periods {
            let span = tracing::info_span!("period", period = %period, stage = STAGE);
            let local = self.artifact_path(period);
            match upload_period(period, &local, publisher).instrument(span).await {
                Ok(UploadOutcome::Uploaded { .. }) => {
                    metrics::periods::completed(STAGE);
                    summary.completed += 1;
                }
                Ok(UploadOutcome::AlreadyPublished) => {
                    metrics::periods::skipped(STAGE);
                    summary.skipped += 1;
                }
                Ok(UploadOutcome::MissingArtifact) => {
                    info!("No processed file for {}; nothing to upload.", period);
                    metrics::periods::not_available(STAGE);
                    summary.not_available += 1;
                }
                Err(e) => summary.record_failure(STAGE, period, &e),
            }
        }
        info!("--- Upload complete: {:?} ---", summary);
        summary
    }

    /// Extract, transform and load each period in one pass.
    pub async fn run_all(&self, ctx: &RunContext<'_>) -> BatchSummary {
        const STAGE: &str = "run";
        let mut summary = BatchSummary::default();
        for &period in &self.periods {
            let span = tracing::info_span!("period", period = %period, stage = STAGE);
            match run_period(period, ctx).instrument(span).await {
                Ok(PeriodOutcome::Published { .. }) => {
                    metrics::periods::completed(STAGE);
                    summary.completed += 1;
                }
                Ok(PeriodOutcome::AlreadyPublished { .. }) => {
                    metrics::periods::skipped(STAGE);
                    summary.skipped += 1;
                }
                Ok(PeriodOutcome::NotYetAvailable) => {
                    metrics::periods::not_available(STAGE);
                    summary.not_available += 1;
                }
                Ok(PeriodOutcome::Empty) => {
                    metrics::periods::empty(STAGE);
                    summary.empty += 1;
                }
                Err(e) => summary.record_failure(STAGE, period, &e),
            }
        }
        summary
    }
}
