//! Pipeline metrics on top of the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op, which keeps library
//! code and tests free of setup.

use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// All metric names used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    FetchRequestsSuccess,
    FetchRequestsError,
    FetchNotPublished,
    FetchRequestDuration,
    FetchArchiveBytes,

    TransformBatchesProcessed,
    TransformBatchSize,
    TransformRowsOut,
    TransformRowsDropped,
    TransformDuration,

    PeriodsCompleted,
    PeriodsSkipped,
    PeriodsNotAvailable,
    PeriodsEmpty,
    PeriodsFailed,

    CatalogTriggers,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FetchRequestsSuccess => "fsds_fetch_requests_success_total",
            MetricName::FetchRequestsError => "fsds_fetch_requests_error_total",
            MetricName::FetchNotPublished => "fsds_fetch_not_published_total",
            MetricName::FetchRequestDuration => "fsds_fetch_request_duration_seconds",
            MetricName::FetchArchiveBytes => "fsds_fetch_archive_bytes",

            MetricName::TransformBatchesProcessed => "fsds_transform_batches_processed_total",
            MetricName::TransformBatchSize => "fsds_transform_batch_size",
            MetricName::TransformRowsOut => "fsds_transform_rows_out_total",
            MetricName::TransformRowsDropped => "fsds_transform_rows_dropped_total",
            MetricName::TransformDuration => "fsds_transform_duration_seconds",

            MetricName::PeriodsCompleted => "fsds_periods_completed_total",
            MetricName::PeriodsSkipped => "fsds_periods_skipped_total",
            MetricName::PeriodsNotAvailable => "fsds_periods_not_available_total",
            MetricName::PeriodsEmpty => "fsds_periods_empty_total",
            MetricName::PeriodsFailed => "fsds_periods_failed_total",

            MetricName::CatalogTriggers => "fsds_catalog_triggers_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

struct MetricsState {
    handle: metrics_exporter_prometheus::PrometheusHandle,
    pushgateway_url: Option<String>,
    job: String,
}

static METRICS_STATE: OnceLock<MetricsState> = OnceLock::new();

/// Installs the Prometheus recorder. `FSDS_PUSHGATEWAY_URL` enables
/// [`push_all`].
pub fn init(job: &str) -> Result<(), Box<dyn std::error::Error>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    let pushgateway_url = std::env::var("FSDS_PUSHGATEWAY_URL").ok().filter(|u| !u.is_empty());
    if pushgateway_url.is_some() {
        info!("Metrics system initialized with push gateway support");
    } else {
        info!("Metrics system initialized (no push gateway)");
    }
    METRICS_STATE
        .set(MetricsState { handle, pushgateway_url, job: job.to_string() })
        .map_err(|_| "metrics already initialized")?;
    Ok(())
}

/// Current metrics in Prometheus text format, if a recorder is installed.
pub fn render() -> Option<String> {
    METRICS_STATE.get().map(|state| state.handle.render())
}

/// Pushes every recorded metric to the configured pushgateway, once per run.
pub async fn push_all() -> Result<(), Box<dyn std::error::Error>> {
    let Some(state) = METRICS_STATE.get() else { return Ok(()) };
    let Some(base) = &state.pushgateway_url else { return Ok(()) };
    let push_url = format!("{}/metrics/job/{}", base.trim_end_matches('/'), state.job);
    let client = reqwest::Client::new();
    client
        .put(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(state.handle.render())
        .send()
        .await?
        .error_for_status()?;
    info!("Pushed metrics to {}", push_url);
    Ok(())
}

pub mod fetch {
    use super::MetricName;

    pub fn request_success() {
        ::metrics::counter!(MetricName::FetchRequestsSuccess.as_str()).increment(1);
    }

    pub fn request_error() {
        ::metrics::counter!(MetricName::FetchRequestsError.as_str()).increment(1);
    }

    pub fn not_published() {
        ::metrics::counter!(MetricName::FetchNotPublished.as_str()).increment(1);
    }

    pub fn request_duration(secs: f64) {
        ::metrics::histogram!(MetricName::FetchRequestDuration.as_str()).record(secs);
    }

    pub fn archive_bytes(bytes: usize) {
        ::metrics::histogram!(MetricName::FetchArchiveBytes.as_str()).record(bytes as f64);
    }
}

pub mod transform {
    use super::MetricName;

    pub fn batch_processed(rows: usize) {
        ::metrics::counter!(MetricName::TransformBatchesProcessed.as_str()).increment(1);
        ::metrics::histogram!(MetricName::TransformBatchSize.as_str()).record(rows as f64);
    }

    pub fn period_transformed(rows_out: usize, dropped: usize, secs: f64) {
        ::metrics::counter!(MetricName::TransformRowsOut.as_str()).increment(rows_out as u64);
        ::metrics::counter!(MetricName::TransformRowsDropped.as_str()).increment(dropped as u64);
        ::metrics::histogram!(MetricName::TransformDuration.as_str()).record(secs);
    }
}

pub mod periods {
    use super::MetricName;

    pub fn completed(stage: &'static str) {
        ::metrics::counter!(MetricName::PeriodsCompleted.as_str(), "stage" => stage).increment(1);
    }

    pub fn skipped(stage: &'static str) {
        ::metrics::counter!(MetricName::PeriodsSkipped.as_str(), "stage" => stage).increment(1);
    }

    pub fn not_available(stage: &'static str) {
        ::metrics::counter!(MetricName::PeriodsNotAvailable.as_str(), "stage" => stage).increment(1);
    }

    pub fn empty(stage: &'static str) {
        ::metrics::counter!(MetricName::PeriodsEmpty.as_str(), "stage" => stage).increment(1);
    }

    pub fn failed(stage: &'static str) {
        ::metrics::counter!(MetricName::PeriodsFailed.as_str(), "stage" => stage).increment(1);
    }
}

pub mod catalog {
    use super::MetricName;

    pub fn triggered(ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        ::metrics::counter!(MetricName::CatalogTriggers.as_str(), "outcome" => outcome).increment(1);
    }
}
