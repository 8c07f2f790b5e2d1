use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use fsds_pipeline::app::batch_use_case::{BatchSummary, BatchUseCase};
use fsds_pipeline::app::invoke_use_case;
use fsds_pipeline::app::ports::{CatalogTrigger, ObjectStore};
use fsds_pipeline::config::{PipelineConfig, StrategyKind};
use fsds_pipeline::infra::glue_catalog::{GlueCrawlerTrigger, NoopCatalog};
use fsds_pipeline::infra::http_client::SecArchiveClient;
use fsds_pipeline::infra::local_store::LocalObjectStore;
use fsds_pipeline::infra::s3_store::S3ObjectStore;
use fsds_pipeline::observability::{logging, metrics};
use fsds_pipeline::period::PeriodRange;
use fsds_pipeline::pipeline::publish::GoldPublisher;
use fsds_pipeline::pipeline::stages::RunContext;
use fsds_pipeline::Period;

#[derive(Parser)]
#[command(name = "fsds")]
#[command(about = "Fetch, join and publish SEC financial statement data sets")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file (default: fsds.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for rotated JSON log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct PeriodArgs {
    /// Years to iterate, overriding the configuration
    #[arg(long, value_delimiter = ',')]
    years: Option<Vec<i32>>,
    /// Quarters to iterate, overriding the configuration
    #[arg(long, value_delimiter = ',')]
    quarters: Option<Vec<u8>>,
    /// Last period known to be published, e.g. 2024q1
    #[arg(long)]
    until: Option<Period>,
    /// A single period, e.g. 2023q4; takes precedence over the range
    #[arg(long, conflicts_with_all = ["years", "quarters", "until"])]
    period: Option<Period>,
}

#[derive(Args, Clone)]
struct TransformArgs {
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
    /// Rows per facts batch for the chunked strategy
    #[arg(long)]
    batch_rows: Option<usize>,
}

#[derive(Args, Clone)]
struct StoreArgs {
    /// Publish into a local directory instead of S3
    #[arg(long)]
    local_store: Option<PathBuf>,
}

#[derive(Copy, Clone, ValueEnum)]
enum StrategyArg {
    InMemory,
    Chunked,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and extract the archives for every configured period
    Fetch {
        #[command(flatten)]
        periods: PeriodArgs,
    },
    /// Join extracted periods into local Parquet artifacts
    Process {
        #[command(flatten)]
        periods: PeriodArgs,
        #[command(flatten)]
        transform: TransformArgs,
    },
    /// Upload local artifacts to the gold layer
    Upload {
        #[command(flatten)]
        periods: PeriodArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Extract, transform and load each period in one pass
    Run {
        #[command(flatten)]
        periods: PeriodArgs,
        #[command(flatten)]
        transform: TransformArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Process the current quarter the way the serverless entry point does
    Invoke,
}

fn resolve_periods(config: &PipelineConfig, args: &PeriodArgs) -> anyhow::Result<Vec<Period>> {
    if let Some(p) = args.period {
        return Ok(PeriodRange::single(p).periods());
    }
    let mut periods = config.periods.clone();
    if let Some(years) = &args.years {
        periods.years = years.clone();
    }
    if let Some(quarters) = &args.quarters {
        periods.quarters = quarters.clone();
    }
    if let Some(until) = args.until {
        periods.until = Some(until.slug());
    }
    Ok(periods.range()?.periods())
}

fn apply_transform_args(config: &mut PipelineConfig, args: &TransformArgs) {
    if let Some(strategy) = args.strategy {
        config.transform.strategy = match strategy {
            StrategyArg::InMemory => StrategyKind::InMemory,
            StrategyArg::Chunked => StrategyKind::Chunked,
        };
    }
    if let Some(rows) = args.batch_rows {
        config.transform.batch_rows = rows;
    }
}

async fn build_publisher(config: &PipelineConfig, args: &StoreArgs) -> anyhow::Result<GoldPublisher> {
    let store: Arc<dyn ObjectStore> = match &args.local_store {
        Some(dir) => Arc::new(LocalObjectStore::new(dir.clone())),
        None => Arc::new(S3ObjectStore::new(&config.storage).await.context("S3 store is not configured")?),
    };
    Ok(GoldPublisher::new(store, &config.storage.gold_prefix))
}

fn build_fetcher(config: &PipelineConfig) -> anyhow::Result<SecArchiveClient> {
    Ok(SecArchiveClient::new(
        &config.source.base_url,
        &config.source.user_agent,
        Duration::from_secs(config.source.timeout_secs),
    )?)
}

fn report(stage: &str, summary: BatchSummary) {
    info!(
        completed = summary.completed,
        skipped = summary.skipped,
        not_available = summary.not_available,
        empty = summary.empty,
        failed = summary.failed,
        "--- {} finished for {} periods ---",
        stage,
        summary.total()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    let _log_guard = logging::init_logging(&cli.log_dir);
    if let Err(e) = metrics::init("fsds_pipeline") {
        warn!("Metrics disabled: {}", e);
    }

    let mut config = PipelineConfig::from_sources(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch { periods } => {
            let periods = resolve_periods(&config, &periods)?;
            let fetcher = build_fetcher(&config)?;
            let batch = BatchUseCase::new(periods, &config.paths.raw_dir, &config.paths.processed_dir);
            report("fetch", batch.fetch_all(&fetcher).await);
        }
        Commands::Process { periods, transform } => {
            apply_transform_args(&mut config, &transform);
            let periods = resolve_periods(&config, &periods)?;
            let strategy = config.transform.strategy()?;
            tokio::fs::create_dir_all(&config.paths.processed_dir).await?;
            let batch = BatchUseCase::new(periods, &config.paths.raw_dir, &config.paths.processed_dir);
            report("process", batch.process_all(strategy).await);
        }
        Commands::Upload { periods, store } => {
            let periods = resolve_periods(&config, &periods)?;
            let publisher = build_publisher(&config, &store).await?;
            let batch = BatchUseCase::new(periods, &config.paths.raw_dir, &config.paths.processed_dir);
            report("upload", batch.upload_all(&publisher).await);
        }
        Commands::Run { periods, transform, store } => {
            apply_transform_args(&mut config, &transform);
            let periods = resolve_periods(&config, &periods)?;
            let fetcher = build_fetcher(&config)?;
            let publisher = build_publisher(&config, &store).await?;
            let catalog: Box<dyn CatalogTrigger> = match &config.catalog.crawler_name {
                Some(name) => Box::new(GlueCrawlerTrigger::new(name, config.storage.region.as_deref()).await?),
                None => Box::new(NoopCatalog),
            };
            let ctx = RunContext {
                fetcher: &fetcher,
                publisher: &publisher,
                catalog: catalog.as_ref(),
                strategy: config.transform.strategy()?,
                scratch_root: None,
            };
            let batch = BatchUseCase::new(periods, &config.paths.raw_dir, &config.paths.processed_dir);
            report("run", batch.run_all(&ctx).await);
        }
        Commands::Invoke => {
            let response = invoke_use_case::invoke_from_env().await;
            info!(status = response.status_code, "{}", response.body);
        }
    }

    if let Err(e) = metrics::push_all().await {
        warn!("Failed to push metrics: {}", e);
    }
    Ok(())
}
