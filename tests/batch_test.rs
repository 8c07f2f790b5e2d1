mod common;

use std::sync::Arc;

use anyhow::Result;
use fsds_pipeline::app::batch_use_case::{BatchSummary, BatchUseCase};
use fsds_pipeline::app::invoke_use_case::handle;
use fsds_pipeline::app::ports::ObjectStore;
use fsds_pipeline::infra::local_store::LocalObjectStore;
use fsds_pipeline::pipeline::publish::GoldPublisher;
use fsds_pipeline::pipeline::stages::RunContext;
use fsds_pipeline::pipeline::transform::Strategy;
use tempfile::tempdir;

use common::*;

#[tokio::test]
async fn staged_batch_run_is_idempotent_and_isolates_failures() -> Result<()> {
    let dir = tempdir()?;
    let (q1, q2, q3, q4) = (period("2023q1"), period("2023q2"), period("2023q3"), period("2023q4"));
    let fetcher = FakeFetcher::default()
        .with(q1, build_archive(SUB, NUM, TAG))
        .with(q2, build_archive(SUB, NUM_NO_USD, TAG))
        .failing(q3);
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path().join("bucket")));
    let publisher = GoldPublisher::new(store, "gold");
    let batch = BatchUseCase::new(vec![q1, q2, q3, q4], dir.path().join("data"), dir.path().join("processed"));

    let fetched = batch.fetch_all(&fetcher).await;
    assert_eq!(fetched, BatchSummary { completed: 2, skipped: 0, not_available: 1, empty: 0, failed: 1 });

    let processed = batch.process_all(Strategy::Chunked { batch_rows: 3 }).await;
    assert_eq!(processed, BatchSummary { completed: 1, skipped: 0, not_available: 2, empty: 1, failed: 0 });
    assert!(batch.artifact_path(q1).is_file());
    assert!(!batch.artifact_path(q2).exists());

    let uploaded = batch.upload_all(&publisher).await;
    assert_eq!(uploaded, BatchSummary { completed: 1, skipped: 0, not_available: 3, empty: 0, failed: 0 });
    assert!(publisher.is_published(q1).await?);

    // Second pass: everything already done is skipped.
    let calls_before = fetcher.call_count();
    let fetched = batch.fetch_all(&fetcher).await;
    assert_eq!(fetched.skipped, 2);
    assert_eq!(fetcher.call_count(), calls_before + 2);
    assert_eq!(batch.process_all(Strategy::InMemory).await.skipped, 1);
    assert_eq!(batch.upload_all(&publisher).await.skipped, 1);
    Ok(())
}

#[tokio::test]
async fn run_all_continues_past_failing_period() -> Result<()> {
    let dir = tempdir()?;
    let (bad, good) = (period("2022q4"), period("2023q1"));
    let fetcher = FakeFetcher::default().failing(bad).with(good, build_archive(SUB, NUM, TAG));
    let catalog = RecordingCatalog::default();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path().join("bucket")));
    let publisher = GoldPublisher::new(store, "gold");
    let ctx = RunContext {
        fetcher: &fetcher,
        publisher: &publisher,
        catalog: &catalog,
        strategy: Strategy::Chunked { batch_rows: 500_000 },
        scratch_root: Some(dir.path().join("scratch")),
    };
    let batch = BatchUseCase::new(vec![bad, good], dir.path().join("data"), dir.path().join("processed"));

    let summary = batch.run_all(&ctx).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 1);
    assert!(publisher.is_published(good).await?);
    Ok(())
}

#[tokio::test]
async fn handler_maps_outcomes_to_status_codes() -> Result<()> {
    let dir = tempdir()?;
    let (available, missing, broken) = (period("2024q1"), period("2024q2"), period("2024q3"));
    let fetcher = FakeFetcher::default().with(available, build_archive(SUB, NUM, TAG)).failing(broken);
    let catalog = RecordingCatalog::default();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path().join("bucket")));
    let publisher = GoldPublisher::new(store, "gold");
    let ctx = RunContext {
        fetcher: &fetcher,
        publisher: &publisher,
        catalog: &catalog,
        strategy: Strategy::InMemory,
        scratch_root: Some(dir.path().join("scratch")),
    };

    let ok = handle(&ctx, available).await;
    assert_eq!(ok.status_code, 200);
    assert_eq!(ok.body, "Successfully processed and loaded data for 2024 Q1.");

    let again = handle(&ctx, available).await;
    assert_eq!(again.status_code, 200);
    assert!(again.body.contains("already published"));

    let not_found = handle(&ctx, missing).await;
    assert_eq!(not_found.status_code, 404);
    assert!(not_found.body.contains("2024 Q2"));

    let failed = handle(&ctx, broken).await;
    assert_eq!(failed.status_code, 500);
    assert!(failed.body.starts_with("Extraction failed"));
    Ok(())
}
