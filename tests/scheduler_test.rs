//! Integration tests for the periodic sync scheduler

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{patient, tenant, Harness};
use fhir_bridge::adapters::database::{ChangeLogRetention, CursorStore};
use fhir_bridge::core::scheduler::SyncScheduler;
use fhir_bridge::core::state::{StateManager, SyncCursor};
use fhir_bridge::domain::{ChangeId, Operation};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn scheduler(harness: &Harness, interval: Duration) -> SyncScheduler {
    let cursors: Arc<dyn CursorStore> = harness.target.clone();
    SyncScheduler::new(harness.orchestrator.clone(), tenant(), interval)
        .with_state_manager(StateManager::new_with_storage(cursors))
}

#[tokio::test]
async fn test_initialize_without_stored_cursor_starts_at_log_end() {
    let harness = Harness::new();
    for id in 1..=3 {
        harness.log.push("patients", Operation::Delete, id);
    }
    let scheduler = scheduler(&harness, Duration::from_secs(60));

    let cursor = scheduler.initialize().await.unwrap();
    assert_eq!(cursor.last_change_id, ChangeId::new(3));

    let outcome = scheduler.run_once().await.unwrap();
    assert_eq!(outcome.incremental_stats().unwrap().total_changes, 0);

    harness.source.put("patients", 4, patient(4));
    harness.log.push("patients", Operation::Insert, 4);
    let outcome = scheduler.run_once().await.unwrap();
    assert_eq!(outcome.incremental_stats().unwrap().synced, 1);

    let stored = harness.target.stored_cursor(tenant()).unwrap();
    assert_eq!(stored.last_change_id, ChangeId::new(4));

    let stats = scheduler.stats().await;
    assert_eq!(stats.total_runs, 2);
    assert_eq!(stats.successful_runs, 2);
    assert_eq!(stats.total_changes_synced, 1);
    assert!(stats.last_run_time.is_some());
}

#[tokio::test]
async fn test_initialize_resumes_from_stored_cursor() {
    let harness = Harness::new();
    for id in 1..=3 {
        harness.source.put("patients", id, patient(id));
        harness.log.push("patients", Operation::Insert, id);
    }
    harness
        .target
        .save_cursor(&SyncCursor::new(tenant(), ChangeId::new(1)))
        .await
        .unwrap();
    let scheduler = scheduler(&harness, Duration::from_secs(60));

    let cursor = scheduler.initialize().await.unwrap();
    assert_eq!(cursor.last_change_id, ChangeId::new(1));

    let outcome = scheduler.run_once().await.unwrap();
    let stats = outcome.incremental_stats().unwrap();
    assert_eq!(stats.total_changes, 2);
    assert_eq!(stats.last_change_id, ChangeId::new(3));
    assert_eq!(
        harness.target.stored_cursor(tenant()).map(|c| c.last_change_id),
        Some(ChangeId::new(3))
    );
}

#[tokio::test]
async fn test_failed_run_is_counted_and_retried() {
    let harness = Harness::new();
    harness.log.push("patients", Operation::Delete, 1);
    let scheduler = scheduler(&harness, Duration::from_secs(60));
    scheduler.initialize().await.unwrap();

    harness.log.push("patients", Operation::Delete, 2);
    harness.log.fail_reads(true);
    let outcome = scheduler.run_once().await.unwrap();
    assert!(!outcome.is_completed());

    let stats = scheduler.stats().await;
    assert_eq!(stats.failed_runs, 1);
    assert!(stats
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("connection reset")));
    assert!(harness.target.stored_cursor(tenant()).is_none());

    harness.log.fail_reads(false);
    let outcome = scheduler.run_once().await.unwrap();
    assert!(outcome.is_completed());
    assert_eq!(outcome.incremental_stats().unwrap().total_changes, 1);

    let stats = scheduler.stats().await;
    assert_eq!(stats.total_runs, 2);
    assert_eq!(stats.successful_runs, 1);
    assert!(stats.last_error.is_none());
}

#[tokio::test]
async fn test_run_while_another_sync_holds_the_guard() {
    let harness = Harness::new();
    harness.source.put("patients", 1, patient(1));
    let gate = harness.source.hold_extracts();
    let scheduler = scheduler(&harness, Duration::from_secs(60));
    scheduler.initialize().await.unwrap();

    let orchestrator = harness.orchestrator.clone();
    let running = tokio::spawn(async move { orchestrator.full_sync(tenant(), None, &[]).await });
    while !harness.orchestrator.is_syncing() {
        tokio::task::yield_now().await;
    }

    assert!(scheduler.run_once().await.is_none());
    let stats = scheduler.stats().await;
    assert_eq!(stats.failed_runs, 1);
    assert!(stats.last_error.is_some());

    gate.add_permits(100);
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_retention_purges_old_processed_events() {
    let harness = Harness::new();
    let old = Utc::now() - ChronoDuration::days(40);
    harness.log.push_at("patients", Operation::Delete, 1, old);
    harness.log.push_at("patients", Operation::Delete, 2, old);
    harness.log.push("patients", Operation::Delete, 3);
    harness
        .target
        .save_cursor(&SyncCursor::new(tenant(), ChangeId::new(0)))
        .await
        .unwrap();

    let retention: Arc<dyn ChangeLogRetention> = harness.log.clone();
    let scheduler = scheduler(&harness, Duration::from_secs(60)).with_retention(retention, 30);
    scheduler.initialize().await.unwrap();

    let outcome = scheduler.run_once().await.unwrap();
    assert_eq!(outcome.incremental_stats().unwrap().total_changes, 3);
    assert_eq!(harness.log.len(), 1);
}

#[tokio::test]
async fn test_retention_keeps_unprocessed_events() {
    let harness = Harness::new();
    let old = Utc::now() - ChronoDuration::days(40);
    harness.log.push_at("patients", Operation::Delete, 1, old);
    harness.log.push_at("patients", Operation::Delete, 2, old);

    let purged = harness.log.purge(30, ChangeId::new(1)).await.unwrap();
    assert_eq!(purged, 1);
    assert_eq!(harness.log.len(), 1);
}

#[tokio::test]
async fn test_run_returns_immediately_after_shutdown() {
    let harness = Harness::new();
    let scheduler = scheduler(&harness, Duration::from_secs(60));
    let (tx, rx) = watch::channel(true);

    let stats = scheduler.run(rx).await.unwrap();
    assert_eq!(stats.total_runs, 0);
    drop(tx);
}

#[tokio::test]
async fn test_run_stops_on_shutdown_signal() {
    let harness = Harness::new();
    harness.source.put("patients", 1, patient(1));
    let scheduler = Arc::new(scheduler(&harness, Duration::from_millis(20)));
    let (tx, rx) = watch::channel(false);

    let task = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(rx).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    harness.log.push("patients", Operation::Insert, 1);
    tokio::time::sleep(Duration::from_millis(80)).await;
    tx.send(true).unwrap();

    let stats = task.await.unwrap().unwrap();
    assert!(stats.total_runs >= 2);
    assert_eq!(stats.failed_runs, 0);
    assert_eq!(stats.total_changes_synced, 1);
    assert!(harness.target.document(tenant(), "patients", 1).is_some());
}

#[test]
fn test_debug_lists_settings() {
    let harness = Harness::new();
    let retention: Arc<dyn ChangeLogRetention> = harness.log.clone();
    let scheduler = scheduler(&harness, Duration::from_secs(30)).with_retention(retention, 7);

    let debug = format!("{scheduler:?}");
    assert!(debug.contains("persists_cursor: true"));
    assert!(debug.contains("retention_days: Some(7)"));
}
