//! Periodic incremental sync driver
//!
//! Ticks every `sync.interval_seconds`, runs an incremental sync, persists
//! the cursor and compacts the change log. A failed run is counted and the
//! next tick retries. Shutdown is checked between runs only.

use crate::adapters::database::traits::ChangeLogRetention;
use crate::core::state::{StateManager, SyncCursor};
use crate::core::sync::{SyncOrchestrator, SyncOutcome};
use crate::domain::{Result, TenantId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};

/// Counters of a scheduler's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub total_changes_synced: u64,
    pub last_run_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct Retention {
    store: Arc<dyn ChangeLogRetention>,
    retain_days: u32,
}

/// Runs incremental syncs on a fixed interval
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    tenant: TenantId,
    interval: Duration,
    state_manager: Option<StateManager>,
    retention: Option<Retention>,
    stats: Mutex<SchedulerStats>,
}

impl SyncScheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, tenant: TenantId, interval: Duration) -> Self {
        Self {
            orchestrator,
            tenant,
            interval,
            state_manager: None,
            retention: None,
            stats: Mutex::new(SchedulerStats::default()),
        }
    }

    /// Persist the cursor after each successful run
    pub fn with_state_manager(mut self, state_manager: StateManager) -> Self {
        self.state_manager = Some(state_manager);
        self
    }

    /// Purge processed events older than `retain_days` after each successful run
    pub fn with_retention(mut self, store: Arc<dyn ChangeLogRetention>, retain_days: u32) -> Self {
        self.retention = Some(Retention { store, retain_days });
        self
    }

    pub async fn stats(&self) -> SchedulerStats {
        self.stats.lock().await.clone()
    }

    /// Establishes the starting cursor
    ///
    /// Uses the stored cursor when there is one. Otherwise starts at the
    /// current end of the change log, so only changes made from now on are
    /// replayed.
    pub async fn initialize(&self) -> Result<SyncCursor> {
        if let Some(ref manager) = self.state_manager {
            if let Some(cursor) = manager.load_cursor(self.tenant).await? {
                tracing::info!(
                    tenant_id = %self.tenant,
                    last_change_id = %cursor.last_change_id,
                    "Resuming from stored cursor"
                );
                self.orchestrator.restore_cursor(cursor.clone()).await;
                return Ok(cursor);
            }
        }

        if let Some(position) = self.orchestrator.cursor(self.tenant).await {
            return Ok(SyncCursor::new(self.tenant, position));
        }

        let latest = self.orchestrator.reader().latest_id().await?;
        let cursor = SyncCursor::new(self.tenant, latest);
        tracing::info!(
            tenant_id = %self.tenant,
            last_change_id = %latest,
            "No stored cursor; starting at the end of the change log"
        );
        self.orchestrator.restore_cursor(cursor.clone()).await;
        Ok(cursor)
    }

    /// Runs one incremental sync and updates the counters
    ///
    /// Never fails; failures are recorded in [`SchedulerStats::last_error`].
    pub async fn run_once(&self) -> Option<SyncOutcome> {
        let result = self
            .orchestrator
            .trigger_incremental_sync(self.tenant, None)
            .await;

        let mut stats = self.stats.lock().await;
        stats.total_runs += 1;
        stats.last_run_time = Some(Utc::now());

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                stats.failed_runs += 1;
                stats.last_error = Some(e.to_string());
                tracing::warn!(error = %e, "Scheduled sync skipped");
                return None;
            }
        };

        if !outcome.is_completed() {
            stats.failed_runs += 1;
            stats.last_error = Some(outcome.message.clone());
            return Some(outcome);
        }

        stats.successful_runs += 1;
        stats.last_error = None;
        if let Some(incremental) = outcome.incremental_stats() {
            stats.total_changes_synced += incremental.synced as u64;
        }
        drop(stats);

        self.after_success().await;
        Some(outcome)
    }

    async fn after_success(&self) {
        let Some(position) = self.orchestrator.cursor(self.tenant).await else {
            return;
        };

        if let Some(ref manager) = self.state_manager {
            if let Err(e) = manager
                .checkpoint(&SyncCursor::new(self.tenant, position))
                .await
            {
                tracing::warn!(error = %e, "Failed to persist sync cursor");
            }
        }

        if let Some(ref retention) = self.retention {
            match retention.store.purge(retention.retain_days, position).await {
                Ok(0) => {}
                Ok(deleted) => tracing::info!(
                    deleted,
                    retain_days = retention.retain_days,
                    "Purged processed change events"
                ),
                Err(e) => tracing::warn!(error = %e, "Change log purge failed"),
            }
        }
    }

    /// Runs until `shutdown` turns `true` or its sender is dropped
    ///
    /// The first run starts immediately.
    ///
    /// # Errors
    ///
    /// Only when the starting cursor cannot be established.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<SchedulerStats> {
        self.initialize().await?;

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            tenant_id = %self.tenant,
            interval_seconds = self.interval.as_secs(),
            "Sync scheduler started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Shutdown signal received, stopping sync scheduler");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }

        let stats = self.stats().await;
        tracing::info!(
            total_runs = stats.total_runs,
            successful_runs = stats.successful_runs,
            failed_runs = stats.failed_runs,
            total_changes_synced = stats.total_changes_synced,
            "Sync scheduler stopped"
        );
        Ok(stats)
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("tenant", &self.tenant)
            .field("interval", &self.interval)
            .field("persists_cursor", &self.state_manager.is_some())
            .field("retention_days", &self.retention.as_ref().map(|r| r.retain_days))
            .finish()
    }
}

