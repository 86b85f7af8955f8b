//! Sync orchestrator
//!
//! Drives full syncs (extract, map, load per entity) and incremental syncs
//! (replay of the change log) against the store traits. Only one sync runs
//! at a time; record-level failures are counted and skipped.

use crate::adapters::database::traits::{
    ChangeReader, LoadItem, ReadRequest, SourceStore, TargetStore,
};
use crate::config::SyncConfig;
use crate::core::mapping::{CompiledMappingSpec, MappingEngine};
use crate::core::state::{SyncCursor, SyncState, DEFAULT_HISTORY_SIZE};
use crate::core::sync::guard::SyncGuard;
use crate::core::sync::stats::{
    EntityStats, FullSyncStats, IncrementalStats, SyncKind, SyncOutcome, SyncStats, SyncStatus,
};
use crate::domain::{ChangeEvent, ChangeId, ResourceType, Result, TenantId};
use crate::{log_record_error, log_sync_complete, log_sync_start};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Tuning knobs of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Rows per extraction page and per load transaction
    pub batch_size: usize,

    /// Change events per reader call
    pub change_page_size: usize,

    /// Runs kept in the history
    pub history_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: 500,
            change_page_size: 100,
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            change_page_size: config.change_page_size,
            history_size: config.history_size,
        }
    }
}

/// Snapshot returned by [`SyncOrchestrator::sync_status`]
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusReport {
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_sync_stats: Option<SyncStats>,
    pub total_syncs: u64,
    /// Held cursors, one per tenant, ordered by tenant
    pub cursors: Vec<SyncCursor>,
}

/// Full and incremental sync controller
pub struct SyncOrchestrator {
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    reader: Arc<dyn ChangeReader>,
    engine: MappingEngine,
    settings: SyncSettings,
    guard: SyncGuard,
    state: Mutex<SyncState>,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        reader: Arc<dyn ChangeReader>,
        engine: MappingEngine,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            target,
            reader,
            engine,
            settings,
            guard: SyncGuard::new(),
            state: Mutex::new(SyncState::new(settings.history_size)),
        }
    }

    pub fn engine(&self) -> &MappingEngine {
        &self.engine
    }

    pub fn reader(&self) -> &Arc<dyn ChangeReader> {
        &self.reader
    }

    pub fn is_syncing(&self) -> bool {
        self.guard.is_running()
    }

    /// Runs a full sync and returns its per-entity stats
    ///
    /// Entities are processed in registry order, restricted to
    /// `resource_types` when non-empty. At most `limit` rows are extracted
    /// per entity.
    ///
    /// # Errors
    ///
    /// [`crate::domain::BridgeError::Concurrency`] while another sync runs;
    /// extraction failures abort the run. Mapping and load failures are only
    /// counted.
    pub async fn full_sync(
        &self,
        tenant: TenantId,
        limit: Option<usize>,
        resource_types: &[ResourceType],
    ) -> Result<FullSyncStats> {
        let _permit = self.guard.try_acquire()?;
        self.run_full_sync(tenant, limit, resource_types).await
    }

    /// Replays the change log after `since` (or the held cursor)
    ///
    /// # Errors
    ///
    /// [`crate::domain::BridgeError::Concurrency`] while another sync runs,
    /// [`crate::domain::BridgeError::Read`] when the change log cannot be
    /// read. Pages processed before a read failure stay accounted for in the
    /// cursor.
    pub async fn incremental_sync(
        &self,
        tenant: TenantId,
        since: Option<ChangeId>,
    ) -> Result<IncrementalStats> {
        let _permit = self.guard.try_acquire()?;
        let since = match since {
            Some(id) => Some(id),
            None => self.state.lock().await.position(tenant),
        };
        self.run_incremental_sync(tenant, since).await
    }

    /// Full sync entry point producing a [`SyncOutcome`]
    ///
    /// Run failures become a `failed` outcome; the outcome is recorded in
    /// the history either way.
    ///
    /// # Errors
    ///
    /// Only [`crate::domain::BridgeError::Concurrency`].
    pub async fn trigger_full_sync(
        &self,
        tenant: TenantId,
        limit: Option<usize>,
        resource_types: &[ResourceType],
    ) -> Result<SyncOutcome> {
        let _permit = self.guard.try_acquire()?;
        let started_at = Utc::now();
        let sync_id = new_sync_id(SyncKind::Full, tenant, started_at);
        let timer = Instant::now();
        log_sync_start!(SyncKind::Full.as_str(), sync_id, tenant);

        let outcome = match self.run_full_sync(tenant, limit, resource_types).await {
            Ok(stats) => {
                let duration = timer.elapsed();
                stats.log_summary(duration);
                log_sync_complete!(
                    SyncKind::Full.as_str(),
                    sync_id,
                    stats.total_loaded(),
                    stats.total_errors(),
                    duration
                );
                SyncOutcome {
                    status: SyncStatus::Completed,
                    message: format!(
                        "Full sync completed: {} of {} records loaded, {} errors",
                        stats.total_loaded(),
                        stats.total_extracted(),
                        stats.total_errors()
                    ),
                    sync_id,
                    kind: SyncKind::Full,
                    started_at,
                    completed_at: Utc::now(),
                    stats: Some(SyncStats::Full(stats)),
                }
            }
            Err(e) => failed_outcome(SyncKind::Full, sync_id, started_at, &e),
        };

        self.state.lock().await.record(outcome.clone());
        Ok(outcome)
    }

    /// Incremental sync entry point producing a [`SyncOutcome`]
    ///
    /// `last_sync_id` overrides the held cursor.
    ///
    /// # Errors
    ///
    /// Only [`crate::domain::BridgeError::Concurrency`].
    pub async fn trigger_incremental_sync(
        &self,
        tenant: TenantId,
        last_sync_id: Option<ChangeId>,
    ) -> Result<SyncOutcome> {
        let _permit = self.guard.try_acquire()?;
        let started_at = Utc::now();
        let sync_id = new_sync_id(SyncKind::Incremental, tenant, started_at);
        let timer = Instant::now();
        log_sync_start!(SyncKind::Incremental.as_str(), sync_id, tenant);

        let since = match last_sync_id {
            Some(id) => Some(id),
            None => self.state.lock().await.position(tenant),
        };

        let outcome = match self.run_incremental_sync(tenant, since).await {
            Ok(stats) => {
                let duration = timer.elapsed();
                stats.log_summary(duration);
                log_sync_complete!(
                    SyncKind::Incremental.as_str(),
                    sync_id,
                    stats.synced,
                    stats.errors,
                    duration
                );
                let message = if stats.total_changes == 0 {
                    "No changes to sync".to_string()
                } else {
                    format!(
                        "Incremental sync completed: {} of {} changes synced, {} errors",
                        stats.synced, stats.total_changes, stats.errors
                    )
                };
                SyncOutcome {
                    status: SyncStatus::Completed,
                    message,
                    sync_id,
                    kind: SyncKind::Incremental,
                    started_at,
                    completed_at: Utc::now(),
                    stats: Some(SyncStats::Incremental(stats)),
                }
            }
            Err(e) => failed_outcome(SyncKind::Incremental, sync_id, started_at, &e),
        };

        self.state.lock().await.record(outcome.clone());
        Ok(outcome)
    }

    /// Current state snapshot
    pub async fn sync_status(&self) -> SyncStatusReport {
        let state = self.state.lock().await;
        SyncStatusReport {
            is_syncing: self.guard.is_running(),
            last_sync_time: state.last_sync_time(),
            last_sync_stats: state.last_sync_stats().cloned(),
            total_syncs: state.total_syncs(),
            cursors: state.cursors().cloned().collect(),
        }
    }

    /// Most recent runs, newest first
    pub async fn sync_history(&self, limit: usize) -> Vec<SyncOutcome> {
        self.state.lock().await.history(limit)
    }

    /// Clears history, counters and the held cursor
    pub async fn reset_sync_state(&self) {
        self.state.lock().await.reset();
        tracing::info!("Sync state reset");
    }

    /// Held cursor position of `tenant`
    pub async fn cursor(&self, tenant: TenantId) -> Option<ChangeId> {
        self.state.lock().await.position(tenant)
    }

    /// Installs a cursor, e.g. one loaded from the cursor store
    pub async fn restore_cursor(&self, cursor: SyncCursor) {
        self.state.lock().await.set_cursor(cursor);
    }

    async fn run_full_sync(
        &self,
        tenant: TenantId,
        limit: Option<usize>,
        resource_types: &[ResourceType],
    ) -> Result<FullSyncStats> {
        let mut stats = FullSyncStats::default();

        if self.state.lock().await.position(tenant).is_none() {
            match self.reader.latest_id().await {
                Ok(latest) => {
                    self.state.lock().await.advance_cursor(tenant, latest);
                    stats.baseline_change_id = Some(latest);
                    tracing::info!(
                        tenant_id = %tenant,
                        baseline_change_id = %latest,
                        "Recorded change log baseline"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        tenant_id = %tenant,
                        error = %e,
                        "Could not read change log baseline; incremental sync will start from the beginning"
                    );
                }
            }
        }

        for spec in self.engine.registry().iter() {
            if !resource_types.is_empty() && !resource_types.contains(&spec.target_resource()) {
                continue;
            }
            let entity = self.sync_entity(tenant, spec, limit).await?;
            stats.entities.push(entity);
        }

        Ok(stats)
    }

    async fn sync_entity(
        &self,
        tenant: TenantId,
        spec: &CompiledMappingSpec,
        limit: Option<usize>,
    ) -> Result<EntityStats> {
        let table = spec.source_table().as_str();
        let key_column = spec.key_column();
        let mut entity = EntityStats::new(table, spec.target_resource());
        let mut after: Option<i64> = None;

        tracing::info!(entity = %table, resource_type = %spec.target_resource(), "Syncing entity");

        loop {
            let remaining = limit.map(|l| l.saturating_sub(entity.extracted));
            if remaining == Some(0) {
                break;
            }
            let page_size = remaining.map_or(self.settings.batch_size, |r| {
                r.min(self.settings.batch_size)
            });

            let records = self
                .source
                .extract(table, key_column, after, page_size)
                .await?;
            let fetched = records.len();
            entity.extracted += fetched;

            let previous_after = after;
            let mut items = Vec::with_capacity(fetched);
            for record in &records {
                let Some(source_id) = record.key(key_column) else {
                    entity.errors += 1;
                    log_record_error!(table, -1i64, format!("missing key column '{key_column}'"));
                    continue;
                };
                after = Some(after.map_or(source_id, |a| a.max(source_id)));

                match spec.materialize(record) {
                    Ok(document) => {
                        entity.transformed += 1;
                        items.push(LoadItem {
                            source_table: table.to_string(),
                            source_id,
                            document,
                        });
                    }
                    Err(e) => {
                        entity.errors += 1;
                        log_record_error!(table, source_id, e);
                    }
                }
            }

            if !items.is_empty() {
                let batch_len = items.len();
                match self.target.upsert_batch(tenant, items).await {
                    Ok(report) => {
                        entity.loaded += report.succeeded();
                        entity.errors += report.failures.len();
                        for failure in &report.failures {
                            log_record_error!(table, failure.source_id, failure.error);
                        }
                    }
                    Err(e) => {
                        entity.errors += batch_len;
                        tracing::warn!(
                            entity = %table,
                            records = batch_len,
                            error = %e,
                            "Batch load failed; batch rolled back"
                        );
                    }
                }
            }

            if fetched < page_size || after == previous_after {
                break;
            }
        }

        tracing::info!(
            entity = %table,
            extracted = entity.extracted,
            loaded = entity.loaded,
            errors = entity.errors,
            "Entity synced"
        );
        Ok(entity)
    }

    async fn run_incremental_sync(
        &self,
        tenant: TenantId,
        since: Option<ChangeId>,
    ) -> Result<IncrementalStats> {
        let mut stats = IncrementalStats::new(since.unwrap_or(ChangeId::new(0)));
        let mut position = since;

        loop {
            let request = ReadRequest::new()
                .since(position)
                .limit(self.settings.change_page_size);
            let events = self.reader.read(&request).await?;
            let page_len = events.len();

            for event in &events {
                if position.is_some_and(|p| event.change_id <= p) {
                    tracing::warn!(
                        change_id = %event.change_id,
                        "Change event out of order; ignoring"
                    );
                    continue;
                }
                self.apply_change(tenant, event, &mut stats).await;
                position = Some(event.change_id);
            }

            if let Some(p) = position {
                self.state.lock().await.advance_cursor(tenant, p);
            }

            if page_len < request.limit {
                break;
            }
        }

        Ok(stats)
    }

    async fn apply_change(&self, tenant: TenantId, event: &ChangeEvent, stats: &mut IncrementalStats) {
        let table = event.table_name.as_str();
        stats.record_event(table, event.operation, event.change_id);

        let Some(spec) = self.engine.spec_for(table) else {
            stats.skipped += 1;
            tracing::debug!(
                table = %table,
                change_id = %event.change_id,
                "No mapping for table; change skipped"
            );
            return;
        };

        if event.is_delete() {
            match self.target.delete(tenant, table, event.record_id).await {
                Ok(existed) => {
                    stats.synced += 1;
                    tracing::debug!(
                        table = %table,
                        record_id = event.record_id,
                        existed,
                        "Deleted target document"
                    );
                }
                Err(e) => {
                    stats.errors += 1;
                    log_record_error!(table, event.record_id, e);
                }
            }
            return;
        }

        let record = match self
            .source
            .fetch_by_id(table, spec.key_column(), event.record_id)
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                stats.not_found += 1;
                tracing::info!(
                    table = %table,
                    record_id = event.record_id,
                    change_id = %event.change_id,
                    "Source record no longer exists"
                );
                return;
            }
            Err(e) => {
                stats.errors += 1;
                log_record_error!(table, event.record_id, e);
                return;
            }
        };

        let document = match spec.materialize(&record) {
            Ok(document) => document,
            Err(e) => {
                stats.errors += 1;
                log_record_error!(table, event.record_id, e);
                return;
            }
        };

        let item = LoadItem {
            source_table: table.to_string(),
            source_id: event.record_id,
            document,
        };
        match self.target.upsert_batch(tenant, vec![item]).await {
            Ok(report) if report.failures.is_empty() => stats.synced += 1,
            Ok(report) => {
                stats.errors += 1;
                for failure in &report.failures {
                    log_record_error!(table, failure.source_id, failure.error);
                }
            }
            Err(e) => {
                stats.errors += 1;
                log_record_error!(table, event.record_id, e);
            }
        }
    }
}

fn failed_outcome(
    kind: SyncKind,
    sync_id: String,
    started_at: DateTime<Utc>,
    error: &crate::domain::BridgeError,
) -> SyncOutcome {
    tracing::error!(kind = kind.as_str(), sync_id = %sync_id, error = %error, "Sync failed");
    SyncOutcome {
        status: SyncStatus::Failed,
        message: format!("{} sync failed: {error}", capitalize(kind.as_str())),
        sync_id,
        kind,
        started_at,
        completed_at: Utc::now(),
        stats: None,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `{kind}_{tenant}_{timestamp}_{suffix}`, e.g. `full_1_20250301T101500_3f2a9c1d`
fn new_sync_id(kind: SyncKind, tenant: TenantId, started_at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}_{}",
        kind.as_str(),
        tenant,
        started_at.format("%Y%m%dT%H%M%S"),
        &suffix[..8]
    )
}
