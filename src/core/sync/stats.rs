//! Sync statistics and outcomes

use crate::domain::{ChangeId, Operation, ResourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Counters of one entity (source table) in a full sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    /// Source table
    pub entity: String,

    /// Target resource type
    pub resource_type: ResourceType,

    /// Rows read from the source
    pub extracted: usize,

    /// Rows mapped to documents
    pub transformed: usize,

    /// Documents written or already current
    pub loaded: usize,

    /// Rows that failed mapping or loading
    pub errors: usize,
}

impl EntityStats {
    pub fn new(entity: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            entity: entity.into(),
            resource_type,
            extracted: 0,
            transformed: 0,
            loaded: 0,
            errors: 0,
        }
    }
}

/// Per-entity results of a full sync, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullSyncStats {
    pub entities: Vec<EntityStats>,

    /// Change log position recorded as the incremental starting point
    pub baseline_change_id: Option<ChangeId>,
}

impl FullSyncStats {
    /// Stats of one entity
    pub fn entity(&self, entity: &str) -> Option<&EntityStats> {
        self.entities.iter().find(|e| e.entity == entity)
    }

    pub fn total_extracted(&self) -> usize {
        self.entities.iter().map(|e| e.extracted).sum()
    }

    pub fn total_loaded(&self) -> usize {
        self.entities.iter().map(|e| e.loaded).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.entities.iter().map(|e| e.errors).sum()
    }

    /// Log a summary of the run
    pub fn log_summary(&self, duration: Duration) {
        for entity in &self.entities {
            tracing::info!(
                entity = %entity.entity,
                resource_type = %entity.resource_type,
                extracted = entity.extracted,
                transformed = entity.transformed,
                loaded = entity.loaded,
                errors = entity.errors,
                "Entity sync summary"
            );
        }
        tracing::info!(
            extracted = self.total_extracted(),
            loaded = self.total_loaded(),
            errors = self.total_errors(),
            duration_ms = duration.as_millis() as u64,
            "Full sync summary"
        );
    }
}

/// Result counters of an incremental sync
///
/// Every event read is counted exactly once in `synced`, `errors`,
/// `not_found` or `skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalStats {
    pub total_changes: usize,
    pub synced: usize,
    pub errors: usize,

    /// Changes whose row no longer existed at re-fetch time
    pub not_found: usize,

    /// Changes for tables without a mapping
    pub skipped: usize,

    pub by_table: BTreeMap<String, usize>,
    pub by_operation: BTreeMap<String, usize>,

    /// Cursor for the next call; equals the starting cursor when no events
    /// were read
    pub last_change_id: ChangeId,
}

impl IncrementalStats {
    pub fn new(since: ChangeId) -> Self {
        Self {
            total_changes: 0,
            synced: 0,
            errors: 0,
            not_found: 0,
            skipped: 0,
            by_table: BTreeMap::new(),
            by_operation: BTreeMap::new(),
            last_change_id: since,
        }
    }

    /// Counts an event toward the table and operation breakdowns
    pub fn record_event(&mut self, table: &str, operation: Operation, change_id: ChangeId) {
        self.total_changes += 1;
        *self.by_table.entry(table.to_string()).or_insert(0) += 1;
        *self
            .by_operation
            .entry(operation.as_str().to_string())
            .or_insert(0) += 1;
        if change_id > self.last_change_id {
            self.last_change_id = change_id;
        }
    }

    /// Whether every event is accounted for
    pub fn is_balanced(&self) -> bool {
        self.synced + self.errors + self.not_found + self.skipped == self.total_changes
    }

    pub fn log_summary(&self, duration: Duration) {
        tracing::info!(
            total_changes = self.total_changes,
            synced = self.synced,
            errors = self.errors,
            not_found = self.not_found,
            skipped = self.skipped,
            last_change_id = %self.last_change_id,
            duration_ms = duration.as_millis() as u64,
            "Incremental sync summary"
        );
    }
}

/// Kind of sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Full,
    Incremental,
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Full => "full",
            SyncKind::Incremental => "incremental",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final status of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Completed,
    Failed,
}

/// Statistics of either kind of run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SyncStats {
    Full(FullSyncStats),
    Incremental(IncrementalStats),
}

impl SyncStats {
    /// Records or changes that failed during the run
    pub fn error_count(&self) -> usize {
        match self {
            SyncStats::Full(stats) => stats.total_errors(),
            SyncStats::Incremental(stats) => stats.errors,
        }
    }
}

/// Result of a triggered sync, also kept in the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub sync_id: String,
    pub kind: SyncKind,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub stats: Option<SyncStats>,
}

impl SyncOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == SyncStatus::Completed
    }

    /// Completed but with record-level errors
    pub fn is_partial(&self) -> bool {
        self.is_completed()
            && self
                .stats
                .as_ref()
                .map(|s| s.error_count() > 0)
                .unwrap_or(false)
    }

    pub fn full_stats(&self) -> Option<&FullSyncStats> {
        match self.stats {
            Some(SyncStats::Full(ref stats)) => Some(stats),
            _ => None,
        }
    }

    pub fn incremental_stats(&self) -> Option<&IncrementalStats> {
        match self.stats {
            Some(SyncStats::Incremental(ref stats)) => Some(stats),
            _ => None,
        }
    }
}
