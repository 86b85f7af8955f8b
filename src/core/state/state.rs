//! In-memory sync state
//!
//! [`SyncState`] is owned by the orchestrator and records the outcome of
//! every run. It holds one cursor per tenant; a tenant's cursor is the
//! starting point of its next incremental sync.

use crate::core::sync::stats::{SyncOutcome, SyncStats};
use crate::domain::{ChangeId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Default number of runs kept in the history
pub const DEFAULT_HISTORY_SIZE: usize = 10;

/// Position of a tenant in the change log
///
/// All events with `change_id <= last_change_id` are accounted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub tenant_id: TenantId,
    pub last_change_id: ChangeId,
    pub updated_at: DateTime<Utc>,
}

impl SyncCursor {
    pub fn new(tenant_id: TenantId, last_change_id: ChangeId) -> Self {
        Self {
            tenant_id,
            last_change_id,
            updated_at: Utc::now(),
        }
    }

    /// Moves the cursor forward; never moves it back
    ///
    /// Returns `true` when the position changed.
    pub fn advance(&mut self, change_id: ChangeId) -> bool {
        if change_id > self.last_change_id {
            self.last_change_id = change_id;
            self.updated_at = Utc::now();
            true
        } else {
            false
        }
    }
}

/// Per-tenant cursors, counters and bounded run history
#[derive(Debug, Clone)]
pub struct SyncState {
    cursors: BTreeMap<TenantId, SyncCursor>,
    last_sync_time: Option<DateTime<Utc>>,
    last_sync_stats: Option<SyncStats>,
    total_syncs: u64,
    history: VecDeque<SyncOutcome>,
    history_size: usize,
}

impl SyncState {
    /// Creates an empty state keeping at most `history_size` runs
    pub fn new(history_size: usize) -> Self {
        let history_size = history_size.max(1);
        Self {
            cursors: BTreeMap::new(),
            last_sync_time: None,
            last_sync_stats: None,
            total_syncs: 0,
            history: VecDeque::with_capacity(history_size),
            history_size,
        }
    }

    pub fn cursor(&self, tenant_id: TenantId) -> Option<&SyncCursor> {
        self.cursors.get(&tenant_id)
    }

    /// Every held cursor, ordered by tenant
    pub fn cursors(&self) -> impl Iterator<Item = &SyncCursor> {
        self.cursors.values()
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.last_sync_time
    }

    pub fn last_sync_stats(&self) -> Option<&SyncStats> {
        self.last_sync_stats.as_ref()
    }

    pub fn total_syncs(&self) -> u64 {
        self.total_syncs
    }

    /// Replaces the cursor of `cursor.tenant_id`, e.g. with one loaded from
    /// the cursor store
    pub fn set_cursor(&mut self, cursor: SyncCursor) {
        self.cursors.insert(cursor.tenant_id, cursor);
    }

    /// Advances the tenant's cursor, creating it if needed
    pub fn advance_cursor(&mut self, tenant_id: TenantId, change_id: ChangeId) {
        self.cursors
            .entry(tenant_id)
            .and_modify(|cursor| {
                cursor.advance(change_id);
            })
            .or_insert_with(|| SyncCursor::new(tenant_id, change_id));
    }

    /// Cursor position for `tenant_id`, if one is held
    pub fn position(&self, tenant_id: TenantId) -> Option<ChangeId> {
        self.cursors.get(&tenant_id).map(|c| c.last_change_id)
    }

    /// Records a finished run
    ///
    /// The oldest entry is dropped once the history is full.
    pub fn record(&mut self, outcome: SyncOutcome) {
        self.total_syncs += 1;
        self.last_sync_time = Some(outcome.completed_at);
        if outcome.stats.is_some() {
            self.last_sync_stats = outcome.stats.clone();
        }
        if self.history.len() == self.history_size {
            self.history.pop_front();
        }
        self.history.push_back(outcome);
    }

    /// Most recent runs, newest first
    pub fn history(&self, limit: usize) -> Vec<SyncOutcome> {
        self.history.iter().rev().take(limit).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Clears cursors, counters and history
    pub fn reset(&mut self) {
        self.cursors.clear();
        self.last_sync_time = None;
        self.last_sync_stats = None;
        self.total_syncs = 0;
        self.history.clear();
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}
