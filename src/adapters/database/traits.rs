//! Store abstraction traits
//!
//! The sync core talks to its collaborators only through these traits:
//!
//! - [`SourceStore`] reads rows of the mapped source tables
//! - [`TargetStore`] upserts and deletes target documents
//! - [`ChangeReader`] reads the change log
//! - [`CursorStore`] persists the incremental cursor per tenant
//!
//! PostgreSQL implementations live in [`crate::adapters::postgresql`];
//! integration tests provide in-memory ones.

use crate::core::state::SyncCursor;
use crate::domain::{ChangeEvent, ChangeId, Result, SourceRecord, TargetDocument, TenantId};
use async_trait::async_trait;

/// Default number of change events per read
pub const DEFAULT_READ_LIMIT: usize = 100;

/// Upper bound on change events per read
pub const MAX_READ_LIMIT: usize = 1000;

/// Parameters of a change log read
///
/// ```rust
/// use fhir_bridge::adapters::database::ReadRequest;
/// use fhir_bridge::domain::ChangeId;
///
/// let request = ReadRequest::new()
///     .since(ChangeId::new(40))
///     .table("patients")
///     .limit(5_000);
/// assert_eq!(request.limit, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    /// Only events with `change_id > since` are returned
    pub since: Option<ChangeId>,

    /// Restrict to one source table
    pub table: Option<String>,

    /// Maximum number of events, always within `1..=MAX_READ_LIMIT`
    pub limit: usize,
}

impl ReadRequest {
    pub fn new() -> Self {
        Self {
            since: None,
            table: None,
            limit: DEFAULT_READ_LIMIT,
        }
    }

    pub fn since(mut self, since: impl Into<Option<ChangeId>>) -> Self {
        self.since = since.into();
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Sets the page size, clamped into `1..=MAX_READ_LIMIT`
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, MAX_READ_LIMIT);
        self
    }
}

impl Default for ReadRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// One document to upsert, keyed by `(tenant, source_table, source_id)`
#[derive(Debug, Clone)]
pub struct LoadItem {
    pub source_table: String,
    pub source_id: i64,
    pub document: TargetDocument,
}

/// A record that failed inside an otherwise committed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub source_id: i64,
    pub error: String,
}

/// Outcome of a batch upsert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Documents inserted or rewritten
    pub loaded: usize,

    /// Documents whose content hash matched the stored one
    pub unchanged: usize,

    /// Per-record failures; the rest of the batch is committed
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// Records accounted for as successfully loaded
    pub fn succeeded(&self) -> usize {
        self.loaded + self.unchanged
    }
}

/// Read access to the source tables
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Reads up to `limit` rows with `key_column > after`, ordered by key
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    async fn extract(
        &self,
        table: &str,
        key_column: &str,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<SourceRecord>>;

    /// Reads the current row with `key_column = id`
    async fn fetch_by_id(
        &self,
        table: &str,
        key_column: &str,
        id: i64,
    ) -> Result<Option<SourceRecord>>;

    /// Number of rows in `table`
    async fn count(&self, table: &str) -> Result<u64>;
}

/// Write access to the target document store
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Creates the target tables if they don't exist
    async fn ensure_schema(&self) -> Result<()>;

    /// Upserts a batch in one transaction
    ///
    /// A failing record is rolled back alone and reported in
    /// [`LoadReport::failures`].
    ///
    /// # Errors
    ///
    /// Returns an error when the batch transaction itself cannot be opened or
    /// committed; nothing of the batch is persisted in that case.
    async fn upsert_batch(&self, tenant: TenantId, items: Vec<LoadItem>) -> Result<LoadReport>;

    /// Removes a document; `false` when it did not exist
    async fn delete(&self, tenant: TenantId, source_table: &str, source_id: i64) -> Result<bool>;

    /// Number of stored documents, optionally for one source table
    async fn count(&self, tenant: TenantId, source_table: Option<&str>) -> Result<u64>;
}

/// Ordered, stateless access to the change log
#[async_trait]
pub trait ChangeReader: Send + Sync {
    /// Events strictly ascending by `change_id`, all after `request.since`
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::BridgeError::Read`] on failure.
    async fn read(&self, request: &ReadRequest) -> Result<Vec<ChangeEvent>>;

    /// Highest `change_id` in the log, `0` when empty
    async fn latest_id(&self) -> Result<ChangeId>;
}

/// Durable storage of incremental cursors
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load_cursor(&self, tenant: TenantId) -> Result<Option<SyncCursor>>;

    async fn save_cursor(&self, cursor: &SyncCursor) -> Result<()>;
}

/// Compaction of the change log
#[async_trait]
pub trait ChangeLogRetention: Send + Sync {
    /// Deletes events older than `retain_days` with `change_id <= up_to`
    ///
    /// Returns the number of deleted events.
    async fn purge(&self, retain_days: u32, up_to: ChangeId) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_defaults() {
        let request = ReadRequest::default();
        assert_eq!(request.since, None);
        assert_eq!(request.table, None);
        assert_eq!(request.limit, DEFAULT_READ_LIMIT);
    }

    #[test]
    fn test_read_request_limit_is_clamped() {
        assert_eq!(ReadRequest::new().limit(0).limit, 1);
        assert_eq!(ReadRequest::new().limit(250).limit, 250);
        assert_eq!(ReadRequest::new().limit(MAX_READ_LIMIT + 1).limit, MAX_READ_LIMIT);
    }

    #[test]
    fn test_load_report_succeeded() {
        let report = LoadReport {
            loaded: 3,
            unchanged: 2,
            failures: vec![LoadFailure {
                source_id: 9,
                error: "value too long".to_string(),
            }],
        };
        assert_eq!(report.succeeded(), 5);
    }
}
