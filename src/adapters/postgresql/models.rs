//! Row models of the PostgreSQL stores
//!
//! Conversion between `tokio_postgres::Row`s and domain types.

use crate::core::state::SyncCursor;
use crate::domain::{BridgeError, ChangeEvent, ChangeId, Operation, Result, TenantId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use tokio_postgres::Row;

/// Columns selected from the change log, in this order
pub const CHANGE_EVENT_COLUMNS: &str =
    "change_id, table_name, operation, record_id, old_data, new_data, changed_at, actor";

/// Change log row
#[derive(Debug, Clone)]
pub struct PostgreSQLChangeEvent {
    pub change_id: i64,
    pub table_name: String,
    pub operation: String,
    pub record_id: i64,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
    pub actor: Option<String>,
}

impl PostgreSQLChangeEvent {
    /// Reads a row selected with [`CHANGE_EVENT_COLUMNS`]
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            change_id: row.try_get("change_id")?,
            table_name: row.try_get("table_name")?,
            operation: row.try_get("operation")?,
            record_id: row.try_get("record_id")?,
            old_data: row.try_get("old_data")?,
            new_data: row.try_get("new_data")?,
            changed_at: row.try_get("changed_at")?,
            actor: row.try_get("actor")?,
        })
    }

    /// Convert to domain ChangeEvent
    pub fn to_domain(self) -> Result<ChangeEvent> {
        let operation = Operation::from_str(&self.operation).map_err(BridgeError::Read)?;
        Ok(ChangeEvent {
            change_id: ChangeId::new(self.change_id),
            table_name: self.table_name,
            operation,
            record_id: self.record_id,
            old_data: self.old_data,
            new_data: self.new_data,
            changed_at: self.changed_at,
            actor: self.actor,
        })
    }
}

/// Row of the `sync_cursors` table
#[derive(Debug, Clone)]
pub struct PostgreSQLCursor {
    pub tenant_id: i32,
    pub last_change_id: i64,
    pub updated_at: DateTime<Utc>,
}

impl PostgreSQLCursor {
    /// Convert from domain SyncCursor
    pub fn from_domain(cursor: &SyncCursor) -> Self {
        Self {
            tenant_id: cursor.tenant_id.get(),
            last_change_id: cursor.last_change_id.get(),
            updated_at: cursor.updated_at,
        }
    }

    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            tenant_id: row.try_get("tenant_id")?,
            last_change_id: row.try_get("last_change_id")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Convert to domain SyncCursor
    pub fn to_domain(&self) -> Result<SyncCursor> {
        let tenant_id = TenantId::new(self.tenant_id).map_err(BridgeError::State)?;
        Ok(SyncCursor {
            tenant_id,
            last_change_id: ChangeId::new(self.last_change_id),
            updated_at: self.updated_at,
        })
    }
}

/// Event count of one table and operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeStatistic {
    pub table_name: String,
    pub operation: String,
    pub count: i64,
    pub latest_change_id: i64,
    pub last_changed_at: Option<DateTime<Utc>>,
}

impl ChangeStatistic {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            table_name: row.try_get("table_name")?,
            operation: row.try_get("operation")?,
            count: row.try_get("count")?,
            latest_change_id: row.try_get("latest_change_id")?,
            last_changed_at: row.try_get("last_changed_at")?,
        })
    }
}
