//! PostgreSQL change log reader

use crate::adapters::database::traits::{ChangeReader, ReadRequest};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{PostgreSQLChangeEvent, CHANGE_EVENT_COLUMNS};
use crate::domain::ids::validate_identifier;
use crate::domain::{BridgeError, ChangeEvent, ChangeId, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Reads events from the change log table in `change_id` order
pub struct PostgreSQLChangeReader {
    client: Arc<PostgreSQLClient>,
    log_table: String,
}

impl PostgreSQLChangeReader {
    /// # Errors
    ///
    /// Returns a validation error if `log_table` is not a plain identifier.
    pub fn new(client: Arc<PostgreSQLClient>, log_table: impl Into<String>) -> Result<Self> {
        let log_table = log_table.into();
        validate_identifier(&log_table).map_err(BridgeError::Validation)?;
        Ok(Self { client, log_table })
    }

    pub fn log_table(&self) -> &str {
        &self.log_table
    }
}

/// Events numbered after `$1`; rows still awaiting their commit-time
/// `change_id` never match
fn read_query(log_table: &str) -> String {
    format!(
        "SELECT {CHANGE_EVENT_COLUMNS} FROM {log_table} \
         WHERE change_id > $1 AND ($2::text IS NULL OR table_name = $2) \
         ORDER BY change_id ASC \
         LIMIT $3"
    )
}

#[async_trait]
impl ChangeReader for PostgreSQLChangeReader {
    async fn read(&self, request: &ReadRequest) -> Result<Vec<ChangeEvent>> {
        let query = read_query(&self.log_table);
        let since = request.since.map(|id| id.get()).unwrap_or(0);
        let limit = request.limit as i64;

        let rows = self
            .client
            .query(&query, &[&since, &request.table, &limit])
            .await
            .map_err(|e| BridgeError::Read(e.to_string()))?;

        let events = rows
            .iter()
            .map(|row| PostgreSQLChangeEvent::from_row(row)?.to_domain())
            .collect::<Result<Vec<_>>>()
            .map_err(|e| match e {
                BridgeError::Read(msg) => BridgeError::Read(msg),
                other => BridgeError::Read(other.to_string()),
            })?;

        tracing::debug!(
            since,
            table = ?request.table,
            events = events.len(),
            "Read change events"
        );
        Ok(events)
    }

    async fn latest_id(&self) -> Result<ChangeId> {
        let rows = self
            .client
            .query(
                &format!(
                    "SELECT COALESCE(MAX(change_id), 0)::bigint FROM {}",
                    self.log_table
                ),
                &[],
            )
            .await
            .map_err(|e| BridgeError::Read(e.to_string()))?;

        let latest: i64 = rows
            .first()
            .map(|row| row.try_get(0))
            .transpose()
            .map_err(|e| BridgeError::Read(e.to_string()))?
            .unwrap_or(0);
        Ok(ChangeId::new(latest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_query_pages_by_change_id() {
        let query = read_query("data_change_log");
        assert!(query.starts_with("SELECT change_id, table_name, operation"));
        assert!(query.contains("FROM data_change_log WHERE change_id > $1"));
        assert!(query.contains("ORDER BY change_id ASC LIMIT $3"));
    }
}
