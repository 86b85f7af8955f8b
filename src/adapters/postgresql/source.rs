//! PostgreSQL source store
//!
//! Rows are read as `to_jsonb(row)` so any mapped table can be extracted
//! without a per-table row type.

use crate::adapters::database::traits::SourceStore;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::domain::ids::validate_identifier;
use crate::domain::{BridgeError, Result, SourceRecord};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_postgres::Row;

/// Reads mapped tables of the hospital database
pub struct PostgreSQLSourceStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLSourceStore {
    pub fn new(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

fn checked(table: &str, key_column: &str) -> Result<()> {
    validate_identifier(table).map_err(BridgeError::Validation)?;
    validate_identifier(key_column).map_err(BridgeError::Validation)
}

/// Keyset page query; the key column is compared uncast so its index applies
fn extract_query(table: &str, key_column: &str, resume: bool) -> String {
    let filter = if resume {
        format!("WHERE t.{key_column} > $2::bigint ")
    } else {
        String::new()
    };
    format!("SELECT to_jsonb(t) FROM {table} t {filter}ORDER BY t.{key_column} LIMIT $1")
}

fn fetch_query(table: &str, key_column: &str) -> String {
    format!("SELECT to_jsonb(t) FROM {table} t WHERE t.{key_column} = $1::bigint LIMIT 1")
}

fn record_from_row(row: &Row) -> Result<SourceRecord> {
    let value: serde_json::Value = row.try_get(0)?;
    SourceRecord::from_json(value).map_err(BridgeError::Serialization)
}

#[async_trait]
impl SourceStore for PostgreSQLSourceStore {
    async fn extract(
        &self,
        table: &str,
        key_column: &str,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<SourceRecord>> {
        checked(table, key_column)?;

        let limit = limit as i64;
        let rows = match after {
            Some(after) => {
                let query = extract_query(table, key_column, true);
                self.client.query(&query, &[&limit, &after]).await?
            }
            None => {
                let query = extract_query(table, key_column, false);
                self.client.query(&query, &[&limit]).await?
            }
        };

        tracing::debug!(
            table = %table,
            after = ?after,
            rows = rows.len(),
            "Extracted source rows"
        );
        rows.iter().map(record_from_row).collect()
    }

    async fn fetch_by_id(
        &self,
        table: &str,
        key_column: &str,
        id: i64,
    ) -> Result<Option<SourceRecord>> {
        checked(table, key_column)?;

        let rows = self
            .client
            .query(&fetch_query(table, key_column), &[&id])
            .await?;
        rows.first().map(record_from_row).transpose()
    }

    async fn count(&self, table: &str) -> Result<u64> {
        validate_identifier(table).map_err(BridgeError::Validation)?;
        let rows = self
            .client
            .query(&format!("SELECT COUNT(*) FROM {table}"), &[])
            .await?;
        let count: i64 = rows
            .first()
            .map(|row| row.try_get(0))
            .transpose()?
            .unwrap_or(0);
        Ok(count as u64)
    }
}
