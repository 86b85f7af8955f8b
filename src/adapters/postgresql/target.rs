//! PostgreSQL target store
//!
//! Documents live in `fhir_resources`, keyed by
//! `(tenant_id, source_table, source_id)`. Cursors live in `sync_cursors`.
//! Both tables are created by `migrations/001_target_schema.sql`.

use crate::adapters::database::traits::{
    CursorStore, LoadFailure, LoadItem, LoadReport, TargetStore,
};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::PostgreSQLCursor;
use crate::core::state::SyncCursor;
use crate::domain::{BridgeError, Result, TenantId};
use async_trait::async_trait;
use std::sync::Arc;

const UPSERT_RESOURCE: &str = r#"
    INSERT INTO fhir_resources (
        tenant_id, source_table, source_id, resource_type, resource, content_hash
    )
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (tenant_id, source_table, source_id) DO UPDATE SET
        resource_type = EXCLUDED.resource_type,
        resource = EXCLUDED.resource,
        content_hash = EXCLUDED.content_hash,
        updated_at = now()
    WHERE fhir_resources.content_hash IS DISTINCT FROM EXCLUDED.content_hash
"#;

const UPSERT_CURSOR: &str = r#"
    INSERT INTO sync_cursors (tenant_id, last_change_id, updated_at)
    VALUES ($1, $2, $3)
    ON CONFLICT (tenant_id) DO UPDATE SET
        last_change_id = EXCLUDED.last_change_id,
        updated_at = EXCLUDED.updated_at
"#;

/// Writes FHIR documents and cursors to the target database
pub struct PostgreSQLTargetStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLTargetStore {
    pub fn new(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl TargetStore for PostgreSQLTargetStore {
    async fn ensure_schema(&self) -> Result<()> {
        let migration_sql = include_str!("../../../migrations/001_target_schema.sql");
        self.client.batch_execute(migration_sql).await.map_err(|e| {
            BridgeError::Database(format!("Failed to apply target schema: {e}"))
        })?;

        tracing::info!("Target schema initialized successfully");
        Ok(())
    }

    async fn upsert_batch(&self, tenant: TenantId, items: Vec<LoadItem>) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        if items.is_empty() {
            return Ok(report);
        }

        let mut connection = self.client.get_connection().await?;
        self.client.apply_statement_timeout(&connection).await?;
        let tx = connection
            .transaction()
            .await
            .map_err(|e| BridgeError::Load(format!("Failed to begin batch transaction: {e}")))?;

        let tenant_id = tenant.get();
        for item in &items {
            let resource_type = item.document.resource_type().as_str();
            let resource = item.document.to_value();
            let content_hash = item.document.content_hash();

            tx.batch_execute("SAVEPOINT load_record")
                .await
                .map_err(|e| BridgeError::Load(format!("Failed to create savepoint: {e}")))?;

            let result = tx
                .execute(
                    UPSERT_RESOURCE,
                    &[
                        &tenant_id,
                        &item.source_table,
                        &item.source_id,
                        &resource_type,
                        &resource,
                        &content_hash,
                    ],
                )
                .await;

            match result {
                Ok(affected) => {
                    tx.batch_execute("RELEASE SAVEPOINT load_record")
                        .await
                        .map_err(|e| {
                            BridgeError::Load(format!("Failed to release savepoint: {e}"))
                        })?;
                    if affected == 0 {
                        report.unchanged += 1;
                    } else {
                        report.loaded += 1;
                    }
                }
                Err(e) => {
                    tx.batch_execute("ROLLBACK TO SAVEPOINT load_record")
                        .await
                        .map_err(|e| {
                            BridgeError::Load(format!("Failed to roll back savepoint: {e}"))
                        })?;
                    report.failures.push(LoadFailure {
                        source_id: item.source_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| BridgeError::Load(format!("Failed to commit batch: {e}")))?;

        tracing::debug!(
            tenant_id = tenant_id,
            loaded = report.loaded,
            unchanged = report.unchanged,
            failed = report.failures.len(),
            "Batch committed"
        );
        Ok(report)
    }

    async fn delete(&self, tenant: TenantId, source_table: &str, source_id: i64) -> Result<bool> {
        let affected = self
            .client
            .execute(
                "DELETE FROM fhir_resources \
                 WHERE tenant_id = $1 AND source_table = $2 AND source_id = $3",
                &[&tenant.get(), &source_table, &source_id],
            )
            .await
            .map_err(|e| BridgeError::Load(format!("Failed to delete document: {e}")))?;
        Ok(affected > 0)
    }

    async fn count(&self, tenant: TenantId, source_table: Option<&str>) -> Result<u64> {
        let rows = self
            .client
            .query(
                "SELECT COUNT(*) FROM fhir_resources \
                 WHERE tenant_id = $1 AND ($2::text IS NULL OR source_table = $2)",
                &[&tenant.get(), &source_table],
            )
            .await?;
        let count: i64 = rows
            .first()
            .map(|row| row.try_get(0))
            .transpose()?
            .unwrap_or(0);
        Ok(count as u64)
    }
}

#[async_trait]
impl CursorStore for PostgreSQLTargetStore {
    async fn load_cursor(&self, tenant: TenantId) -> Result<Option<SyncCursor>> {
        let rows = self
            .client
            .query(
                "SELECT tenant_id, last_change_id, updated_at FROM sync_cursors WHERE tenant_id = $1",
                &[&tenant.get()],
            )
            .await
            .map_err(|e| BridgeError::State(format!("Failed to load cursor: {e}")))?;

        match rows.first() {
            Some(row) => Ok(Some(PostgreSQLCursor::from_row(row)?.to_domain()?)),
            None => Ok(None),
        }
    }

    async fn save_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        let row = PostgreSQLCursor::from_domain(cursor);
        self.client
            .execute(
                UPSERT_CURSOR,
                &[&row.tenant_id, &row.last_change_id, &row.updated_at],
            )
            .await
            .map_err(|e| BridgeError::State(format!("Failed to save cursor: {e}")))?;
        Ok(())
    }
}
