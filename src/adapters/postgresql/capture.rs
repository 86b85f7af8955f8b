//! Trigger-based change capture
//!
//! Installs the change log table and one AFTER INSERT/UPDATE/DELETE row
//! trigger per captured table. The trigger appends exactly one event inside
//! the mutating transaction and sends a `pg_notify` on the configured
//! channel. All DDL is idempotent.
//!
//! Events are inserted with a NULL `change_id`. A deferred constraint trigger
//! on the log numbers them while the transaction commits, under a
//! transaction-scoped advisory lock, so `change_id` order is commit order: a
//! reader that has seen id `n` can never later see a smaller id appear.

use crate::adapters::database::traits::ChangeLogRetention;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::ChangeStatistic;
use crate::domain::ids::validate_identifier;
use crate::domain::{BridgeError, ChangeId, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// PostgreSQL truncates identifiers longer than this many bytes
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Rejects derived names PostgreSQL would silently truncate
fn check_derived_name(name: &str) -> Result<()> {
    if name.len() > MAX_IDENTIFIER_BYTES {
        return Err(BridgeError::CaptureInstall(format!(
            "Derived name '{name}' is longer than {MAX_IDENTIFIER_BYTES} bytes"
        )));
    }
    Ok(())
}

/// A table to capture and the integer key column identifying its rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedTable {
    pub table: String,
    pub key_column: String,
}

impl CapturedTable {
    pub fn new(table: impl Into<String>, key_column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_column: key_column.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        validate_identifier(&self.table).map_err(BridgeError::CaptureInstall)?;
        validate_identifier(&self.key_column).map_err(BridgeError::CaptureInstall)?;
        check_derived_name(&self.function_name())?;
        check_derived_name(&self.trigger_name())
    }

    fn function_name(&self) -> String {
        format!("fhir_bridge_log_{}_changes", self.table)
    }

    fn trigger_name(&self) -> String {
        format!("{}_change_trigger", self.table)
    }
}

/// Change log installer and maintenance operations
pub struct ChangeCapture {
    client: Arc<PostgreSQLClient>,
    log_table: String,
    notify_channel: String,
}

impl ChangeCapture {
    /// # Errors
    ///
    /// Returns [`BridgeError::CaptureInstall`] if a name is not a plain
    /// identifier.
    pub fn new(
        client: Arc<PostgreSQLClient>,
        log_table: impl Into<String>,
        notify_channel: impl Into<String>,
    ) -> Result<Self> {
        let log_table = log_table.into();
        let notify_channel = notify_channel.into();
        validate_identifier(&log_table).map_err(BridgeError::CaptureInstall)?;
        validate_identifier(&notify_channel).map_err(BridgeError::CaptureInstall)?;
        for name in log_derived_names(&log_table) {
            check_derived_name(&name)?;
        }
        Ok(Self {
            client,
            log_table,
            notify_channel,
        })
    }

    pub fn log_table(&self) -> &str {
        &self.log_table
    }

    /// Creates the change log table and its indexes
    pub async fn install_log(&self) -> Result<()> {
        self.client
            .batch_execute(&log_table_ddl(&self.log_table))
            .await
            .map_err(|e| BridgeError::CaptureInstall(format!("change log table: {e}")))?;

        tracing::info!(log_table = %self.log_table, "Change log table created/verified");
        Ok(())
    }

    /// (Re)installs the trigger function and trigger of one table
    pub async fn install_trigger(&self, table: &CapturedTable) -> Result<()> {
        table.validate()?;
        if table.table == self.log_table {
            return Err(BridgeError::CaptureInstall(format!(
                "Refusing to capture the change log table '{}'",
                table.table
            )));
        }

        let ddl = format!(
            "{}\nDROP TRIGGER IF EXISTS {trigger} ON {table};\n\
             CREATE TRIGGER {trigger}\n\
             AFTER INSERT OR UPDATE OR DELETE ON {table}\n\
             FOR EACH ROW EXECUTE FUNCTION {function}();",
            trigger_function_ddl(table, &self.log_table, &self.notify_channel),
            trigger = table.trigger_name(),
            table = table.table,
            function = table.function_name(),
        );

        self.client.batch_execute(&ddl).await.map_err(|e| {
            BridgeError::CaptureInstall(format!("trigger on '{}': {e}", table.table))
        })?;

        tracing::info!(
            table = %table.table,
            key_column = %table.key_column,
            "Change trigger installed"
        );
        Ok(())
    }

    /// Installs the log and every trigger; stops at the first failure
    pub async fn install_all(&self, tables: &[CapturedTable]) -> Result<()> {
        self.install_log().await?;
        for table in tables {
            self.install_trigger(table).await?;
        }
        tracing::info!(tables = tables.len(), "Change capture installed");
        Ok(())
    }

    /// Whether the capture trigger exists on `table`
    pub async fn is_capture_enabled(&self, table: &str) -> Result<bool> {
        let trigger = CapturedTable::new(table, "").trigger_name();
        let rows = self
            .client
            .query(
                "SELECT 1 FROM information_schema.triggers \
                 WHERE event_object_table = $1 AND trigger_name = $2 LIMIT 1",
                &[&table, &trigger],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Event counts grouped by table and operation
    pub async fn change_statistics(&self) -> Result<Vec<ChangeStatistic>> {
        let query = format!(
            "SELECT table_name, operation, COUNT(*)::bigint AS count, \
                    MAX(change_id)::bigint AS latest_change_id, \
                    MAX(changed_at) AS last_changed_at \
             FROM {} GROUP BY table_name, operation ORDER BY table_name, operation",
            self.log_table
        );
        let rows = self
            .client
            .query(&query, &[])
            .await
            .map_err(|e| BridgeError::Read(e.to_string()))?;
        rows.iter().map(ChangeStatistic::from_row).collect()
    }
}

#[async_trait]
impl ChangeLogRetention for ChangeCapture {
    async fn purge(&self, retain_days: u32, up_to: ChangeId) -> Result<u64> {
        let query = format!(
            "DELETE FROM {} \
             WHERE changed_at < now() - make_interval(days => $1) AND change_id <= $2",
            self.log_table
        );
        let days = retain_days as i32;
        self.client.execute(&query, &[&days, &up_to.get()]).await
    }
}

/// Names created next to the log table
fn log_derived_names(log_table: &str) -> [String; 5] {
    [
        format!("{log_table}_change_id_seq"),
        format!("{log_table}_number_change"),
        format!("{log_table}_commit_order"),
        format!("idx_{log_table}_table"),
        format!("idx_{log_table}_changed_at"),
    ]
}

fn log_table_ddl(log_table: &str) -> String {
    let [sequence, function, trigger, table_index, changed_at_index] =
        log_derived_names(log_table);
    format!(
        "CREATE SEQUENCE IF NOT EXISTS {sequence};
        CREATE TABLE IF NOT EXISTS {log_table} (
            event_id BIGSERIAL PRIMARY KEY,
            change_id BIGINT UNIQUE,
            table_name VARCHAR(100) NOT NULL,
            operation VARCHAR(10) NOT NULL,
            record_id BIGINT NOT NULL,
            old_data JSONB,
            new_data JSONB,
            changed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            actor TEXT,
            change_metadata JSONB
        );
        CREATE INDEX IF NOT EXISTS {table_index} ON {log_table} (table_name);
        CREATE INDEX IF NOT EXISTS {changed_at_index} ON {log_table} (changed_at);

        CREATE OR REPLACE FUNCTION {function}() RETURNS TRIGGER AS $$
        BEGIN
            PERFORM pg_advisory_xact_lock(hashtext('{log_table}'));
            UPDATE {log_table} SET change_id = nextval('{sequence}')
            WHERE event_id = NEW.event_id;
            RETURN NULL;
        END;
        $$ LANGUAGE plpgsql;

        DROP TRIGGER IF EXISTS {trigger} ON {log_table};
        CREATE CONSTRAINT TRIGGER {trigger}
        AFTER INSERT ON {log_table}
        DEFERRABLE INITIALLY DEFERRED
        FOR EACH ROW EXECUTE FUNCTION {function}();"
    )
}

fn trigger_function_ddl(table: &CapturedTable, log_table: &str, channel: &str) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {function}() RETURNS TRIGGER AS $$
        DECLARE
            record_id_value BIGINT;
            old_json JSONB;
            new_json JSONB;
        BEGIN
            IF TG_OP = 'DELETE' THEN
                record_id_value := OLD.{key}::bigint;
                old_json := to_jsonb(OLD);
                new_json := NULL;
            ELSIF TG_OP = 'UPDATE' THEN
                record_id_value := NEW.{key}::bigint;
                old_json := to_jsonb(OLD);
                new_json := to_jsonb(NEW);
            ELSE
                record_id_value := NEW.{key}::bigint;
                old_json := NULL;
                new_json := to_jsonb(NEW);
            END IF;

            INSERT INTO {log_table} (table_name, operation, record_id, old_data, new_data, actor)
            VALUES (TG_TABLE_NAME, TG_OP, record_id_value, old_json, new_json, current_user);

            PERFORM pg_notify('{channel}', json_build_object(
                'table', TG_TABLE_NAME,
                'operation', TG_OP,
                'record_id', record_id_value,
                'timestamp', now()
            )::text);

            IF TG_OP = 'DELETE' THEN
                RETURN OLD;
            END IF;
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql;",
        function = table.function_name(),
        key = table.key_column,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_function_uses_configured_key() {
        let table = CapturedTable::new("encounters", "encounter_id");
        let ddl = trigger_function_ddl(&table, "data_change_log", "data_changes");

        assert!(ddl.contains("CREATE OR REPLACE FUNCTION fhir_bridge_log_encounters_changes()"));
        assert!(ddl.contains("OLD.encounter_id::bigint"));
        assert!(ddl.contains("NEW.encounter_id::bigint"));
        assert!(!ddl.contains("patient_id"));
        assert!(ddl.contains("INSERT INTO data_change_log"));
        assert!(ddl.contains("pg_notify('data_changes'"));
    }

    #[test]
    fn test_log_table_ddl_is_idempotent() {
        let ddl = log_table_ddl("data_change_log");
        assert!(ddl.contains("CREATE SEQUENCE IF NOT EXISTS data_change_log_change_id_seq"));
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS data_change_log"));
        assert_eq!(ddl.matches("CREATE INDEX IF NOT EXISTS").count(), 2);
        assert!(ddl.contains("CREATE OR REPLACE FUNCTION data_change_log_number_change()"));
        assert!(ddl.contains("DROP TRIGGER IF EXISTS data_change_log_commit_order"));
    }

    #[test]
    fn test_change_ids_are_numbered_at_commit() {
        let ddl = log_table_ddl("data_change_log");

        assert!(ddl.contains("event_id BIGSERIAL PRIMARY KEY"));
        assert!(ddl.contains("change_id BIGINT UNIQUE,"));
        assert!(!ddl.contains("change_id BIGSERIAL"));

        let trigger = &ddl[ddl.find("CREATE CONSTRAINT TRIGGER").unwrap()..];
        assert!(trigger.contains("AFTER INSERT ON data_change_log"));
        assert!(trigger.contains("DEFERRABLE INITIALLY DEFERRED"));

        let lock = ddl.find("pg_advisory_xact_lock").unwrap();
        let numbering = ddl.find("nextval('data_change_log_change_id_seq')").unwrap();
        assert!(lock < numbering);
    }

    #[test]
    fn test_capture_trigger_leaves_change_id_to_commit() {
        let table = CapturedTable::new("patients", "patient_id");
        let ddl = trigger_function_ddl(&table, "data_change_log", "data_changes");
        let insert = &ddl[ddl.find("INSERT INTO").unwrap()..ddl.find("VALUES").unwrap()];
        assert!(!insert.contains("change_id"));
    }

    #[test]
    fn test_captured_table_names() {
        let table = CapturedTable::new("lab_results", "lab_id");
        assert_eq!(table.trigger_name(), "lab_results_change_trigger");
        assert!(table.validate().is_ok());

        let bad = CapturedTable::new("lab_results", "lab_id; DROP TABLE patients");
        assert!(matches!(bad.validate(), Err(BridgeError::CaptureInstall(_))));
    }

    #[test]
    fn test_derived_names_must_fit_identifier_limit() {
        // "fhir_bridge_log_" + "_changes" adds 24 bytes
        let longest = "t".repeat(MAX_IDENTIFIER_BYTES - 24);
        let table = CapturedTable::new(longest.clone(), "id");
        assert_eq!(table.function_name().len(), MAX_IDENTIFIER_BYTES);
        assert!(table.validate().is_ok());

        let long = CapturedTable::new(format!("{longest}t"), "id");
        let err = long.validate().unwrap_err();
        assert!(matches!(err, BridgeError::CaptureInstall(ref msg) if msg.contains("63 bytes")));

        // tables sharing a long prefix would otherwise collide after truncation
        let a = CapturedTable::new(format!("{}_a", "x".repeat(60)), "id");
        let b = CapturedTable::new(format!("{}_b", "x".repeat(60)), "id");
        assert!(a.validate().is_err());
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_log_table_derived_names_are_checked() {
        let overhead = log_derived_names("").iter().map(String::len).max().unwrap();
        let fits = "l".repeat(MAX_IDENTIFIER_BYTES - overhead);
        assert!(log_derived_names(&fits)
            .iter()
            .all(|name| check_derived_name(name).is_ok()));

        let too_long = format!("{fits}l");
        assert!(log_derived_names(&too_long)
            .iter()
            .any(|name| check_derived_name(name).is_err()));
    }
}
