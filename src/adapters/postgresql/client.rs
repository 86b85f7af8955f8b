//! PostgreSQL client implementation
//!
//! A pooled connection to one database. Both the source (hospital) and the
//! target (FHIR) stores are reached through this client.

use crate::config::schema::PostgreSQLConfig;
use crate::config::redact_connection_string;
use crate::domain::{BridgeError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::{NoTls, Row};

/// PostgreSQL client for fhir-bridge
///
/// Wraps a `deadpool-postgres` pool. Every query or statement issued through
/// [`PostgreSQLClient::query`] and [`PostgreSQLClient::execute`] runs with the
/// configured statement timeout.
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// No connection is opened yet; call [`PostgreSQLClient::test_connection`]
    /// to verify connectivity.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid, the TLS
    /// connector cannot be built, or the pool cannot be created.
    pub fn new(config: PostgreSQLConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .parse()
            .map_err(|e| {
                BridgeError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode.as_str() {
            "disable" => {
                pg_config.ssl_mode(SslMode::Disable);
                Manager::from_config(pg_config, NoTls, manager_config)
            }
            mode => {
                pg_config.ssl_mode(if mode == "prefer" {
                    SslMode::Prefer
                } else {
                    SslMode::Require
                });
                Manager::from_config(pg_config, build_tls_connector(mode)?, manager_config)
            }
        };

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .build()
            .map_err(|e| BridgeError::Database(format!("Failed to create connection pool: {e}")))?;

        Ok(Self { pool, config })
    }

    /// Test the connection to PostgreSQL
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Connection`] when no connection can be made.
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| BridgeError::Connection(format!("Connection test failed: {e}")))?;

        tracing::info!(
            database = %self.connection_string_safe(),
            "PostgreSQL connection test successful"
        );
        Ok(())
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Connection`] if a connection cannot be obtained.
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            BridgeError::Connection(format!("Failed to get connection from pool: {e}"))
        })
    }

    /// Applies the configured statement timeout to a pooled connection
    pub async fn apply_statement_timeout(&self, client: &deadpool_postgres::Object) -> Result<()> {
        let timeout_query = format!(
            "SET statement_timeout = {}",
            self.config.statement_timeout_seconds * 1000
        );
        client
            .batch_execute(&timeout_query)
            .await
            .map_err(|e| BridgeError::Database(format!("Failed to set statement timeout: {e}")))
    }

    /// Execute a query and return rows
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn query(
        &self,
        query: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Row>> {
        let client = self.get_connection().await?;
        self.apply_statement_timeout(&client).await?;

        client
            .query(query, params)
            .await
            .map_err(|e| BridgeError::Database(format!("Query failed: {e}")))
    }

    /// Execute a statement and return the number of affected rows
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn execute(
        &self,
        statement: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<u64> {
        let client = self.get_connection().await?;
        self.apply_statement_timeout(&client).await?;

        client
            .execute(statement, params)
            .await
            .map_err(|e| BridgeError::Database(format!("Statement execution failed: {e}")))
    }

    /// Run a multi-statement SQL script (DDL, migrations)
    pub async fn batch_execute(&self, script: &str) -> Result<()> {
        let client = self.get_connection().await?;
        client
            .batch_execute(script)
            .await
            .map_err(|e| BridgeError::Database(format!("Batch execution failed: {e}")))
    }

    /// Get the connection string (without password)
    pub fn connection_string_safe(&self) -> String {
        redact_connection_string(self.config.connection_string.expose_secret().as_ref())
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

/// TLS connector for `require`, `prefer`, `verify-ca` and `verify-full`
///
/// `require` and `prefer` encrypt without verifying the server certificate,
/// `verify-ca` skips only the hostname check.
fn build_tls_connector(ssl_mode: &str) -> Result<MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    match ssl_mode {
        "verify-full" => {}
        "verify-ca" => {
            builder.danger_accept_invalid_hostnames(true);
        }
        _ => {
            builder.danger_accept_invalid_certs(true);
        }
    }
    let connector = builder
        .build()
        .map_err(|e| BridgeError::Configuration(format!("Failed to build TLS connector: {e}")))?;
    Ok(MakeTlsConnector::new(connector))
}
