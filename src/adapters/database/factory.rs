//! Store factory
//!
//! Builds the PostgreSQL-backed stores from configuration. The source pool
//! serves extraction, the change reader and capture installation; the target
//! pool serves document loading and cursor persistence.

use crate::adapters::database::traits::{
    ChangeLogRetention, ChangeReader, CursorStore, SourceStore, TargetStore,
};
use crate::adapters::postgresql::{
    ChangeCapture, PostgreSQLChangeReader, PostgreSQLClient, PostgreSQLSourceStore,
    PostgreSQLTargetStore,
};
use crate::config::BridgeConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Every store a sync run needs, wired to the configured databases
pub struct Stores {
    pub source: Arc<dyn SourceStore>,
    pub target: Arc<dyn TargetStore>,
    pub reader: Arc<dyn ChangeReader>,
    pub cursors: Arc<dyn CursorStore>,
    pub retention: Arc<dyn ChangeLogRetention>,
    pub capture: Arc<ChangeCapture>,
    pub source_client: Arc<PostgreSQLClient>,
    pub target_client: Arc<PostgreSQLClient>,
}

/// Create the source and target stores from the configuration
///
/// Pools connect lazily, so this does not touch the network. Use
/// [`PostgreSQLClient::test_connection`] to verify connectivity.
///
/// # Errors
///
/// Returns an error if a connection string cannot be parsed or a capture
/// table name is invalid.
pub fn create_stores(config: &BridgeConfig) -> Result<Stores> {
    tracing::info!("Creating source PostgreSQL client");
    let source_client = Arc::new(PostgreSQLClient::new(config.source.clone())?);

    tracing::info!("Creating target PostgreSQL client");
    let target_client = Arc::new(PostgreSQLClient::new(config.target.clone())?);

    let capture = Arc::new(ChangeCapture::new(
        Arc::clone(&source_client),
        config.capture.log_table.clone(),
        config.capture.notify_channel.clone(),
    )?);
    let reader = Arc::new(PostgreSQLChangeReader::new(
        Arc::clone(&source_client),
        config.capture.log_table.clone(),
    )?);
    let target = Arc::new(PostgreSQLTargetStore::new(Arc::clone(&target_client)));

    Ok(Stores {
        source: Arc::new(PostgreSQLSourceStore::new(Arc::clone(&source_client))),
        target: Arc::clone(&target) as Arc<dyn TargetStore>,
        reader,
        cursors: target,
        retention: Arc::clone(&capture) as Arc<dyn ChangeLogRetention>,
        capture,
        source_client,
        target_client,
    })
}
