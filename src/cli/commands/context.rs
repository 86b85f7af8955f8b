//! Shared setup of the database-backed commands

use super::{EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL};
use crate::adapters::database::{create_stores, Stores};
use crate::adapters::postgresql::CapturedTable;
use crate::config::{load_config, BridgeConfig};
use crate::core::mapping::MappingEngine;
use crate::core::state::StateManager;
use crate::core::sync::SyncOrchestrator;
use crate::domain::{BridgeError, Result, TenantId};
use std::sync::Arc;

/// Loaded configuration plus connected stores
pub struct CommandContext {
    pub config: BridgeConfig,
    pub tenant: TenantId,
    pub stores: Stores,
}

impl CommandContext {
    /// Loads the configuration, connects both databases and applies the
    /// target schema
    ///
    /// On failure the error is printed and `Err` carries the exit code.
    pub async fn connect(config_path: &str) -> std::result::Result<Self, i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Err(EXIT_CONFIG);
            }
        };

        let tenant = match TenantId::new(config.sync.tenant_id) {
            Ok(t) => t,
            Err(e) => {
                println!("❌ Invalid tenant: {e}");
                return Err(EXIT_CONFIG);
            }
        };

        let stores = match create_stores(&config) {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to create database clients");
                println!("   Error: {e}");
                return Err(EXIT_CONFIG);
            }
        };

        for (label, client) in [("source", &stores.source_client), ("target", &stores.target_client)] {
            if let Err(e) = client.test_connection().await {
                println!(
                    "❌ Failed to connect to {label} database ({})",
                    client.connection_string_safe()
                );
                println!("   Error: {e}");
                return Err(EXIT_CONNECTION);
            }
        }

        if let Err(e) = stores.target.ensure_schema().await {
            println!("❌ Failed to prepare target schema");
            println!("   Error: {e}");
            return Err(EXIT_FATAL);
        }

        Ok(Self {
            config,
            tenant,
            stores,
        })
    }

    /// Mapping engine built from the `[mapping]` section
    pub fn engine(&self) -> Result<MappingEngine> {
        MappingEngine::from_config(&self.config.mapping)
    }

    pub fn orchestrator(&self) -> Result<SyncOrchestrator> {
        Ok(SyncOrchestrator::new(
            Arc::clone(&self.stores.source),
            Arc::clone(&self.stores.target),
            Arc::clone(&self.stores.reader),
            self.engine()?,
            (&self.config.sync).into(),
        ))
    }

    pub fn state_manager(&self) -> StateManager {
        StateManager::new_with_storage(Arc::clone(&self.stores.cursors))
    }
}

/// Tables watched by the change triggers, with their key columns
///
/// An empty `[[capture.tables]]` list means every mapped table. A missing
/// `key_column` falls back to the mapping's key column.
pub fn captured_tables(config: &BridgeConfig, engine: &MappingEngine) -> Result<Vec<CapturedTable>> {
    if config.capture.tables.is_empty() {
        return Ok(engine
            .registry()
            .iter()
            .map(|spec| CapturedTable::new(spec.source_table().as_str(), spec.key_column()))
            .collect());
    }

    config
        .capture
        .tables
        .iter()
        .map(|entry| {
            let key_column = match (&entry.key_column, engine.spec_for(&entry.table)) {
                (Some(key), _) => key.clone(),
                (None, Some(spec)) => spec.key_column().to_string(),
                (None, None) => {
                    return Err(BridgeError::Configuration(format!(
                        "capture table '{}' has no key_column and no mapping",
                        entry.table
                    )))
                }
            };
            Ok(CapturedTable::new(entry.table.clone(), key_column))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    const BASE: &str = r#"
[source]
connection_string = "postgresql://sync@localhost:5432/hospital"

[target]
connection_string = "postgresql://fhir@localhost:5432/fhir"
"#;

    #[test]
    fn test_captured_tables_default_to_mapped_tables() {
        let config = load_config_from_str(BASE).unwrap();
        let engine = MappingEngine::from_config(&config.mapping).unwrap();

        let tables = captured_tables(&config, &engine).unwrap();
        assert_eq!(tables.len(), engine.registry().len());
        assert!(tables.contains(&CapturedTable::new("patients", "patient_id")));
    }

    #[test]
    fn test_captured_tables_key_column_fallback() {
        let toml = format!(
            "{BASE}\n[[capture.tables]]\ntable = \"patients\"\n\n[[capture.tables]]\ntable = \"wards\"\nkey_column = \"ward_id\"\n"
        );
        let config = load_config_from_str(&toml).unwrap();
        let engine = MappingEngine::from_config(&config.mapping).unwrap();

        let tables = captured_tables(&config, &engine).unwrap();
        assert_eq!(
            tables,
            vec![
                CapturedTable::new("patients", "patient_id"),
                CapturedTable::new("wards", "ward_id"),
            ]
        );
    }

    #[test]
    fn test_captured_tables_unknown_key_column() {
        let toml = format!("{BASE}\n[[capture.tables]]\ntable = \"wards\"\n");
        let config = load_config_from_str(&toml).unwrap();
        let engine = MappingEngine::from_config(&config.mapping).unwrap();

        assert!(matches!(
            captured_tables(&config, &engine),
            Err(BridgeError::Configuration(_))
        ));
    }
}
