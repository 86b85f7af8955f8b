//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the configuration file and the mapping specs it selects.

use super::{EXIT_CONFIG, EXIT_OK};
use crate::config::{load_config, redact_connection_string};
use crate::core::mapping::MappingEngine;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as part of loading
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration is valid");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let engine = match MappingEngine::from_config(&config.mapping) {
            Ok(engine) => {
                println!("✅ {} mapping spec(s) compiled", engine.registry().len());
                engine
            }
            Err(e) => {
                println!("❌ Mapping specs failed to compile");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        println!();
        println!("Configuration Summary:");
        println!("  Application: {}", config.application.name);
        println!("  Log Level: {}", config.application.log_level);
        println!("  Environment: {:?}", config.environment);
        println!(
            "  Source Database: {}",
            redact_connection_string(config.source.connection_string.expose_secret().as_ref())
        );
        println!(
            "  Target Database: {}",
            redact_connection_string(config.target.connection_string.expose_secret().as_ref())
        );
        println!("  Change Log: {}", config.capture.log_table);
        println!(
            "  Captured Tables: {}",
            if config.capture.tables.is_empty() {
                "all mapped tables".to_string()
            } else {
                config
                    .capture
                    .tables
                    .iter()
                    .map(|t| t.table.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        );
        println!(
            "  Mapped Tables: {}",
            engine
                .registry()
                .tables()
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("  Tenant: {}", config.sync.tenant_id);
        println!("  Batch Size: {}", config.sync.batch_size);
        println!("  Change Page Size: {}", config.sync.change_page_size);
        println!("  Interval: {}s", config.sync.interval_seconds);
        println!();
        Ok(EXIT_OK)
    }
}
