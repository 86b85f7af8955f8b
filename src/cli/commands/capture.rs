//! Install-capture command implementation
//!
//! Creates the change log table on the source database and installs one
//! change trigger per captured table.

use super::context::{captured_tables, CommandContext};
use super::{EXIT_CONFIG, EXIT_FATAL, EXIT_OK};
use clap::Args;

/// Arguments for the install-capture command
#[derive(Args, Debug)]
pub struct InstallCaptureArgs {
    /// Install triggers only on these tables (repeatable)
    #[arg(long = "table", value_name = "TABLE")]
    pub tables: Vec<String>,
}

impl InstallCaptureArgs {
    /// Execute the install-capture command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Installing change capture");

        let ctx = match CommandContext::connect(config_path).await {
            Ok(ctx) => ctx,
            Err(code) => return Ok(code),
        };

        let engine = match ctx.engine() {
            Ok(engine) => engine,
            Err(e) => {
                println!("❌ Failed to load mappings");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let mut tables = match captured_tables(&ctx.config, &engine) {
            Ok(tables) => tables,
            Err(e) => {
                println!("❌ {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        if !self.tables.is_empty() {
            tables.retain(|t| self.tables.contains(&t.table));
            if tables.is_empty() {
                println!("❌ None of the requested tables is configured for capture");
                return Ok(EXIT_CONFIG);
            }
        }

        println!(
            "📦 Installing change capture into '{}'",
            ctx.stores.capture.log_table()
        );
        if let Err(e) = ctx.stores.capture.install_all(&tables).await {
            println!("❌ Change capture installation failed");
            println!("   Error: {e}");
            return Ok(EXIT_FATAL);
        }

        for table in &tables {
            println!("  ✅ {} (key: {})", table.table, table.key_column);
        }
        println!();
        println!("Change capture installed on {} table(s)", tables.len());
        Ok(EXIT_OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_capture_args_default() {
        let args = InstallCaptureArgs { tables: Vec::new() };
        assert!(args.tables.is_empty());
    }
}
