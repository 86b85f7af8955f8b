//! Status command implementation
//!
//! Shows the tenant's cursor, the change log backlog, trigger presence and
//! document counts per mapped table.

use super::context::{captured_tables, CommandContext};
use super::{EXIT_CONFIG, EXIT_FATAL, EXIT_OK};
use crate::adapters::database::ReadRequest;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also print per-table change log statistics
    #[arg(long)]
    pub changes: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking sync status");

        println!("📊 Sync Status");
        println!();

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

        let cursor = match ctx.state_manager().load_cursor(ctx.tenant).await {
            Ok(cursor) => cursor,
            Err(e) => {
                println!("❌ Failed to load sync cursor");
                println!("   Error: {e}");
                return Ok(EXIT_FATAL);
            }
        };
        let latest = match ctx.stores.reader.latest_id().await {
            Ok(latest) => Some(latest),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read change log");
                None
            }
        };

        println!("Tenant:            {}", ctx.tenant);
        match cursor {
            Some(ref cursor) => println!(
                "Cursor:            {} (saved {})",
                cursor.last_change_id,
                cursor.updated_at.format("%Y-%m-%d %H:%M:%S")
            ),
            None => println!("Cursor:            none (run 'fhir-bridge full-sync' first)"),
        }
        match latest {
            Some(latest) => {
                println!("Latest change id:  {latest}");
                if let Some(ref cursor) = cursor {
                    let pending = ctx
                        .stores
                        .reader
                        .read(&ReadRequest::new().since(cursor.last_change_id).limit(1))
                        .await
                        .map(|events| !events.is_empty())
                        .unwrap_or(false);
                    println!(
                        "Backlog:           {}",
                        if pending { "pending changes" } else { "up to date" }
                    );
                }
            }
            None => println!("Latest change id:  unavailable (is capture installed?)"),
        }
        println!();

        let tables = captured_tables(&ctx.config, &engine).unwrap_or_default();
        println!(
            "{:<24} {:<20} {:>10} {:>10}",
            "Table", "Resource", "Documents", "Capture"
        );
        println!("{}", "-".repeat(68));
        for spec in engine.registry().iter() {
            let table = spec.source_table().as_str();
            let documents = ctx
                .stores
                .target
                .count(ctx.tenant, Some(table))
                .await
                .map(|n| n.to_string())
                .unwrap_or_else(|_| "?".to_string());
            let capture = if tables.iter().any(|t| t.table == table) {
                match ctx.stores.capture.is_capture_enabled(table).await {
                    Ok(true) => "on",
                    Ok(false) => "off",
                    Err(_) => "?",
                }
            } else {
                "-"
            };
            println!(
                "{:<24} {:<20} {:>10} {:>10}",
                table,
                spec.target_resource().as_str(),
                documents,
                capture
            );
        }

        if self.changes {
            println!();
            match ctx.stores.capture.change_statistics().await {
                Ok(statistics) if statistics.is_empty() => println!("Change log is empty."),
                Ok(statistics) => {
                    println!(
                        "{:<24} {:<10} {:>10} {:>14} {:<20}",
                        "Table", "Operation", "Events", "Latest id", "Last change"
                    );
                    println!("{}", "-".repeat(82));
                    for stat in statistics {
                        println!(
                            "{:<24} {:<10} {:>10} {:>14} {:<20}",
                            stat.table_name,
                            stat.operation,
                            stat.count,
                            stat.latest_change_id,
                            stat.last_changed_at
                                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                                .unwrap_or_else(|| "-".to_string())
                        );
                    }
                }
                Err(e) => println!("⚠️  Change statistics unavailable: {e}"),
            }
        }

        println!();
        Ok(EXIT_OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_args_defaults() {
        let args = StatusArgs { changes: false };
        assert!(!args.changes);
    }
}
