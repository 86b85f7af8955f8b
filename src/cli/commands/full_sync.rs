//! Full-sync command implementation
//!
//! Extracts every mapped table in key order and upserts the mapped
//! documents. The change log position at the start of the first full sync
//! becomes the tenant's cursor.

use super::context::CommandContext;
use super::{outcome_exit_code, EXIT_CONFIG, EXIT_FATAL};
use crate::core::state::SyncCursor;
use crate::core::sync::{SyncOrchestrator, SyncOutcome};
use crate::domain::ResourceType;
use clap::Args;
use std::str::FromStr;

/// Arguments for the full-sync command
#[derive(Args, Debug)]
pub struct FullSyncArgs {
    /// Maximum rows extracted per entity
    #[arg(long)]
    pub limit: Option<usize>,

    /// Restrict the sync to these resource types (repeatable)
    #[arg(long = "resource-type", value_name = "TYPE")]
    pub resource_types: Vec<String>,
}

impl FullSyncArgs {
    /// Execute the full-sync command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting full sync command");

        let ctx = match CommandContext::connect(config_path).await {
            Ok(ctx) => ctx,
            Err(code) => return Ok(code),
        };

        let names = if self.resource_types.is_empty() {
            &ctx.config.sync.resource_types
        } else {
            &self.resource_types
        };
        let resource_types = match parse_resource_types(names) {
            Ok(types) => types,
            Err(e) => {
                println!("❌ {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let limit = self.limit.or(ctx.config.sync.full_sync_limit);

        let orchestrator = match ctx.orchestrator() {
            Ok(o) => o,
            Err(e) => {
                println!("❌ Failed to load mappings");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let state_manager = ctx.state_manager();
        match state_manager.load_cursor(ctx.tenant).await {
            Ok(Some(cursor)) => orchestrator.restore_cursor(cursor).await,
            Ok(None) => {}
            Err(e) => {
                println!("❌ Failed to load sync cursor");
                println!("   Error: {e}");
                return Ok(EXIT_FATAL);
            }
        }

        println!("🚀 Starting full sync for tenant {}", ctx.tenant);
        println!();

        let outcome = match orchestrator
            .trigger_full_sync(ctx.tenant, limit, &resource_types)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                println!("❌ {e}");
                return Ok(EXIT_FATAL);
            }
        };

        print_summary(&outcome);

        if outcome.is_completed() {
            checkpoint(&orchestrator, &ctx).await;
        }
        Ok(outcome_exit_code(&outcome))
    }
}

/// Persists the held cursor; a failure is reported but doesn't fail the run
pub(crate) async fn checkpoint(orchestrator: &SyncOrchestrator, ctx: &CommandContext) {
    let Some(position) = orchestrator.cursor(ctx.tenant).await else {
        return;
    };
    let cursor = SyncCursor::new(ctx.tenant, position);
    if let Err(e) = ctx.state_manager().checkpoint(&cursor).await {
        println!("⚠️  Failed to persist sync cursor: {e}");
    }
}

fn parse_resource_types(names: &[String]) -> Result<Vec<ResourceType>, String> {
    names.iter().map(|n| ResourceType::from_str(n)).collect()
}

fn print_summary(outcome: &SyncOutcome) {
    let Some(stats) = outcome.full_stats() else {
        println!("❌ {}", outcome.message);
        return;
    };

    println!(
        "{:<24} {:<20} {:>10} {:>10} {:>10}",
        "Entity", "Resource", "Extracted", "Loaded", "Errors"
    );
    println!("{}", "-".repeat(78));
    for entity in &stats.entities {
        println!(
            "{:<24} {:<20} {:>10} {:>10} {:>10}",
            entity.entity,
            entity.resource_type.as_str(),
            entity.extracted, entity.loaded, entity.errors
        );
    }
    println!();
    if let Some(baseline) = stats.baseline_change_id {
        println!("Change log baseline: {baseline}");
    }
    let icon = if outcome.is_partial() { "⚠️ " } else { "✅" };
    println!("{icon} {}", outcome.message);
}
