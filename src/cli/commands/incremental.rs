//! Incremental command implementation
//!
//! Replays the change log once from the stored cursor (or `--since`) and
//! persists the new cursor.

use super::context::CommandContext;
use super::full_sync::checkpoint;
use super::{outcome_exit_code, EXIT_CONFIG, EXIT_FATAL};
use crate::core::sync::SyncOutcome;
use crate::domain::ChangeId;
use clap::Args;

/// Arguments for the incremental command
#[derive(Args, Debug)]
pub struct IncrementalArgs {
    /// Replay changes after this change id instead of the stored cursor
    #[arg(long)]
    pub since: Option<i64>,
}

impl IncrementalArgs {
    /// Execute the incremental command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(since = ?self.since, "Starting incremental sync command");

        let ctx = match CommandContext::connect(config_path).await {
            Ok(ctx) => ctx,
            Err(code) => return Ok(code),
        };

        let orchestrator = match ctx.orchestrator() {
            Ok(o) => o,
            Err(e) => {
                println!("❌ Failed to load mappings");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        match ctx.state_manager().load_cursor(ctx.tenant).await {
            Ok(Some(cursor)) => orchestrator.restore_cursor(cursor).await,
            Ok(None) => {
                if self.since.is_none() {
                    println!("ℹ️  No stored cursor; replaying the whole change log");
                }
            }
            Err(e) => {
                println!("❌ Failed to load sync cursor");
                println!("   Error: {e}");
                return Ok(EXIT_FATAL);
            }
        }

        let outcome = match orchestrator
            .trigger_incremental_sync(ctx.tenant, self.since.map(ChangeId::new))
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

fn print_summary(outcome: &SyncOutcome) {
    let Some(stats) = outcome.incremental_stats() else {
        println!("❌ {}", outcome.message);
        return;
    };

    println!("🔄 {}", outcome.message);
    if stats.total_changes > 0 {
        println!();
        println!("  Synced:    {}", stats.synced);
        println!("  Errors:    {}", stats.errors);
        println!("  Not found: {}", stats.not_found);
        println!("  Skipped:   {}", stats.skipped);
        for (table, count) in &stats.by_table {
            println!("  {table:<20} {count:>8}");
        }
    }
    println!("  Cursor:    {}", stats.last_change_id);
}
