//! Run command implementation
//!
//! Starts the scheduler: one incremental sync every `sync.interval_seconds`
//! until SIGINT/SIGTERM.

use super::context::CommandContext;
use super::{EXIT_CONFIG, EXIT_FATAL, EXIT_OK};
use crate::core::scheduler::SyncScheduler;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the interval between runs, in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Run a full sync before starting the scheduler
    #[arg(long)]
    pub full_sync_first: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting sync scheduler command");

        let ctx = match CommandContext::connect(config_path).await {
            Ok(ctx) => ctx,
            Err(code) => return Ok(code),
        };

        let orchestrator = match ctx.orchestrator() {
            Ok(o) => Arc::new(o),
            Err(e) => {
                println!("❌ Failed to load mappings");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let interval_seconds = self.interval.unwrap_or(ctx.config.sync.interval_seconds);
        if interval_seconds == 0 {
            println!("❌ --interval must be > 0");
            return Ok(EXIT_CONFIG);
        }

        let mut scheduler = SyncScheduler::new(
            Arc::clone(&orchestrator),
            ctx.tenant,
            Duration::from_secs(interval_seconds),
        )
        .with_state_manager(ctx.state_manager());
        if let Some(days) = ctx.config.capture.retention_days {
            scheduler = scheduler.with_retention(Arc::clone(&ctx.stores.retention), days);
        }

        if self.full_sync_first {
            if let Err(e) = scheduler.initialize().await {
                println!("❌ Failed to establish sync cursor");
                println!("   Error: {e}");
                return Ok(EXIT_FATAL);
            }
            println!("🚀 Running initial full sync");
            match orchestrator
                .trigger_full_sync(ctx.tenant, ctx.config.sync.full_sync_limit, &[])
                .await
            {
                Ok(outcome) => println!("   {}", outcome.message),
                Err(e) => {
                    println!("❌ {e}");
                    return Ok(EXIT_FATAL);
                }
            }
        }

        println!(
            "⏱️  Syncing tenant {} every {interval_seconds}s (Ctrl+C to stop)",
            ctx.tenant
        );

        match scheduler.run(shutdown_signal).await {
            Ok(stats) => {
                println!();
                println!(
                    "Stopped after {} run(s): {} succeeded, {} failed, {} change(s) synced",
                    stats.total_runs,
                    stats.successful_runs,
                    stats.failed_runs,
                    stats.total_changes_synced
                );
                Ok(EXIT_OK)
            }
            Err(e) => {
                println!("❌ Scheduler failed to start");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_defaults() {
        let args = RunArgs {
            interval: None,
            full_sync_first: false,
        };
        assert!(args.interval.is_none());
        assert!(!args.full_sync_first);
    }
}
