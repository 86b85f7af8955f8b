//! Changes command implementation
//!
//! Lists change log events, oldest first.

use super::context::CommandContext;
use super::{EXIT_FATAL, EXIT_OK};
use crate::adapters::database::traits::{ReadRequest, DEFAULT_READ_LIMIT};
use crate::domain::ChangeId;
use clap::Args;

/// Arguments for the changes command
#[derive(Args, Debug)]
pub struct ChangesArgs {
    /// Only events after this change id
    #[arg(long)]
    pub since: Option<i64>,

    /// Only events of this table
    #[arg(long)]
    pub table: Option<String>,

    /// Maximum number of events (1-1000)
    #[arg(long, default_value_t = DEFAULT_READ_LIMIT)]
    pub limit: usize,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl ChangesArgs {
    fn request(&self) -> ReadRequest {
        let mut request = ReadRequest::new()
            .since(self.since.map(ChangeId::new))
            .limit(self.limit);
        if let Some(ref table) = self.table {
            request = request.table(table.clone());
        }
        request
    }

    /// Execute the changes command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let ctx = match CommandContext::connect(config_path).await {
            Ok(ctx) => ctx,
            Err(code) => return Ok(code),
        };

        let events = match ctx.stores.reader.read(&self.request()).await {
            Ok(events) => events,
            Err(e) => {
                println!("❌ Failed to read change log");
                println!("   Error: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        if self.json {
            for event in &events {
                println!("{}", serde_json::to_string(event)?);
            }
            return Ok(EXIT_OK);
        }

        if events.is_empty() {
            println!("No change events found.");
            return Ok(EXIT_OK);
        }

        println!(
            "{:>12} {:<24} {:<8} {:>12} {:<20}",
            "Change id", "Table", "Op", "Record", "Changed at"
        );
        println!("{}", "-".repeat(80));
        for event in &events {
            println!(
                "{:>12} {:<24} {:<8} {:>12} {:<20}",
                event.change_id.get(),
                event.table_name,
                event.operation.as_str(),
                event.record_id,
                event.changed_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        println!();
        println!("{} event(s)", events.len());
        Ok(EXIT_OK)
    }
}
