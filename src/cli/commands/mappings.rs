//! Mappings command implementation
//!
//! Prints the active mapping specs. Needs no database.

use super::{EXIT_CONFIG, EXIT_OK};
use crate::config::load_config;
use crate::core::mapping::{FieldTransform, MappingEngine};
use clap::Args;

/// Arguments for the mappings command
#[derive(Args, Debug)]
pub struct MappingsArgs {
    /// Only show the mapping of this source table
    #[arg(long)]
    pub table: Option<String>,

    /// Print the specs as JSON (loadable via mapping.specs_path)
    #[arg(long)]
    pub json: bool,
}

impl MappingsArgs {
    /// Execute the mappings command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let engine = match MappingEngine::from_config(&config.mapping) {
            Ok(engine) => engine,
            Err(e) => {
                println!("❌ Failed to load mappings");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if self.json {
            println!("{}", engine.registry().export_json()?);
            return Ok(EXIT_OK);
        }

        let specs: Vec<_> = engine
            .registry()
            .iter()
            .filter(|spec| {
                self.table
                    .as_deref()
                    .map_or(true, |t| spec.source_table().as_str() == t)
            })
            .collect();

        if specs.is_empty() {
            println!("No mappings found.");
            return Ok(EXIT_OK);
        }

        for spec in specs {
            println!(
                "🗺️  {} → {} (key: {})",
                spec.source_table(),
                spec.target_resource(),
                spec.key_column()
            );
            for field in spec.fields() {
                let transform = match field.transform {
                    FieldTransform::Identity => String::new(),
                    FieldTransform::Apply(t) => format!(" |{}", t.name()),
                    FieldTransform::Unknown(ref name) => format!(" |{name}?"),
                };
                let data_type = format!("{:?}", field.data_type);
                println!(
                    "    {:<28} → {:<36} {:<10}{}{}",
                    field.source_field,
                    field.path.as_str(),
                    data_type,
                    if field.required { " required" } else { "" },
                    transform
                );
            }
            println!();
        }
        Ok(EXIT_OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mappings_missing_config() {
        let args = MappingsArgs {
            table: None,
            json: false,
        };
        let code = args
            .execute("/nonexistent/fhir-bridge.toml")
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
