//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for fhir-bridge using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// fhir-bridge - change-driven sync of hospital records into FHIR documents
#[derive(Parser, Debug)]
#[command(name = "fhir-bridge")]
#[command(version, about, long_about = None)]
#[command(author = "fhir-bridge Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "fhir-bridge.toml", env = "FHIR_BRIDGE_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FHIR_BRIDGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the change log and install change triggers on the source database
    InstallCapture(commands::capture::InstallCaptureArgs),

    /// Sync every mapped table into the target database
    FullSync(commands::full_sync::FullSyncArgs),

    /// Replay the change log once from the stored cursor
    Incremental(commands::incremental::IncrementalArgs),

    /// Run incremental syncs periodically until interrupted
    Run(commands::run::RunArgs),

    /// Show cursor, backlog and document counts
    Status(commands::status::StatusArgs),

    /// List change log events
    Changes(commands::changes::ChangesArgs),

    /// Show the active mapping specs
    Mappings(commands::mappings::MappingsArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

impl Commands {
    /// Whether the command keeps running until a shutdown signal
    pub fn is_long_running(&self) -> bool {
        matches!(self, Commands::Run(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_full_sync() {
        let cli = Cli::parse_from(["fhir-bridge", "full-sync"]);
        assert_eq!(cli.config, "fhir-bridge.toml");
        assert!(matches!(cli.command, Commands::FullSync(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["fhir-bridge", "--config", "custom.toml", "status"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["fhir-bridge", "--log-level", "debug", "run"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(cli.command.is_long_running());
    }

    #[test]
    fn test_cli_parse_full_sync_options() {
        let cli = Cli::parse_from([
            "fhir-bridge",
            "full-sync",
            "--limit",
            "50",
            "--resource-type",
            "Patient",
            "--resource-type",
            "Encounter",
        ]);
        match cli.command {
            Commands::FullSync(args) => {
                assert_eq!(args.limit, Some(50));
                assert_eq!(args.resource_types, vec!["Patient", "Encounter"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_incremental_since() {
        let cli = Cli::parse_from(["fhir-bridge", "incremental", "--since", "1200"]);
        match cli.command {
            Commands::Incremental(args) => assert_eq!(args.since, Some(1200)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_changes() {
        let cli = Cli::parse_from([
            "fhir-bridge",
            "changes",
            "--table",
            "lab_results",
            "--limit",
            "20",
        ]);
        match cli.command {
            Commands::Changes(args) => {
                assert_eq!(args.table.as_deref(), Some("lab_results"));
                assert_eq!(args.limit, 20);
                assert!(args.since.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_install_capture_tables() {
        let cli = Cli::parse_from(["fhir-bridge", "install-capture", "--table", "patients"]);
        match cli.command {
            Commands::InstallCapture(args) => assert_eq!(args.tables, vec!["patients"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["fhir-bridge", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
        assert!(!cli.command.is_long_running());
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["fhir-bridge", "init", "--with-examples"]);
        assert!(matches!(cli.command, Commands::Init(ref args) if args.with_examples));
    }
}
