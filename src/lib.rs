// fhir-bridge - Relational clinical records to FHIR document sync
// Copyright (c) 2025 fhir-bridge Contributors
// Licensed under the MIT License

//! # fhir-bridge - relational clinical records to FHIR documents
//!
//! fhir-bridge keeps FHIR-shaped JSON documents in a target database in step
//! with the relational tables of a hospital database.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Capturing** row changes with triggers into an append-only change log
//! - **Mapping** flat source rows into nested FHIR R4 documents
//! - **Full sync** of every mapped table in key order
//! - **Incremental sync** replaying the change log from a persisted cursor
//! - **Scheduling** periodic incremental runs with graceful shutdown
//!
//! ## Architecture
//!
//! fhir-bridge follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (mapping, sync, state, scheduler)
//! - [`adapters`] - Store traits and their PostgreSQL implementations
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fhir_bridge::adapters::database::create_stores;
//! use fhir_bridge::config::load_config;
//! use fhir_bridge::core::mapping::MappingEngine;
//! use fhir_bridge::core::sync::SyncOrchestrator;
//! use fhir_bridge::domain::TenantId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("fhir-bridge.toml")?;
//!     let stores = create_stores(&config)?;
//!     stores.target.ensure_schema().await?;
//!
//!     let orchestrator = SyncOrchestrator::new(
//!         stores.source,
//!         stores.target,
//!         stores.reader,
//!         MappingEngine::from_config(&config.mapping)?,
//!         (&config.sync).into(),
//!     );
//!
//!     let tenant = TenantId::new(config.sync.tenant_id)?;
//!     let stats = orchestrator.full_sync(tenant, None, &[]).await?;
//!     println!("Loaded {} documents", stats.total_loaded());
//!     Ok(())
//! }
//! ```
//!
//! ## Mapping
//!
//! A mapping spec turns one source table into one resource type. Target
//! paths use dotted keys with array indexes:
//!
//! ```rust
//! use fhir_bridge::core::mapping::{CompileOptions, MappingRegistry};
//! use fhir_bridge::domain::SourceRecord;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = MappingRegistry::builtin(CompileOptions::default())?;
//! let spec = registry.by_table("patients").ok_or("no patients mapping")?;
//!
//! let record = SourceRecord::new()
//!     .with("patient_id", 7)
//!     .with("first_name", "Ada")
//!     .with("last_name", "Lovelace");
//! let document = spec.materialize(&record)?;
//! assert_eq!(document.pointer("/name/0/family").and_then(|v| v.as_str()), Some("Lovelace"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! fhir-bridge uses the [`domain::BridgeError`] type for all errors.
//! Record-level failures (mapping, load, vanished rows) are counted in the
//! sync statistics instead of aborting a run.
//!
//! ## Logging
//!
//! fhir-bridge uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(tenant_id = 1, "Starting incremental sync");
//! warn!(table = "lab_results", record_id = 42, "Record skipped");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
