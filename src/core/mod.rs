//! Core business logic for fhir-bridge.
//!
//! # Modules
//!
//! - [`mapping`] - Declarative record → document mapping
//! - [`sync`] - Full and incremental sync orchestration
//! - [`state`] - Sync cursor, history and cursor persistence
//! - [`scheduler`] - Periodic incremental sync driver
//!
//! # Sync Workflow
//!
//! 1. **Capture**: triggers append every row mutation to the change log
//! 2. **Full sync**: extract each mapped table in key order, map and upsert
//! 3. **Incremental sync**: read change events after the cursor, re-fetch
//!    the current row, map and upsert (or delete)
//! 4. **Checkpoint**: persist the cursor after each successful run
//!
//! # Example
//!
//! ```rust,no_run
//! use fhir_bridge::adapters::database::create_stores;
//! use fhir_bridge::config::load_config;
//! use fhir_bridge::core::mapping::MappingEngine;
//! use fhir_bridge::core::sync::SyncOrchestrator;
//! use fhir_bridge::domain::TenantId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("fhir-bridge.toml")?;
//! let stores = create_stores(&config)?;
//! let engine = MappingEngine::from_config(&config.mapping)?;
//! let orchestrator = SyncOrchestrator::new(
//!     stores.source,
//!     stores.target,
//!     stores.reader,
//!     engine,
//!     (&config.sync).into(),
//! );
//!
//! let tenant = TenantId::new(config.sync.tenant_id)?;
//! let outcome = orchestrator.trigger_incremental_sync(tenant, None).await?;
//! println!("{}", outcome.message);
//! # Ok(())
//! # }
//! ```

pub mod mapping;
pub mod scheduler;
pub mod state;
pub mod sync;
