//! External system integrations for fhir-bridge.
//!
//! - [`database`] - Store traits used by the sync core
//! - [`postgresql`] - PostgreSQL implementations of those traits
//!
//! # Design Pattern
//!
//! Adapters isolate the database drivers from the sync core and enable
//! testing with in-memory implementations.
//!
//! ```rust,no_run
//! use fhir_bridge::adapters::database::create_stores;
//! use fhir_bridge::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("fhir-bridge.toml")?;
//! let stores = create_stores(&config)?;
//! stores.target.ensure_schema().await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod postgresql;
