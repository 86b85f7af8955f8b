//! Domain models and types for fhir-bridge.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`TenantId`], [`ChangeId`], [`TableName`])
//! - **Source rows** ([`SourceRecord`], [`SourceValue`])
//! - **Change log entries** ([`ChangeEvent`], [`Operation`])
//! - **Target documents** ([`TargetDocument`], [`ResourceType`])
//! - **Error types** ([`BridgeError`], [`MappingError`]) and the [`Result`] alias
//!
//! ```rust
//! use fhir_bridge::domain::{ResourceType, SourceRecord, TenantId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tenant = TenantId::new(1)?;
//! let record = SourceRecord::new().with("patient_id", 12).with("gender", "F");
//! let resource: ResourceType = "Patient".parse()?;
//! # Ok(())
//! # }
//! ```

pub mod change;
pub mod errors;
pub mod ids;
pub mod record;
pub mod resource;
pub mod result;

pub use change::{ChangeEvent, Operation};
pub use errors::{BridgeError, MappingError};
pub use ids::{ChangeId, TableName, TenantId};
pub use record::{SourceRecord, SourceValue};
pub use resource::{ResourceType, TargetDocument};
pub use result::Result;
