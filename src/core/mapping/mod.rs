//! Mapping engine
//!
//! Turns flat source records into nested target documents using declarative
//! [`MappingSpec`]s. Specs are compiled once into [`CompiledMappingSpec`]s
//! and held by a [`MappingRegistry`]; [`MappingEngine`] resolves the spec for
//! a source table and materializes records through it.
//!
//! ```rust
//! use fhir_bridge::core::mapping::{CompileOptions, MappingEngine, MappingRegistry};
//! use fhir_bridge::domain::SourceRecord;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = MappingEngine::new(MappingRegistry::builtin(CompileOptions::default())?);
//! let record = SourceRecord::new().with("patient_id", 1).with("gender", "m");
//! let document = engine.map_record("patients", &record)?;
//! assert_eq!(document.pointer("/gender").and_then(|v| v.as_str()), Some("male"));
//! # Ok(())
//! # }
//! ```

pub mod path;
pub mod registry;
pub mod spec;
pub mod transform;

pub use path::{PathStep, TargetPath};
pub use registry::{builtin_specs, MappingRegistry};
pub use spec::{
    CompileOptions, CompiledField, CompiledMappingSpec, DataType, FieldMapping, FieldTransform,
    MappingSpec, UnknownTransformationPolicy,
};
pub use transform::Transformation;

use crate::config::MappingConfig;
use crate::domain::{MappingError, SourceRecord, TargetDocument};
use std::sync::Arc;

/// Materializes `record` through `spec`
///
/// See [`CompiledMappingSpec::materialize`].
pub fn materialize(
    spec: &CompiledMappingSpec,
    record: &SourceRecord,
) -> Result<TargetDocument, MappingError> {
    spec.materialize(record)
}

/// Table-aware front end of the mapping registry
#[derive(Debug, Clone)]
pub struct MappingEngine {
    registry: Arc<MappingRegistry>,
}

impl MappingEngine {
    /// Creates an engine over `registry`
    pub fn new(registry: MappingRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Builds the engine from the `[mapping]` section
    ///
    /// Loads `specs_path` when set, the built-in specs otherwise.
    pub fn from_config(config: &MappingConfig) -> crate::domain::Result<Self> {
        let options = config.compile_options();
        let registry = match config.specs_path {
            Some(ref path) => MappingRegistry::from_file(path, options)?,
            None => MappingRegistry::builtin(options)?,
        };
        Ok(Self::new(registry))
    }

    /// The underlying registry
    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    /// Spec registered for `table`
    pub fn spec_for(&self, table: &str) -> Option<&CompiledMappingSpec> {
        self.registry.by_table(table)
    }

    /// Maps a record of `table`
    ///
    /// # Errors
    ///
    /// [`MappingError::UnmappedTable`] when no spec exists for the table,
    /// otherwise whatever materialization reports.
    pub fn map_record(
        &self,
        table: &str,
        record: &SourceRecord,
    ) -> Result<TargetDocument, MappingError> {
        let spec = self
            .spec_for(table)
            .ok_or_else(|| MappingError::UnmappedTable(table.to_string()))?;
        materialize(spec, record)
    }
}
