//! Mapping specifications
//!
//! A [`MappingSpec`] is the declarative description of how one source table
//! becomes one resource type. It is plain configuration and can be loaded
//! from JSON or TOML. Before use it is compiled into a
//! [`CompiledMappingSpec`]: paths are parsed and transformation names are
//! resolved exactly once.

use super::path::TargetPath;
use super::transform::Transformation;
use crate::domain::ids::validate_identifier;
use crate::domain::{MappingError, ResourceType, SourceRecord, TableName, TargetDocument};
use serde::{Deserialize, Serialize};

/// Declared FHIR data type of a mapped field
///
/// Informational; values are shaped by their transformation, not by the
/// declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "decimal")]
    Decimal,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "dateTime")]
    DateTime,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "code")]
    Code,
    #[serde(rename = "coding")]
    Coding,
    #[serde(rename = "identifier")]
    Identifier,
}

/// One source column to target path rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_path: String,
    pub data_type: DataType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub transformation: Option<String>,
}

impl FieldMapping {
    /// Convenience constructor used by the built-in specs
    pub fn new(
        source_field: &str,
        target_path: &str,
        data_type: DataType,
        required: bool,
        transformation: Option<&str>,
    ) -> Self {
        Self {
            source_field: source_field.to_string(),
            target_path: target_path.to_string(),
            data_type,
            required,
            transformation: transformation.map(str::to_string),
        }
    }
}

/// Mapping of one source table to one resource type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSpec {
    pub source_table: TableName,
    pub target_resource: ResourceType,
    /// Integer primary-key column of the source table
    ///
    /// Defaults to the source field mapped to `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_column: Option<String>,
    pub field_mappings: Vec<FieldMapping>,
}

/// What to do with transformation names missing from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTransformationPolicy {
    /// Keep the value unchanged and log a warning at compile time
    #[default]
    Passthrough,
    /// Fail compilation
    Reject,
}

/// Options applied while compiling specs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileOptions {
    pub unknown_transformation: UnknownTransformationPolicy,
    pub enforce_required: bool,
}

/// Resolved transformation of a compiled field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTransform {
    /// No transformation configured
    Identity,
    /// Registered transformation
    Apply(Transformation),
    /// Unregistered name kept under the passthrough policy
    Unknown(String),
}

/// A field mapping with its path parsed and transformation resolved
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledField {
    pub source_field: String,
    pub path: TargetPath,
    pub data_type: DataType,
    pub required: bool,
    pub transform: FieldTransform,
}

/// A mapping spec ready for materialization
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledMappingSpec {
    source: MappingSpec,
    key_column: String,
    fields: Vec<CompiledField>,
    enforce_required: bool,
}

impl MappingSpec {
    /// Compiles the spec
    ///
    /// # Errors
    ///
    /// - [`MappingError::InvalidPath`] for a malformed target path or key column
    /// - [`MappingError::UnknownTransformation`] under the reject policy
    pub fn compile(&self, options: CompileOptions) -> Result<CompiledMappingSpec, MappingError> {
        let mut fields = Vec::with_capacity(self.field_mappings.len());
        for mapping in &self.field_mappings {
            let path = TargetPath::parse(&mapping.target_path)?;
            let transform = match mapping.transformation.as_deref() {
                None | Some("") => FieldTransform::Identity,
                Some(name) => match Transformation::from_name(name) {
                    Some(t) => FieldTransform::Apply(t),
                    None => match options.unknown_transformation {
                        UnknownTransformationPolicy::Reject => {
                            return Err(MappingError::UnknownTransformation(name.to_string()));
                        }
                        UnknownTransformationPolicy::Passthrough => {
                            tracing::warn!(
                                table = %self.source_table,
                                field = %mapping.source_field,
                                transformation = %name,
                                "Unknown transformation, value will be passed through unchanged"
                            );
                            FieldTransform::Unknown(name.to_string())
                        }
                    },
                },
            };
            fields.push(CompiledField {
                source_field: mapping.source_field.clone(),
                path,
                data_type: mapping.data_type,
                required: mapping.required,
                transform,
            });
        }

        let key_column = match &self.key_column {
            Some(column) => column.clone(),
            None => self
                .field_mappings
                .iter()
                .find(|m| m.target_path == "id")
                .map(|m| m.source_field.clone())
                .ok_or_else(|| MappingError::InvalidPath {
                    path: "id".to_string(),
                    reason: format!(
                        "mapping for '{}' has no key_column and no field mapped to 'id'",
                        self.source_table
                    ),
                })?,
        };
        validate_identifier(&key_column).map_err(|reason| MappingError::InvalidPath {
            path: key_column.clone(),
            reason,
        })?;

        Ok(CompiledMappingSpec {
            source: self.clone(),
            key_column,
            fields,
            enforce_required: options.enforce_required,
        })
    }
}

impl CompiledMappingSpec {
    /// Source table
    pub fn source_table(&self) -> &TableName {
        &self.source.source_table
    }

    /// Target resource type
    pub fn target_resource(&self) -> ResourceType {
        self.source.target_resource
    }

    /// Integer key column of the source table
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Compiled fields in declaration order
    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    /// The spec this was compiled from
    pub fn spec(&self) -> &MappingSpec {
        &self.source
    }

    /// Materializes `record` into a target document
    ///
    /// Deterministic and free of side effects. Absent columns resolve to
    /// null; a null value skips its path entirely, so optional data never
    /// leaves placeholders behind. Any failing field aborts the document.
    ///
    /// # Errors
    ///
    /// - [`MappingError::PathConflict`] when two paths disagree on a node's shape
    /// - [`MappingError::MissingRequired`] when required fields are enforced
    ///   and one resolves to null
    pub fn materialize(&self, record: &SourceRecord) -> Result<TargetDocument, MappingError> {
        let mut document = TargetDocument::new(self.target_resource());

        for field in &self.fields {
            let value = match record.get(&field.source_field) {
                None => serde_json::Value::Null,
                Some(v) if v.is_null() => serde_json::Value::Null,
                Some(v) => match &field.transform {
                    FieldTransform::Apply(t) => t.apply(v),
                    FieldTransform::Identity | FieldTransform::Unknown(_) => v.to_json(),
                },
            };

            if value.is_null() {
                if field.required && self.enforce_required {
                    return Err(MappingError::MissingRequired {
                        field: field.source_field.clone(),
                        resource: self.target_resource().to_string(),
                    });
                }
                continue;
            }

            field.path.write(document.body_mut(), value)?;
        }

        Ok(document)
    }
}
