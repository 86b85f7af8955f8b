//! Mapping registry
//!
//! Holds the compiled mapping specs in dependency order: resources that are
//! referenced by others (patients) come before the resources referencing
//! them (encounters, observations, medication requests).

use super::spec::{CompileOptions, CompiledMappingSpec, DataType, FieldMapping, MappingSpec};
use crate::domain::{BridgeError, ResourceType, Result, TableName};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File format of an external mapping file
#[derive(Debug, Deserialize)]
struct MappingFile {
    mappings: Vec<MappingSpec>,
}

#[derive(Serialize)]
struct MappingFileRef<'a> {
    mappings: Vec<&'a MappingSpec>,
}

/// Compiled mapping specs, ordered by dependency
#[derive(Debug, Clone)]
pub struct MappingRegistry {
    specs: Vec<CompiledMappingSpec>,
}

impl MappingRegistry {
    /// Compiles `specs`, keeping their order
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a spec fails to compile or two specs
    /// share a source table.
    pub fn from_specs(specs: Vec<MappingSpec>, options: CompileOptions) -> Result<Self> {
        let mut compiled: Vec<CompiledMappingSpec> = Vec::with_capacity(specs.len());
        for spec in specs {
            if compiled
                .iter()
                .any(|c| c.source_table() == &spec.source_table)
            {
                return Err(BridgeError::Configuration(format!(
                    "Duplicate mapping for table '{}'",
                    spec.source_table
                )));
            }
            let spec = spec.compile(options).map_err(|e| {
                BridgeError::Configuration(format!(
                    "Invalid mapping for table '{}': {}",
                    spec.source_table, e
                ))
            })?;
            compiled.push(spec);
        }

        tracing::debug!(mappings = compiled.len(), "Mapping registry compiled");
        Ok(Self { specs: compiled })
    }

    /// Registry with the built-in hospital schema mappings
    pub fn builtin(options: CompileOptions) -> Result<Self> {
        Self::from_specs(builtin_specs(), options)
    }

    /// Loads specs from a JSON or TOML file
    ///
    /// The file holds a top-level `mappings` array; the format is chosen by
    /// extension (`.json`, otherwise TOML).
    pub fn from_file(path: impl AsRef<Path>, options: CompileOptions) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Configuration(format!(
                "Failed to read mapping file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: MappingFile = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents)?
        } else {
            toml::from_str(&contents)?
        };

        tracing::info!(
            path = %path.display(),
            mappings = file.mappings.len(),
            "Loaded mapping specs from file"
        );
        Self::from_specs(file.mappings, options)
    }

    /// Spec for a source table
    pub fn by_table(&self, table: &str) -> Option<&CompiledMappingSpec> {
        self.specs.iter().find(|s| s.source_table().as_str() == table)
    }

    /// First spec producing `resource`
    pub fn by_resource(&self, resource: ResourceType) -> Option<&CompiledMappingSpec> {
        self.specs.iter().find(|s| s.target_resource() == resource)
    }

    /// Specs in dependency order
    pub fn iter(&self) -> impl Iterator<Item = &CompiledMappingSpec> {
        self.specs.iter()
    }

    /// Source tables in dependency order
    pub fn tables(&self) -> Vec<TableName> {
        self.specs.iter().map(|s| s.source_table().clone()).collect()
    }

    /// Number of specs
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Pretty JSON of all specs, loadable again with [`MappingRegistry::from_file`]
    pub fn export_json(&self) -> Result<String> {
        let file = MappingFileRef {
            mappings: self.specs.iter().map(|s| s.spec()).collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }
}

fn table(name: &str) -> TableName {
    TableName::new(name).unwrap_or_else(|e| unreachable!("built-in table name: {e}"))
}

/// The built-in mapping specs, in dependency order
pub fn builtin_specs() -> Vec<MappingSpec> {
    use DataType::*;

    vec![
        MappingSpec {
            source_table: table("patients"),
            target_resource: ResourceType::Patient,
            key_column: Some("patient_id".to_string()),
            field_mappings: vec![
                FieldMapping::new("patient_id", "id", Integer, true, Some("to_string")),
                FieldMapping::new("medical_record_number", "identifier[0].value", String, true, None),
                FieldMapping::new("first_name", "name[0].given[0]", String, true, None),
                FieldMapping::new("last_name", "name[0].family", String, true, None),
                FieldMapping::new("date_of_birth", "birthDate", Date, true, Some("format_date")),
                FieldMapping::new("gender", "gender", Code, false, Some("normalize_gender")),
                FieldMapping::new("phone_number", "telecom[0].value", String, false, None),
                FieldMapping::new("email", "telecom[1].value", String, false, None),
                FieldMapping::new("address_line1", "address[0].line[0]", String, false, None),
                FieldMapping::new("city", "address[0].city", String, false, None),
                FieldMapping::new("state", "address[0].state", String, false, None),
                FieldMapping::new("zip_code", "address[0].postalCode", String, false, None),
            ],
        },
        MappingSpec {
            source_table: table("encounters"),
            target_resource: ResourceType::Encounter,
            key_column: Some("encounter_id".to_string()),
            field_mappings: vec![
                FieldMapping::new("encounter_id", "id", Integer, true, Some("to_string")),
                FieldMapping::new("patient_id", "subject.reference", Integer, true, Some("patient_reference")),
                FieldMapping::new("encounter_type", "class.code", Code, true, Some("map_encounter_class")),
                FieldMapping::new("admission_date", "period.start", DateTime, true, Some("format_datetime")),
                FieldMapping::new("discharge_date", "period.end", DateTime, false, Some("format_datetime")),
                FieldMapping::new("status", "status", Code, true, Some("map_encounter_status")),
                FieldMapping::new("chief_complaint", "reasonCode[0].text", String, false, None),
                FieldMapping::new("diagnosis", "diagnosis[0].condition.display", String, false, None),
                FieldMapping::new("attending_physician", "participant[0].individual.display", String, false, None),
                FieldMapping::new("department", "serviceType.text", String, false, None),
            ],
        },
        MappingSpec {
            source_table: table("lab_results"),
            target_resource: ResourceType::Observation,
            key_column: Some("lab_id".to_string()),
            field_mappings: vec![
                FieldMapping::new("lab_id", "id", Integer, true, Some("to_string")),
                FieldMapping::new("patient_id", "subject.reference", Integer, true, Some("patient_reference")),
                FieldMapping::new("encounter_id", "encounter.reference", Integer, false, Some("encounter_reference")),
                FieldMapping::new("test_name", "code.text", String, true, None),
                FieldMapping::new("test_code", "code.coding[0].code", String, false, None),
                FieldMapping::new("result_value", "valueQuantity.value", Decimal, false, Some("to_decimal")),
                FieldMapping::new("result_unit", "valueQuantity.unit", String, false, None),
                FieldMapping::new("reference_range", "referenceRange[0].text", String, false, None),
                FieldMapping::new("abnormal_flag", "interpretation[0].coding[0].code", Code, false, Some("map_abnormal_flag")),
                FieldMapping::new("performed_date", "effectiveDateTime", DateTime, true, Some("format_datetime")),
            ],
        },
        MappingSpec {
            source_table: table("medications"),
            target_resource: ResourceType::MedicationRequest,
            key_column: Some("medication_id".to_string()),
            field_mappings: vec![
                FieldMapping::new("medication_id", "id", Integer, true, Some("to_string")),
                FieldMapping::new("patient_id", "subject.reference", Integer, true, Some("patient_reference")),
                FieldMapping::new("encounter_id", "encounter.reference", Integer, false, Some("encounter_reference")),
                FieldMapping::new("medication_name", "medicationCodeableConcept.text", String, true, None),
                FieldMapping::new(
                    "dosage",
                    "dosageInstruction[0].doseAndRate[0].doseQuantity.value",
                    String,
                    false,
                    Some("extract_dosage_value"),
                ),
                FieldMapping::new("frequency", "dosageInstruction[0].timing.code.text", String, false, None),
                FieldMapping::new("route", "dosageInstruction[0].route.text", String, false, None),
                FieldMapping::new("start_date", "authoredOn", Date, true, Some("format_date")),
                FieldMapping::new("status", "status", Code, true, Some("map_medication_status")),
            ],
        },
    ]
}
