//! Target resource types and documents

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Key of the resource-type discriminator in every target document
pub const RESOURCE_TYPE_KEY: &str = "resourceType";

/// FHIR R4 resource types the bridge can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Patient,
    Encounter,
    Observation,
    MedicationRequest,
    Condition,
    Procedure,
    DiagnosticReport,
}

impl ResourceType {
    /// All supported resource types
    pub const ALL: [ResourceType; 7] = [
        ResourceType::Patient,
        ResourceType::Encounter,
        ResourceType::Observation,
        ResourceType::MedicationRequest,
        ResourceType::Condition,
        ResourceType::Procedure,
        ResourceType::DiagnosticReport,
    ];

    /// FHIR name of the resource type
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::Encounter => "Encounter",
            ResourceType::Observation => "Observation",
            ResourceType::MedicationRequest => "MedicationRequest",
            ResourceType::Condition => "Condition",
            ResourceType::Procedure => "Procedure",
            ResourceType::DiagnosticReport => "DiagnosticReport",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    /// Parses the FHIR name, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|rt| rt.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown FHIR resource type '{s}'"))
    }
}

/// A materialized target document
///
/// The first key is always `resourceType`. Keys keep the order in which the
/// mapping wrote them, so serializing the same document twice yields the
/// same bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDocument {
    resource_type: ResourceType,
    body: Map<String, Value>,
}

impl TargetDocument {
    /// Creates a document holding only the discriminator
    pub fn new(resource_type: ResourceType) -> Self {
        let mut body = Map::new();
        body.insert(
            RESOURCE_TYPE_KEY.to_string(),
            Value::String(resource_type.as_str().to_string()),
        );
        Self {
            resource_type,
            body,
        }
    }

    /// Resource type discriminator
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Top-level object
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub(crate) fn body_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.body
    }

    /// Looks up a node by JSON pointer, e.g. `/name/0/given/0`
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        if let Some(rest) = pointer.strip_prefix('/') {
            let (head, tail) = match rest.find('/') {
                Some(idx) => (&rest[..idx], &rest[idx..]),
                None => (rest, ""),
            };
            let node = self.body.get(head)?;
            if tail.is_empty() {
                Some(node)
            } else {
                node.pointer(tail)
            }
        } else {
            None
        }
    }

    /// The `id` element, when present
    pub fn id(&self) -> Option<&str> {
        self.body.get("id").and_then(Value::as_str)
    }

    /// Document as a JSON value
    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }

    /// Consumes the document into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }

    /// SHA-256 of the serialized document, hex encoded
    ///
    /// Used by the target store to skip rewriting unchanged documents.
    pub fn content_hash(&self) -> String {
        let bytes = serde_json::to_vec(&self.body).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl Serialize for TargetDocument {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.body.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_type_from_str() {
        assert_eq!(
            ResourceType::from_str("MedicationRequest").unwrap(),
            ResourceType::MedicationRequest
        );
        assert_eq!(
            ResourceType::from_str("patient").unwrap(),
            ResourceType::Patient
        );
        assert!(ResourceType::from_str("Appointment").is_err());
    }

    #[test]
    fn test_new_document_carries_discriminator() {
        let doc = TargetDocument::new(ResourceType::Observation);
        assert_eq!(doc.to_value(), json!({"resourceType": "Observation"}));
        assert_eq!(doc.id(), None);
    }

    #[test]
    fn test_pointer_lookup() {
        let mut doc = TargetDocument::new(ResourceType::Patient);
        doc.body_mut()
            .insert("name".to_string(), json!([{"given": ["Ada"]}]));
        assert_eq!(doc.pointer("/name/0/given/0"), Some(&json!("Ada")));
        assert_eq!(doc.pointer("/resourceType"), Some(&json!("Patient")));
        assert_eq!(doc.pointer("/name/1"), None);
        assert_eq!(doc.pointer("name"), None);
    }

    #[test]
    fn test_content_hash_is_stable_and_sensitive() {
        let mut a = TargetDocument::new(ResourceType::Patient);
        a.body_mut().insert("id".to_string(), json!("1"));
        let mut b = a.clone();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);

        b.body_mut().insert("gender".to_string(), json!("female"));
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
