//! Domain error types
//!
//! This module defines the error hierarchy for fhir-bridge. Errors are
//! domain-specific and don't expose third-party driver types; database
//! failures are flattened into messages at the adapter boundary.

use thiserror::Error;

/// Main fhir-bridge error type
///
/// The variants follow the failure classes of a sync run:
///
/// - [`BridgeError::CaptureInstall`] is fatal for capture setup
/// - [`BridgeError::Read`] aborts the current incremental run and is retryable
/// - [`BridgeError::Mapping`] and [`BridgeError::Load`] concern a single record
///   and are counted, never propagated out of a sync
/// - [`BridgeError::NotFound`] marks a change whose row vanished before re-fetch
/// - [`BridgeError::Concurrency`] rejects a sync while another one is running
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Change log or trigger installation failed
    #[error("Change capture installation failed: {0}")]
    CaptureInstall(String),

    /// Reading the change log failed
    #[error("Change log read failed: {0}")]
    Read(String),

    /// A source record could not be mapped to a target document
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Writing to the target store failed
    #[error("Load error: {0}")]
    Load(String),

    /// The source row referenced by a change no longer exists
    #[error("Record {record_id} not found in table {table}")]
    NotFound { table: String, record_id: i64 },

    /// A sync is already running
    #[error("Sync already in progress")]
    Concurrency,

    /// Database-related errors (generic)
    #[error("Database error: {0}")]
    Database(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// State management errors
    #[error("State management error: {0}")]
    State(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl BridgeError {
    /// Whether the failure only affects a single record.
    ///
    /// Record-level failures are counted in sync statistics instead of
    /// aborting the run.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            BridgeError::Mapping(_) | BridgeError::Load(_) | BridgeError::NotFound { .. }
        )
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Read(_)
                | BridgeError::Connection(_)
                | BridgeError::Database(_)
                | BridgeError::Concurrency
        )
    }
}

/// Mapping-specific errors
///
/// Raised while compiling a mapping spec or while materializing a single
/// document. A materialization error aborts the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// Target path does not follow the `key.key[0].key` grammar
    #[error("Invalid target path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Target path collides with a node of a different shape
    #[error("Target path '{path}' conflicts with an existing {found} node")]
    PathConflict { path: String, found: String },

    /// Transformation name not present in the registry
    #[error("Unknown transformation '{0}'")]
    UnknownTransformation(String),

    /// Required field resolved to null
    #[error("Required field '{field}' is missing for {resource}")]
    MissingRequired { field: String, resource: String },

    /// No mapping spec is registered for the source table
    #[error("No mapping registered for table '{0}'")]
    UnmappedTable(String),
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Configuration(format!("TOML parsing error: {err}"))
    }
}

impl From<tokio_postgres::Error> for BridgeError {
    fn from(err: tokio_postgres::Error) -> Self {
        BridgeError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_display() {
        let err = BridgeError::Configuration("missing tenant".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing tenant");

        let err = BridgeError::NotFound {
            table: "patients".to_string(),
            record_id: 42,
        };
        assert_eq!(err.to_string(), "Record 42 not found in table patients");
    }

    #[test]
    fn test_mapping_error_conversion() {
        let mapping = MappingError::UnknownTransformation("to_upper".to_string());
        let err: BridgeError = mapping.into();
        assert!(matches!(err, BridgeError::Mapping(_)));
        assert_eq!(
            err.to_string(),
            "Mapping error: Unknown transformation 'to_upper'"
        );
    }

    #[test]
    fn test_record_level_classification() {
        assert!(BridgeError::Load("duplicate".to_string()).is_record_level());
        assert!(BridgeError::Mapping(MappingError::UnmappedTable("x".to_string())).is_record_level());
        assert!(!BridgeError::Read("timeout".to_string()).is_record_level());
        assert!(!BridgeError::Concurrency.is_record_level());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(BridgeError::Read("connection reset".to_string()).is_retryable());
        assert!(BridgeError::Concurrency.is_retryable());
        assert!(!BridgeError::CaptureInstall("permission denied".to_string()).is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BridgeError = io_err.into();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: BridgeError = json_err.into();
        assert!(matches!(err, BridgeError::Serialization(_)));
    }
}
