//! Logging and observability
//!
//! Structured logging through `tracing`, plus a few macros that keep the
//! field names of recurring sync events consistent across modules.
//!
//! ```no_run
//! use fhir_bridge::logging::init_logging;
//! use fhir_bridge::config::LoggingConfig;
//!
//! let _guard = init_logging("info", &LoggingConfig::console_only())
//!     .expect("Failed to initialize logging");
//! tracing::info!(tenant_id = 1, "Bridge started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a sync run
///
/// ```no_run
/// use fhir_bridge::log_sync_start;
///
/// log_sync_start!("full", "full_1_20240101T000000_ab12cd34", 1);
/// ```
#[macro_export]
macro_rules! log_sync_start {
    ($kind:expr, $sync_id:expr, $tenant_id:expr) => {
        tracing::info!(
            kind = $kind,
            sync_id = %$sync_id,
            tenant_id = %$tenant_id,
            "Sync started"
        );
    };
}

/// Log the completion of a sync run
///
/// ```no_run
/// use fhir_bridge::log_sync_complete;
/// use std::time::Duration;
///
/// log_sync_complete!("incremental", "incr_1", 42, 0, Duration::from_millis(350));
/// ```
#[macro_export]
macro_rules! log_sync_complete {
    ($kind:expr, $sync_id:expr, $synced:expr, $errors:expr, $duration:expr) => {
        tracing::info!(
            kind = $kind,
            sync_id = %$sync_id,
            synced = $synced,
            errors = $errors,
            duration_ms = $duration.as_millis() as u64,
            "Sync completed"
        );
    };
}

/// Log a record that was counted as an error and skipped
///
/// ```no_run
/// use fhir_bridge::log_record_error;
///
/// log_record_error!("patients", 17, "Mapping error: ...");
/// ```
#[macro_export]
macro_rules! log_record_error {
    ($table:expr, $record_id:expr, $error:expr) => {
        tracing::warn!(
            table = %$table,
            record_id = $record_id,
            error = %$error,
            "Record skipped"
        );
    };
}
