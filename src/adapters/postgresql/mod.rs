//! PostgreSQL integration
//!
//! The source (hospital) database provides mapped tables and hosts the
//! change log installed by [`ChangeCapture`]. The target database stores the
//! materialized FHIR documents and per-tenant sync cursors.

pub mod capture;
pub mod client;
pub mod models;
pub mod reader;
pub mod source;
pub mod target;

pub use capture::{CapturedTable, ChangeCapture};
pub use client::PostgreSQLClient;
pub use models::{ChangeStatistic, PostgreSQLChangeEvent, PostgreSQLCursor};
pub use reader::PostgreSQLChangeReader;
pub use source::PostgreSQLSourceStore;
pub use target::PostgreSQLTargetStore;
