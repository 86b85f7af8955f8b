//! Change-driven synchronization
//!
//! - [`orchestrator`] - full and incremental sync runs
//! - [`guard`] - single-flight execution
//! - [`stats`] - per-run counters and outcomes

pub mod guard;
pub mod orchestrator;
pub mod stats;

pub use guard::{SyncGuard, SyncPermit};
pub use orchestrator::{SyncOrchestrator, SyncSettings, SyncStatusReport};
pub use stats::{
    EntityStats, FullSyncStats, IncrementalStats, SyncKind, SyncOutcome, SyncStats, SyncStatus,
};
