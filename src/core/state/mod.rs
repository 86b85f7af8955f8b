// Sync state and cursor persistence

pub mod manager;
#[allow(clippy::module_inception)]
pub mod state;

pub use manager::StateManager;
pub use state::{SyncCursor, SyncState, DEFAULT_HISTORY_SIZE};
