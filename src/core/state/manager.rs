//! State manager for cursor persistence
//!
//! Loads and saves [`SyncCursor`]s through a [`CursorStore`] backend.

use crate::adapters::database::traits::CursorStore;
use crate::core::state::SyncCursor;
use crate::domain::{Result, TenantId};
use std::sync::Arc;

/// State manager for cursor persistence
pub struct StateManager {
    /// Cursor storage backend
    storage: Arc<dyn CursorStore>,
}

impl StateManager {
    /// Create a new StateManager with a cursor storage backend
    pub fn new_with_storage(storage: Arc<dyn CursorStore>) -> Self {
        Self { storage }
    }

    /// Load the cursor of `tenant`
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(SyncCursor))` if found, `Ok(None)` if the tenant was
    /// never synced.
    pub async fn load_cursor(&self, tenant: TenantId) -> Result<Option<SyncCursor>> {
        self.storage.load_cursor(tenant).await
    }

    /// Save a cursor (upsert)
    pub async fn save_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        self.storage.save_cursor(cursor).await
    }

    /// Persist the cursor after a run
    ///
    /// Same as [`StateManager::save_cursor`] with a checkpoint log line.
    pub async fn checkpoint(&self, cursor: &SyncCursor) -> Result<()> {
        tracing::info!(
            tenant_id = %cursor.tenant_id,
            last_change_id = %cursor.last_change_id,
            "Checkpointing sync cursor"
        );

        self.save_cursor(cursor).await
    }
}
