//! Single-flight guard for sync runs
//!
//! At most one sync runs per process. A second caller is rejected
//! immediately instead of queued.

use crate::domain::{BridgeError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Busy flag shared by all entry points of one orchestrator
#[derive(Debug, Clone, Default)]
pub struct SyncGuard {
    running: Arc<AtomicBool>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Concurrency`] when a sync is already running.
    pub fn try_acquire(&self) -> Result<SyncPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BridgeError::Concurrency)?;
        Ok(SyncPermit {
            running: Arc::clone(&self.running),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Proof of a claimed guard; releases it on drop
#[derive(Debug)]
pub struct SyncPermit {
    running: Arc<AtomicBool>,
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let guard = SyncGuard::new();
        let permit = guard.try_acquire().unwrap();
        assert!(guard.is_running());
        assert!(matches!(guard.try_acquire(), Err(BridgeError::Concurrency)));

        drop(permit);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_ok());
    }

    #[test]
    fn test_clones_share_the_flag() {
        let guard = SyncGuard::new();
        let other = guard.clone();
        let _permit = guard.try_acquire().unwrap();
        assert!(other.is_running());
        assert!(other.try_acquire().is_err());
    }

    #[test]
    fn test_permit_released_on_panic() {
        let guard = SyncGuard::new();
        let inner = guard.clone();
        let result = std::panic::catch_unwind(move || {
            let _permit = inner.try_acquire().unwrap();
            panic!("sync blew up");
        });
        assert!(result.is_err());
        assert!(!guard.is_running());
    }
}
