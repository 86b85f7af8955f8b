//! CLI command implementations
//!
//! Every command returns its process exit code:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Completed with record-level errors |
//! | 2 | Configuration error |
//! | 4 | Database connection error |
//! | 5 | Fatal error |

pub mod capture;
pub mod changes;
pub mod context;
pub mod full_sync;
pub mod incremental;
pub mod init;
pub mod mappings;
pub mod run;
pub mod status;
pub mod validate;

pub const EXIT_OK: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_CONNECTION: i32 = 4;
pub const EXIT_FATAL: i32 = 5;

use crate::core::sync::SyncOutcome;

/// Exit code of a finished sync run
pub fn outcome_exit_code(outcome: &SyncOutcome) -> i32 {
    if !outcome.is_completed() {
        EXIT_FATAL
    } else if outcome.is_partial() {
        EXIT_PARTIAL
    } else {
        EXIT_OK
    }
}
