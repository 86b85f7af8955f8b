//! Store abstraction layer
//!
//! This module defines the trait seams between the sync core and the
//! databases it talks to, so the core can run against PostgreSQL or
//! in-memory fakes.

pub mod factory;
pub mod traits;

pub use factory::{create_stores, Stores};
pub use traits::{
    ChangeLogRetention, ChangeReader, CursorStore, LoadFailure, LoadItem, LoadReport,
    ReadRequest, SourceStore, TargetStore,
};
