//! Core types and the update pipeline building blocks

pub mod cache;
pub mod config;
pub mod error;
pub mod freshness;
pub mod log;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod source;
pub mod storage;

// Re-export main types for cleaner imports
pub use cache::SnapshotCache;
pub use error::UpdateError;
pub use models::{CurrencyRecord, Snapshot, UpdateTimestamp};
pub use storage::DurableStorage;
