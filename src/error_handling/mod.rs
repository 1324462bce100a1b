//! Error handling and import statistics.
//!
//! This module provides:
//! - Error type definitions for every boundary (codec, storage, lookup, update)
//! - Failure categorization for update outcomes
//! - Row defect statistics for recoverable, skipped input
//!
//! Defects are split into two classes:
//! - **Recoverable**: a bad line, value, column or entry. Logged, counted, skipped.
//! - **Fatal**: anything that would leave the dataset inconsistent. Aborts the
//!   update and rolls the replace transaction back.

mod stats;
mod types;

// Re-export public API
pub use stats::ImportStats;
pub use types::{
    CodecError, DatabaseError, FailureCategory, InitializationError, LookupError, RowDefect,
    UpdateError,
};
