//! MaxMind GeoLite2 CSV ingestion.
//!
//! This module provides:
//! - Row shapes for the provider's block and location files
//! - The location hierarchy builder
//! - The archive reader feeding decoded entries to the importer

mod archive;
mod hierarchy;
mod models;

// Re-export public API
pub use archive::{classify_entry, read_archive, ArchiveEntry, EntryKind};
pub use hierarchy::{HierarchyResult, LocationTree};
pub use models::{MaxMindBlock, MaxMindLocation};
