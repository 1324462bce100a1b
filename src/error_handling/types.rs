//! Error type definitions.
//!
//! This module defines all error types used throughout the application, plus
//! the categories of recoverable row-level defects tracked during an import.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Schema migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored column holds a value that does not map onto its domain type.
    #[error("Invalid value {value:?} in column {column}")]
    InvalidValue {
        /// Column the value was read from.
        column: &'static str,
        /// Offending stored value.
        value: String,
    },
}

/// Error types for the range codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A CIDR network could not be parsed.
    #[error("Malformed network: {0:?}")]
    MalformedNetwork(String),

    /// A literal address could not be parsed.
    #[error("Malformed address: {0:?}")]
    MalformedAddress(String),
}

/// Error types for address lookups.
#[derive(Error, Debug)]
pub enum LookupError {
    /// The queried address is not a valid IPv4 or IPv6 address.
    #[error(transparent)]
    MalformedAddress(#[from] CodecError),

    /// The storage engine failed to answer.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Error types that abort a dataset update.
///
/// Any of these rolls the replace transaction back; the previous dataset
/// stays current.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Downloading the archive failed.
    #[error("Archive download failed: {0}")]
    Download(#[from] ReqwestError),

    /// The archive exceeds the configured size limit.
    #[error("Archive too large: {size} bytes (max: {limit} bytes)")]
    ArchiveTooLarge {
        /// Announced or observed size in bytes.
        size: u64,
        /// Configured limit in bytes.
        limit: u64,
    },

    /// Reading or writing the archive file failed.
    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive is not a readable ZIP file.
    #[error("Archive format error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A network or address could not be normalized.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The storage engine failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The update was cancelled before it could commit.
    #[error("Update cancelled")]
    Cancelled,

    /// The archive reader thread died.
    #[error("Archive reader failed: {0}")]
    Worker(String),
}

impl UpdateError {
    /// Returns the category of this failure.
    pub fn category(&self) -> FailureCategory {
        match self {
            UpdateError::Download(_)
            | UpdateError::ArchiveTooLarge { .. }
            | UpdateError::Io(_)
            | UpdateError::Archive(_)
            | UpdateError::Worker(_) => FailureCategory::Transport,
            UpdateError::Codec(_) => FailureCategory::MalformedInput,
            UpdateError::Database(_) => FailureCategory::Storage,
            UpdateError::Cancelled => FailureCategory::Cancelled,
        }
    }
}

/// Coarse classification of update failures, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum FailureCategory {
    /// Download or archive I/O failed.
    Transport,
    /// A network or address in the data could not be parsed.
    MalformedInput,
    /// A transaction or query failed.
    Storage,
    /// The run was cancelled (e.g. by shutdown).
    Cancelled,
}

impl FailureCategory {
    /// Short label used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Transport => "transport failure",
            FailureCategory::MalformedInput => "malformed input",
            FailureCategory::Storage => "storage failure",
            FailureCategory::Cancelled => "cancelled",
        }
    }
}

/// Recoverable defects met while importing. Each is logged and skipped;
/// none of them aborts an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum RowDefect {
    /// A body line whose field count differs from the header's.
    InvalidLine,
    /// A field whose text could not be converted to its declared type.
    InvalidValue,
    /// A header column with no matching field in the record shape.
    UnknownColumn,
    /// A header column whose field type has no scalar converter.
    UnsupportedField,
    /// A location row carrying no level data at all.
    EmptyLocation,
    /// An archive entry with an unrecognized name or data type.
    SkippedEntry,
}

impl RowDefect {
    /// Short label used in the import summary.
    pub fn as_str(&self) -> &'static str {
        match self {
            RowDefect::InvalidLine => "invalid line",
            RowDefect::InvalidValue => "invalid value",
            RowDefect::UnknownColumn => "unknown column",
            RowDefect::UnsupportedField => "unsupported field",
            RowDefect::EmptyLocation => "empty location",
            RowDefect::SkippedEntry => "skipped entry",
        }
    }
}

impl std::fmt::Display for RowDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
