//! Core error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the storage layer, the catalog and the transformation engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// No store exists at the given location.
    #[error("store not found at {}", .0.display())]
    StoreNotFound(PathBuf),

    /// The path exists but does not hold a sled database.
    #[error("no sled store at {}", .0.display())]
    NotAStore(PathBuf),

    /// A backup from an earlier swap is still in place.
    #[error("backup store already exists at {}", .0.display())]
    BackupExists(PathBuf),

    /// The store exists but carries no schema metadata.
    #[error("store at {} has no schema metadata", .0.display())]
    MissingMetadata(PathBuf),

    /// The catalog could not be loaded.
    #[error("invalid catalog: {0}")]
    Catalog(String),

    /// The transformation engine failed to apply a mapping.
    #[error("transform failed: {0}")]
    Transform(String),

    /// A store was produced that does not match the expected schema.
    #[error("schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch {
        /// Version the store should conform to.
        expected: String,
        /// Version recorded in the store.
        found: String,
    },
}
