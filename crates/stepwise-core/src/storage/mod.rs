//! Storage boundary for stepwise.
//!
//! The migration engine never touches store files directly. It goes through a
//! [`StoreBackend`] for metadata, scratch stores and the final swap, and through
//! a [`TransformEngine`] to move records across a single hop. Sled-based
//! implementations of both are provided.

mod config;
mod copy_engine;
mod metadata;
mod sled_backend;

pub use config::{CopyEngineConfig, SledStoreConfig};
pub use copy_engine::{CopyEngine, RecordTransform};
pub use metadata::{current_timestamp, StoreMetadata};
pub use sled_backend::SledBackend;

use crate::catalog::SchemaVersion;
use crate::error::Error;
use crate::mapping::Mapping;
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque location handle of a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreLocation(PathBuf);

impl StoreLocation {
    /// Create a location from a path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Filesystem path of the store.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for StoreLocation {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for StoreLocation {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<&str> for StoreLocation {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

/// Identifier of a store format, e.g. `"sled"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreType(String);

impl StoreType {
    /// Create a store type identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The sled directory store.
    pub fn sled() -> Self {
        Self::new("sled")
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure of the final swap of a migrated store over the original.
#[derive(Debug, thiserror::Error)]
#[error("replace failed (original restored: {original_restored}): {cause}")]
pub struct ReplaceError {
    /// The underlying failure.
    #[source]
    pub cause: Error,
    /// Whether the original store is in place and unmodified.
    pub original_restored: bool,
}

impl ReplaceError {
    /// A failure that happened before the original was moved.
    pub fn untouched(cause: impl Into<Error>) -> Self {
        Self {
            cause: cause.into(),
            original_restored: true,
        }
    }
}

/// Physical store operations needed by the migration executor.
pub trait StoreBackend: Send + Sync {
    /// The store format this backend handles.
    fn store_type(&self) -> &StoreType;

    /// Read the schema metadata of the store at `location`.
    fn read_metadata(&self, location: &StoreLocation) -> Result<StoreMetadata, Error>;

    /// Create an empty scratch store next to `original`, stamped with `schema`.
    ///
    /// `tag` is unique per run and step.
    fn create_scratch(
        &self,
        original: &StoreLocation,
        tag: &str,
        schema: &SchemaVersion,
    ) -> Result<StoreLocation, Error>;

    /// Delete a scratch store. Deleting a missing store succeeds.
    fn discard(&self, location: &StoreLocation) -> Result<(), Error>;

    /// Replace the contents of `original` with `replacement`.
    ///
    /// On success `replacement` no longer exists. Either the original is fully
    /// replaced or, when `original_restored` is reported, fully untouched.
    fn replace(
        &self,
        original: &StoreLocation,
        replacement: &StoreLocation,
    ) -> Result<(), ReplaceError>;
}

/// Moves all records of one store into another across a single mapping.
pub trait TransformEngine: Send + Sync {
    /// Transform `source` into `destination` using `mapping`.
    ///
    /// `progress` receives the completed fraction in `[0.0, 1.0]` and may be
    /// called from any thread.
    fn transform(
        &self,
        source: &StoreLocation,
        mapping: &Mapping,
        destination: &StoreLocation,
        progress: &(dyn Fn(f64) + Sync),
    ) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let location = StoreLocation::from("/var/lib/app/store");
        assert_eq!(location.to_string(), "/var/lib/app/store");
        assert_eq!(location.path(), Path::new("/var/lib/app/store"));
    }

    #[test]
    fn test_store_type() {
        assert_eq!(StoreType::sled().as_str(), "sled");
        assert_eq!(StoreType::sled(), StoreType::new("sled"));
    }

    #[test]
    fn test_replace_error_display() {
        let err = ReplaceError::untouched(Error::Transform("disk full".to_string()));
        assert!(err.original_restored);
        assert!(err.to_string().contains("original restored: true"));
    }
}
