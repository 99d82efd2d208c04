//! Stepwise Core - schema registry, path planning and migration execution.
//!
//! This crate provides the progressive schema migration engine for stepwise.

pub mod catalog;
pub mod error;
pub mod mapping;
pub mod migration;
pub mod storage;

pub use catalog::{
    load_catalog, EntityShape, FieldShape, Fingerprint, RegistryIssue, SchemaRegistry,
    SchemaVersion, VersionId,
};
pub use error::Error;
pub use mapping::{Mapping, MappingProvider, MappingResolver, MappingRule, ResolveError};
pub use migration::{
    CancellationToken, FailureCategory, MigrationConfig, MigrationError, MigrationManager,
    MigrationPath, MigrationReport, PathPlanner, ProgressObserver,
};
pub use storage::{
    CopyEngine, CopyEngineConfig, RecordTransform, SledBackend, SledStoreConfig, StoreBackend,
    StoreLocation, StoreMetadata, StoreType, TransformEngine,
};
