//! Schema catalog for stepwise.
//!
//! The catalog holds the known schema versions and the mappings between them.

mod file;
mod registry;
mod version;

pub use file::load_catalog;
pub use registry::{RegistryIssue, SchemaRegistry};
pub use version::{EntityShape, FieldShape, Fingerprint, SchemaVersion, VersionId};
