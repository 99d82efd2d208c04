//! JSON catalog files.
//!
//! ```json
//! {
//!   "versions": [
//!     { "id": "v1", "entities": [{ "name": "User", "fields": [{ "name": "id", "type": "uuid" }] }] }
//!   ],
//!   "mappings": [
//!     { "name": "v1_to_v2", "source": "v1", "destination": "v2", "rule": "copy" }
//!   ]
//! }
//! ```

use super::{EntityShape, SchemaRegistry, SchemaVersion, VersionId};
use crate::error::Error;
use crate::mapping::Mapping;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    versions: Vec<VersionEntry>,
    #[serde(default)]
    mappings: Vec<Mapping>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionEntry {
    id: VersionId,
    #[serde(default)]
    entities: Vec<EntityShape>,
}

impl SchemaRegistry {
    /// Parse a registry from a JSON catalog document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let file: CatalogFile =
            serde_json::from_str(json).map_err(|e| Error::Catalog(e.to_string()))?;

        let mut registry = SchemaRegistry::new();
        for entry in file.versions {
            registry.register_version(SchemaVersion::from_parts(entry.id, entry.entities));
        }
        for mapping in file.mappings {
            registry.register_mapping(mapping);
        }
        Ok(registry)
    }

    /// Render the registry as a JSON catalog document.
    pub fn to_json(&self) -> Result<String, Error> {
        let file = CatalogFile {
            versions: self
                .all_versions()
                .iter()
                .map(|v| VersionEntry {
                    id: v.id().clone(),
                    entities: v.entities().to_vec(),
                })
                .collect(),
            mappings: self.mappings().to_vec(),
        };
        serde_json::to_string_pretty(&file).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Load a registry from a JSON catalog file.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<SchemaRegistry, Error> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let registry = SchemaRegistry::from_json(&json)?;
    tracing::debug!(
        path = %path.display(),
        versions = registry.all_versions().len(),
        mappings = registry.mappings().len(),
        "catalog loaded"
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "versions": [
            { "id": "v1", "entities": [{ "name": "User", "fields": [{ "name": "id", "type": "uuid" }] }] },
            { "id": "v2", "entities": [{ "name": "User", "fields": [
                { "name": "id", "type": "uuid" },
                { "name": "email", "type": "string", "optional": true }
            ] }] }
        ],
        "mappings": [
            { "name": "v1_to_v2", "source": "v1", "destination": "v2" },
            { "name": "v2_to_v1", "source": "v2", "destination": "v1", "rule": "drop_email" }
        ]
    }"#;

    #[test]
    fn test_parse_catalog() {
        let registry = SchemaRegistry::from_json(CATALOG).unwrap();

        assert_eq!(registry.all_versions().len(), 2);
        assert_eq!(registry.mappings().len(), 2);
        assert_eq!(registry.mappings()[0].rule.as_str(), "copy");
        assert_eq!(registry.mappings()[1].rule.as_str(), "drop_email");

        let v2 = registry.version(&"v2".into()).unwrap();
        assert!(v2.entity("User").unwrap().fields[1].optional);
    }

    #[test]
    fn test_catalog_round_trip_keeps_fingerprints() {
        let registry = SchemaRegistry::from_json(CATALOG).unwrap();
        let reparsed = SchemaRegistry::from_json(&registry.to_json().unwrap()).unwrap();

        for (a, b) in registry.all_versions().iter().zip(reparsed.all_versions()) {
            assert_eq!(a, b);
        }
        assert_eq!(registry.mappings(), reparsed.mappings());
    }

    #[test]
    fn test_malformed_catalog() {
        let result = SchemaRegistry::from_json("{ \"versions\": 3 }");
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_load_catalog_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, CATALOG).unwrap();

        let registry = load_catalog(&path).unwrap();
        assert_eq!(registry.all_versions().len(), 2);

        let missing = load_catalog(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
