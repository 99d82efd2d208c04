//! Schema versions and their structural fingerprints.

use crate::storage::StoreMetadata;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a schema version (e.g. `"v3"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    /// Create a version identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A field of an entity as seen by the migration engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldShape {
    /// Field name.
    pub name: String,
    /// Storage type name (opaque to the engine).
    #[serde(rename = "type")]
    pub field_type: String,
    /// Whether the field may be absent.
    #[serde(default)]
    pub optional: bool,
}

/// An entity and its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityShape {
    /// Entity name.
    pub name: String,
    /// Field definitions.
    #[serde(default)]
    pub fields: Vec<FieldShape>,
}

impl EntityShape {
    /// Create an entity with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required field.
    pub fn with_field(mut self, name: impl Into<String>, field_type: impl Into<String>) -> Self {
        self.fields.push(FieldShape {
            name: name.into(),
            field_type: field_type.into(),
            optional: false,
        });
        self
    }

    /// Add an optional field.
    pub fn with_optional_field(
        mut self,
        name: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldShape {
            name: name.into(),
            field_type: field_type.into(),
            optional: true,
        });
        self
    }
}

/// blake3 digest of a schema's canonical structure.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

/// One known version of the store's structure.
///
/// Entities are kept sorted by name so that the fingerprint does not depend on
/// declaration order. Field order inside an entity is part of the structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaVersion {
    id: VersionId,
    entities: Vec<EntityShape>,
    fingerprint: Fingerprint,
}

impl SchemaVersion {
    /// Create a version with no entities.
    pub fn new(id: impl Into<VersionId>) -> Self {
        Self::from_parts(id, Vec::new())
    }

    /// Create a version from its entity list.
    pub fn from_parts(id: impl Into<VersionId>, mut entities: Vec<EntityShape>) -> Self {
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        let fingerprint = compute_fingerprint(&entities);
        Self {
            id: id.into(),
            entities,
            fingerprint,
        }
    }

    /// Add an entity.
    pub fn with_entity(self, entity: EntityShape) -> Self {
        let mut entities = self.entities;
        entities.push(entity);
        Self::from_parts(self.id, entities)
    }

    /// Version identifier.
    pub fn id(&self) -> &VersionId {
        &self.id
    }

    /// Entities in name order.
    pub fn entities(&self) -> &[EntityShape] {
        &self.entities
    }

    /// Look up an entity by name.
    pub fn entity(&self, name: &str) -> Option<&EntityShape> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Structural fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Whether a store with this metadata conforms to this version.
    pub fn is_compatible_with(&self, metadata: &StoreMetadata) -> bool {
        metadata.fingerprint == *self.fingerprint.as_bytes()
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.fingerprint)
    }
}

fn compute_fingerprint(entities: &[EntityShape]) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    for entity in entities {
        hasher.update(b"entity\0");
        hasher.update(entity.name.as_bytes());
        hasher.update(b"\0");
        for field in &entity.fields {
            hasher.update(field.name.as_bytes());
            hasher.update(b":");
            hasher.update(field.field_type.as_bytes());
            hasher.update(if field.optional { b"?\0" } else { b"!\0" });
        }
    }
    Fingerprint(*hasher.finalize().as_bytes())
}
