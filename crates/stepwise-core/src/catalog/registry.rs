//! Schema registry: the catalog of known versions and mappings.

use super::{SchemaVersion, VersionId};
use crate::mapping::Mapping;
use crate::storage::StoreMetadata;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// An authoring problem found in a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryIssue {
    /// Two versions share an identifier.
    DuplicateVersion(VersionId),
    /// Two versions have identical structure, so stores cannot tell them apart.
    DuplicateFingerprint {
        /// The version registered first.
        first: VersionId,
        /// The version registered later.
        second: VersionId,
    },
    /// More than one mapping connects the same pair of versions.
    DuplicateMapping {
        /// Shared source version.
        source: VersionId,
        /// Shared destination version.
        destination: VersionId,
        /// Names of the mappings, in registration order.
        names: Vec<String>,
    },
    /// Two mappings share a name.
    DuplicateMappingName(String),
    /// A mapping refers to a version that is not registered.
    UnknownVersion {
        /// Mapping name.
        mapping: String,
        /// The missing version.
        version: VersionId,
    },
    /// A mapping whose source and destination are the same version.
    SelfMapping(String),
}

impl fmt::Display for RegistryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryIssue::DuplicateVersion(id) => write!(f, "version {id} registered twice"),
            RegistryIssue::DuplicateFingerprint { first, second } => {
                write!(f, "versions {first} and {second} have identical structure")
            }
            RegistryIssue::DuplicateMapping {
                source,
                destination,
                names,
            } => write!(
                f,
                "ambiguous mappings {source} -> {destination}: {} (first wins)",
                names.join(", ")
            ),
            RegistryIssue::DuplicateMappingName(name) => {
                write!(f, "mapping name {name} used more than once")
            }
            RegistryIssue::UnknownVersion { mapping, version } => {
                write!(f, "mapping {mapping} refers to unknown version {version}")
            }
            RegistryIssue::SelfMapping(name) => {
                write!(f, "mapping {name} maps a version onto itself")
            }
        }
    }
}

/// Catalog of known schema versions and the mappings between them.
///
/// Registration order is significant: lookups that could match more than one
/// entry return the one registered first.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    versions: Vec<SchemaVersion>,
    mappings: Vec<Mapping>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a version.
    pub fn with_version(mut self, version: SchemaVersion) -> Self {
        self.register_version(version);
        self
    }

    /// Add a mapping.
    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.register_mapping(mapping);
        self
    }

    /// Register a version.
    pub fn register_version(&mut self, version: SchemaVersion) {
        self.versions.push(version);
    }

    /// Register a mapping.
    pub fn register_mapping(&mut self, mapping: Mapping) {
        self.mappings.push(mapping);
    }

    /// Identify the version a store conforms to from its metadata.
    ///
    /// A version whose id matches the one recorded in the metadata is
    /// preferred; otherwise the first version with a matching fingerprint.
    pub fn find_version(&self, metadata: &StoreMetadata) -> Option<&SchemaVersion> {
        let mut compatible = self
            .versions
            .iter()
            .filter(|v| v.is_compatible_with(metadata));
        let first = compatible.next()?;
        if first.id().as_str() == metadata.schema_id {
            return Some(first);
        }
        compatible
            .find(|v| v.id().as_str() == metadata.schema_id)
            .or(Some(first))
    }

    /// Look up a version by id.
    pub fn version(&self, id: &VersionId) -> Option<&SchemaVersion> {
        self.versions.iter().find(|v| v.id() == id)
    }

    /// All versions in registration order.
    pub fn all_versions(&self) -> &[SchemaVersion] {
        &self.versions
    }

    /// All mappings in registration order.
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Mappings leaving `source`, in registration order.
    pub fn mappings_from<'a>(
        &'a self,
        source: &'a VersionId,
    ) -> impl Iterator<Item = &'a Mapping> + 'a {
        self.mappings.iter().filter(move |m| &m.source == source)
    }

    /// Mappings connecting `source` to `destination`, in registration order.
    pub fn mappings_between(&self, source: &VersionId, destination: &VersionId) -> Vec<&Mapping> {
        self.mappings
            .iter()
            .filter(|m| m.connects(source, destination))
            .collect()
    }

    /// Check the registry for authoring errors.
    pub fn validate(&self) -> Vec<RegistryIssue> {
        let mut issues = Vec::new();

        let mut ids = HashSet::new();
        let mut fingerprints: HashMap<_, &VersionId> = HashMap::new();
        for version in &self.versions {
            if !ids.insert(version.id()) {
                issues.push(RegistryIssue::DuplicateVersion(version.id().clone()));
                continue;
            }
            match fingerprints.get(&version.fingerprint()) {
                Some(first) => issues.push(RegistryIssue::DuplicateFingerprint {
                    first: (*first).clone(),
                    second: version.id().clone(),
                }),
                None => {
                    fingerprints.insert(version.fingerprint(), version.id());
                }
            }
        }

        let mut names = HashSet::new();
        let mut pairs: Vec<((&VersionId, &VersionId), Vec<String>)> = Vec::new();
        for mapping in &self.mappings {
            if !names.insert(mapping.name.as_str()) {
                issues.push(RegistryIssue::DuplicateMappingName(mapping.name.clone()));
            }
            if mapping.source == mapping.destination {
                issues.push(RegistryIssue::SelfMapping(mapping.name.clone()));
            }
            for version in [&mapping.source, &mapping.destination] {
                if self.version(version).is_none() {
                    issues.push(RegistryIssue::UnknownVersion {
                        mapping: mapping.name.clone(),
                        version: version.clone(),
                    });
                }
            }

            let pair = (&mapping.source, &mapping.destination);
            match pairs.iter_mut().find(|(p, _)| *p == pair) {
                Some((_, group)) => group.push(mapping.name.clone()),
                None => pairs.push((pair, vec![mapping.name.clone()])),
            }
        }

        for ((source, destination), group) in pairs {
            if group.len() > 1 {
                issues.push(RegistryIssue::DuplicateMapping {
                    source: source.clone(),
                    destination: destination.clone(),
                    names: group,
                });
            }
        }

        issues
    }
}
