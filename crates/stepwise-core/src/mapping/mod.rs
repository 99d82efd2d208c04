//! Mapping models: directed transformation rules between schema versions.

mod resolver;

pub use resolver::{MappingResolver, ResolveError};

use crate::catalog::{SchemaVersion, VersionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle naming the rule a transformation engine applies for a hop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingRule(String);

impl MappingRule {
    /// Rule name understood by every engine: copy records unchanged.
    pub const COPY: &'static str = "copy";

    /// Create a rule handle.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The rule name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MappingRule {
    fn default() -> Self {
        Self::new(Self::COPY)
    }
}

impl fmt::Display for MappingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directed edge `source -> destination` in the version graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Mapping name, unique within a catalog.
    pub name: String,
    /// Version the mapping reads.
    pub source: VersionId,
    /// Version the mapping produces.
    pub destination: VersionId,
    /// Rule handle passed to the transformation engine.
    #[serde(default)]
    pub rule: MappingRule,
}

impl Mapping {
    /// Create a mapping using the copy rule.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<VersionId>,
        destination: impl Into<VersionId>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            destination: destination.into(),
            rule: MappingRule::default(),
        }
    }

    /// Set the rule handle.
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = MappingRule::new(rule);
        self
    }

    /// Whether this mapping is the edge `source -> destination`.
    pub fn connects(&self, source: &VersionId, destination: &VersionId) -> bool {
        &self.source == source && &self.destination == destination
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.name, self.source, self.destination)
    }
}

/// Caller hook supplying mapping candidates ahead of registry discovery.
///
/// Candidates are tried in the order returned. An empty list falls back to
/// the registry.
pub trait MappingProvider: Send + Sync {
    /// Candidate mappings leaving `source`.
    fn mapping_candidates(&self, source: &SchemaVersion) -> Vec<Mapping>;
}

impl<F> MappingProvider for F
where
    F: Fn(&SchemaVersion) -> Vec<Mapping> + Send + Sync,
{
    fn mapping_candidates(&self, source: &SchemaVersion) -> Vec<Mapping> {
        self(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rule_is_copy() {
        let mapping = Mapping::new("v1_to_v2", "v1", "v2");
        assert_eq!(mapping.rule.as_str(), MappingRule::COPY);

        let mapping = mapping.with_rule("split_names");
        assert_eq!(mapping.rule.as_str(), "split_names");
    }

    #[test]
    fn test_connects() {
        let mapping = Mapping::new("v1_to_v2", "v1", "v2");
        assert!(mapping.connects(&"v1".into(), &"v2".into()));
        assert!(!mapping.connects(&"v2".into(), &"v1".into()));
    }

    #[test]
    fn test_closure_provider() {
        let provider = |source: &SchemaVersion| {
            vec![Mapping::new("custom", source.id().clone(), "v9")]
        };
        let candidates = provider.mapping_candidates(&SchemaVersion::new("v1"));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source.as_str(), "v1");
    }

    #[test]
    fn test_display() {
        let mapping = Mapping::new("v1_to_v2", "v1", "v2");
        assert_eq!(mapping.to_string(), "v1_to_v2 (v1 -> v2)");
    }
}
