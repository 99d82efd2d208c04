//! Mapping resolution: choosing the mapping for a single hop.

use super::{Mapping, MappingProvider};
use crate::catalog::{SchemaRegistry, SchemaVersion, VersionId};
use crate::migration::Hop;
use thiserror::Error;
use tracing::warn;

/// Mapping resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No known mapping connects the two versions.
    #[error("no mapping from {from} to {to}")]
    NotFound {
        /// Source version.
        from: VersionId,
        /// Destination version.
        to: VersionId,
    },

    /// The hop was planned with a mapping that no longer resolves.
    #[error("planned mapping {planned} no longer resolves for {from} -> {to} (resolved {resolved})")]
    Stale {
        /// Mapping chosen at planning time.
        planned: String,
        /// Mapping resolution currently returns.
        resolved: String,
        /// Source version.
        from: VersionId,
        /// Destination version.
        to: VersionId,
    },
}

/// Resolves mappings from caller overrides first, then the registry.
#[derive(Clone, Copy)]
pub struct MappingResolver<'a> {
    registry: &'a SchemaRegistry,
    provider: Option<&'a dyn MappingProvider>,
}

impl<'a> MappingResolver<'a> {
    /// Create a resolver backed by the registry only.
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            provider: None,
        }
    }

    /// Consult `provider` before the registry.
    pub fn with_provider(mut self, provider: &'a dyn MappingProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// The registry this resolver scans.
    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    /// Override candidates for `source`, with mis-sourced entries removed.
    fn override_candidates(&self, source: &SchemaVersion) -> Vec<Mapping> {
        let Some(provider) = self.provider else {
            return Vec::new();
        };

        provider
            .mapping_candidates(source)
            .into_iter()
            .filter(|m| {
                if &m.source == source.id() {
                    true
                } else {
                    warn!(
                        mapping = %m.name,
                        expected = %source.id(),
                        actual = %m.source,
                        "ignoring override candidate with wrong source"
                    );
                    false
                }
            })
            .collect()
    }

    /// Resolve the mapping for the hop `source -> destination`.
    ///
    /// Override candidates win over the registry. Among registry mappings the
    /// first registered wins; duplicates are reported as an authoring error.
    pub fn resolve(
        &self,
        source: &SchemaVersion,
        destination: &SchemaVersion,
    ) -> Result<Mapping, ResolveError> {
        if let Some(mapping) = self
            .override_candidates(source)
            .into_iter()
            .find(|m| &m.destination == destination.id())
        {
            return Ok(mapping);
        }

        let matches = self.registry.mappings_between(source.id(), destination.id());
        if matches.len() > 1 {
            warn!(
                from = %source.id(),
                to = %destination.id(),
                chosen = %matches[0].name,
                count = matches.len(),
                "registry has ambiguous mappings, using the first registered"
            );
        }

        matches
            .first()
            .map(|m| (*m).clone())
            .ok_or_else(|| ResolveError::NotFound {
                from: source.id().clone(),
                to: destination.id().clone(),
            })
    }

    /// Outgoing edges of `source`: override candidates, then registry mappings.
    pub fn candidates_from(&self, source: &SchemaVersion) -> Vec<Mapping> {
        let mut candidates = self.override_candidates(source);
        for mapping in self.registry.mappings_from(source.id()) {
            if !candidates.contains(mapping) {
                candidates.push(mapping.clone());
            }
        }
        candidates
    }

    /// Re-resolve a planned hop, checking it still maps to the planned mapping.
    pub fn resolve_hop(&self, hop: &Hop) -> Result<Mapping, ResolveError> {
        let resolved = self.resolve(&hop.source, &hop.destination)?;
        if resolved == hop.mapping {
            Ok(resolved)
        } else {
            Err(ResolveError::Stale {
                planned: hop.mapping.name.clone(),
                resolved: resolved.name,
                from: hop.source.id().clone(),
                to: hop.destination.id().clone(),
            })
        }
    }
}
