//! Migration paths and the planner that discovers them.

use crate::catalog::{SchemaVersion, VersionId};
use crate::mapping::{Mapping, MappingResolver};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::{debug, warn};

/// Planning failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// No chain of mappings connects the two versions.
    #[error("no migration path from {from} to {to}")]
    NoPathFound {
        /// Starting version.
        from: VersionId,
        /// Requested final version.
        to: VersionId,
    },

    /// A hop does not start where the previous hop ends.
    #[error("hop {index} does not continue from the previous hop")]
    Disconnected {
        /// Index of the offending hop.
        index: usize,
    },
}

/// One hop of a migration: apply `mapping` to go from `source` to `destination`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    /// Version the hop reads.
    pub source: SchemaVersion,
    /// Mapping applied.
    pub mapping: Mapping,
    /// Version the hop produces.
    pub destination: SchemaVersion,
}

/// Ordered chain of hops. Consecutive hops are always connected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationPath {
    hops: Vec<Hop>,
}

impl MigrationPath {
    /// The zero-hop path.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a path, checking every hop continues from the previous one.
    pub fn from_hops(hops: Vec<Hop>) -> Result<Self, PlanError> {
        for (index, pair) in hops.windows(2).enumerate() {
            if pair[0].destination.id() != pair[1].source.id() {
                return Err(PlanError::Disconnected { index: index + 1 });
            }
        }
        Ok(Self { hops })
    }

    /// The hops in execution order.
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Number of hops.
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Whether the path has no hops.
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Version the first hop reads.
    pub fn source(&self) -> Option<&SchemaVersion> {
        self.hops.first().map(|h| &h.source)
    }

    /// Version the last hop produces.
    pub fn destination(&self) -> Option<&SchemaVersion> {
        self.hops.last().map(|h| &h.destination)
    }

    /// Mapping names in execution order.
    pub fn mapping_names(&self) -> Vec<String> {
        self.hops.iter().map(|h| h.mapping.name.clone()).collect()
    }
}

/// Breadth-first planner over the version graph.
///
/// Outgoing edges of a version come from [`MappingResolver::candidates_from`],
/// so caller overrides are explored before registry mappings and win among
/// paths of equal length.
pub struct PathPlanner<'a> {
    resolver: MappingResolver<'a>,
}

impl<'a> PathPlanner<'a> {
    /// Create a planner using `resolver` for edges.
    pub fn new(resolver: MappingResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Find a shortest path from `current` to `target`.
    pub fn plan(
        &self,
        current: &SchemaVersion,
        target: &SchemaVersion,
    ) -> Result<MigrationPath, PlanError> {
        if current == target {
            return Ok(MigrationPath::empty());
        }

        let registry = self.resolver.registry();
        let mut nodes: HashMap<VersionId, SchemaVersion> = HashMap::new();
        let mut parents: HashMap<VersionId, (VersionId, Mapping)> = HashMap::new();
        let mut queue = VecDeque::new();

        nodes.insert(current.id().clone(), current.clone());
        queue.push_back(current.clone());

        while let Some(node) = queue.pop_front() {
            for mapping in self.resolver.candidates_from(&node) {
                if nodes.contains_key(&mapping.destination) {
                    continue;
                }

                let destination = if &mapping.destination == target.id() {
                    target.clone()
                } else {
                    match registry.version(&mapping.destination) {
                        Some(version) => version.clone(),
                        None => {
                            warn!(
                                mapping = %mapping.name,
                                destination = %mapping.destination,
                                "skipping mapping to unregistered version"
                            );
                            continue;
                        }
                    }
                };

                let id = destination.id().clone();
                nodes.insert(id.clone(), destination.clone());
                parents.insert(id.clone(), (node.id().clone(), mapping));

                if &id == target.id() {
                    let path = Self::assemble(&nodes, &parents, current.id(), id)?;
                    debug!(
                        from = %current.id(),
                        to = %target.id(),
                        hops = path.len(),
                        "migration path found"
                    );
                    return Ok(path);
                }
                queue.push_back(destination);
            }
        }

        Err(PlanError::NoPathFound {
            from: current.id().clone(),
            to: target.id().clone(),
        })
    }

    fn assemble(
        nodes: &HashMap<VersionId, SchemaVersion>,
        parents: &HashMap<VersionId, (VersionId, Mapping)>,
        start: &VersionId,
        end: VersionId,
    ) -> Result<MigrationPath, PlanError> {
        let mut hops = Vec::new();
        let mut cursor = end;
        while &cursor != start {
            let Some((previous, mapping)) = parents.get(&cursor) else {
                break;
            };
            let (Some(source), Some(destination)) = (nodes.get(previous), nodes.get(&cursor)) else {
                break;
            };
            hops.push(Hop {
                source: source.clone(),
                mapping: mapping.clone(),
                destination: destination.clone(),
            });
            cursor = previous.clone();
        }
        hops.reverse();
        MigrationPath::from_hops(hops)
    }
}
