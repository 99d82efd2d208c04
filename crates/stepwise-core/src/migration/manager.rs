//! Migration manager - the public entry point.

use super::config::{CancellationToken, MigrationConfig};
use super::error::MigrationError;
use super::executor::MigrationExecutor;
use super::plan::{MigrationPath, PathPlanner};
use super::progress::{ProgressAggregator, ProgressObserver};
use super::state::MigrationRun;
use crate::catalog::{SchemaRegistry, SchemaVersion, VersionId};
use crate::mapping::{MappingProvider, MappingResolver};
use crate::storage::{StoreBackend, StoreLocation, StoreMetadata, StoreType, TransformEngine};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a successful (or dry) migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Run ID (hex).
    pub run_id: String,
    /// Version the store was at.
    pub from_version: VersionId,
    /// Version the store is at now (or would be, for a dry run).
    pub to_version: VersionId,
    /// Mapping names applied, in order.
    pub path: Vec<String>,
    /// Hops executed.
    pub steps_executed: usize,
    /// Whether the store was left untouched on purpose.
    pub dry_run: bool,
}

impl MigrationReport {
    /// Whether the store was already at the final version.
    pub fn was_current(&self) -> bool {
        self.path.is_empty()
    }
}

/// Identifies a store's version, plans a path to the final version and runs it.
pub struct MigrationManager {
    registry: SchemaRegistry,
    backend: Arc<dyn StoreBackend>,
    engine: Arc<dyn TransformEngine>,
    config: MigrationConfig,
    observer: Option<Arc<dyn ProgressObserver>>,
    mapping_provider: Option<Arc<dyn MappingProvider>>,
    cancellation: Option<CancellationToken>,
}

impl MigrationManager {
    /// Create a manager over `registry` using the given collaborators.
    pub fn new(
        registry: SchemaRegistry,
        backend: impl StoreBackend + 'static,
        engine: impl TransformEngine + 'static,
    ) -> Self {
        Self {
            registry,
            backend: Arc::new(backend),
            engine: Arc::new(engine),
            config: MigrationConfig::default(),
            observer: None,
            mapping_provider: None,
            cancellation: None,
        }
    }

    /// Set the run configuration.
    pub fn with_config(mut self, config: MigrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive overall progress.
    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Offer mapping candidates ahead of the registry.
    pub fn with_mapping_provider(mut self, provider: impl MappingProvider + 'static) -> Self {
        self.mapping_provider = Some(Arc::new(provider));
        self
    }

    /// Allow the run to be cancelled between hops.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Run configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Resolver consulting the mapping provider, then the registry.
    pub fn resolver(&self) -> MappingResolver<'_> {
        let resolver = MappingResolver::new(&self.registry);
        match &self.mapping_provider {
            Some(provider) => resolver.with_provider(provider.as_ref()),
            None => resolver,
        }
    }

    /// Identify the store's version and plan a path to `target` without running it.
    pub fn plan_for(
        &self,
        location: &StoreLocation,
        store_type: &StoreType,
        target: &SchemaVersion,
    ) -> Result<MigrationPath, MigrationError> {
        self.prepare(location, store_type, target).map(|(_, path)| path)
    }

    /// Migrate the store at `location` to `target`.
    pub fn migrate(
        &self,
        location: &StoreLocation,
        store_type: &StoreType,
        target: &SchemaVersion,
    ) -> Result<MigrationReport, MigrationError> {
        info!(store = %location, target = %target.id(), "starting migration");

        let (from_version, path) = self
            .prepare(location, store_type, target)
            .inspect_err(|e| {
                warn!(
                    store = %location,
                    category = %e.category(),
                    error = %e,
                    "migration not started"
                )
            })?;

        let mapping_names = path.mapping_names();
        let mut run = MigrationRun::new(location.clone(), store_type.clone(), path);
        info!(
            run_id = %run.run_id_hex(),
            from = %from_version,
            to = %target.id(),
            hops = mapping_names.len(),
            "migration planned"
        );

        if self.config.dry_run {
            info!(run_id = %run.run_id_hex(), path = ?mapping_names, "dry run, store not modified");
            return Ok(MigrationReport {
                run_id: run.run_id_hex(),
                from_version,
                to_version: target.id().clone(),
                path: mapping_names,
                steps_executed: 0,
                dry_run: true,
            });
        }

        let progress = ProgressAggregator::new(run.path.len(), self.observer.as_deref());
        let mut executor = MigrationExecutor::new(
            self.backend.as_ref(),
            self.engine.as_ref(),
            self.resolver(),
            &self.config,
        );
        if let Some(token) = &self.cancellation {
            executor = executor.with_cancellation(token);
        }

        let summary = executor.execute(&mut run, &progress).inspect_err(|e| {
            warn!(
                run_id = %run.run_id_hex(),
                category = %e.category(),
                original_intact = e.original_intact(),
                error = %e,
                "migration failed"
            )
        })?;

        Ok(MigrationReport {
            run_id: run.run_id_hex(),
            from_version,
            to_version: target.id().clone(),
            path: mapping_names,
            steps_executed: summary.steps_executed,
            dry_run: false,
        })
    }

    fn prepare(
        &self,
        location: &StoreLocation,
        store_type: &StoreType,
        target: &SchemaVersion,
    ) -> Result<(VersionId, MigrationPath), MigrationError> {
        let metadata = self.read_metadata(location, store_type)?;
        if target.is_compatible_with(&metadata) {
            return Ok((target.id().clone(), MigrationPath::empty()));
        }

        let current = self.registry.find_version(&metadata).ok_or_else(|| {
            MigrationError::SchemaNotRecognized {
                location: location.clone(),
                reason: format!(
                    "no registered version has fingerprint {} (store recorded {})",
                    metadata.fingerprint_hex(),
                    metadata.schema_id
                ),
                cause: None,
            }
        })?;

        let path = PathPlanner::new(self.resolver())
            .plan(current, target)
            .map_err(|_| MigrationError::NoMigrationPath {
                from: current.id().clone(),
                to: target.id().clone(),
            })?;
        Ok((current.id().clone(), path))
    }

    fn read_metadata(
        &self,
        location: &StoreLocation,
        store_type: &StoreType,
    ) -> Result<StoreMetadata, MigrationError> {
        if self.backend.store_type() != store_type {
            return Err(MigrationError::SchemaNotRecognized {
                location: location.clone(),
                reason: format!(
                    "store type {store_type} is not handled (backend handles {})",
                    self.backend.store_type()
                ),
                cause: None,
            });
        }

        self.backend
            .read_metadata(location)
            .map_err(|e| MigrationError::SchemaNotRecognized {
                location: location.clone(),
                reason: "store metadata could not be read".to_string(),
                cause: Some(e),
            })
    }
}
