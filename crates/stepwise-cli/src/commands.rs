//! Command implementations.
//!
//! Each command writes its human-readable output to `out`; logs go through
//! `tracing`.

use crate::config::MigrateConfig;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use stepwise_core::migration::{MigrationError, MigrationManager};
use stepwise_core::storage::{CopyEngine, SledBackend, StoreBackend, StoreLocation, StoreType};
use stepwise_core::{load_catalog, FailureCategory, SchemaRegistry, SchemaVersion, VersionId};
use thiserror::Error;
use tracing::info;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Catalog or store access failed.
    #[error(transparent)]
    Core(#[from] stepwise_core::Error),

    /// Planning or migration failed.
    #[error("{category}: {source}")]
    Migration {
        /// Failure category.
        category: FailureCategory,
        /// The migration error.
        #[source]
        source: MigrationError,
    },

    /// The requested version is not in the catalog.
    #[error("version {0} is not in the catalog")]
    UnknownVersion(VersionId),

    /// Writing output failed.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

impl From<MigrationError> for CliError {
    fn from(source: MigrationError) -> Self {
        CliError::Migration {
            category: source.category(),
            source,
        }
    }
}

fn target_version(registry: &SchemaRegistry, id: &VersionId) -> Result<SchemaVersion, CliError> {
    registry
        .version(id)
        .cloned()
        .ok_or_else(|| CliError::UnknownVersion(id.clone()))
}

/// Print a store's metadata and the catalog version it matches.
pub fn inspect(catalog: &Path, store: &StoreLocation, out: &mut impl Write) -> Result<(), CliError> {
    let registry = load_catalog(catalog)?;
    let metadata = SledBackend::default().read_metadata(store)?;

    writeln!(out, "store:        {store}")?;
    writeln!(out, "schema id:    {}", metadata.schema_id)?;
    writeln!(out, "fingerprint:  {}", metadata.fingerprint_hex())?;
    writeln!(out, "stamped at:   {}", metadata.stamped_at)?;
    match registry.find_version(&metadata) {
        Some(version) => writeln!(out, "version:      {version}")?,
        None => writeln!(out, "version:      not recognized")?,
    }
    Ok(())
}

/// Print catalog issues. Returns whether the catalog is clean.
pub fn validate(catalog: &Path, out: &mut impl Write) -> Result<bool, CliError> {
    let registry = load_catalog(catalog)?;
    let issues = registry.validate();

    writeln!(
        out,
        "{} versions, {} mappings",
        registry.all_versions().len(),
        registry.mappings().len()
    )?;
    for issue in &issues {
        writeln!(out, "issue: {issue}")?;
    }
    if issues.is_empty() {
        writeln!(out, "catalog ok")?;
    }
    Ok(issues.is_empty())
}

/// Print the hops that would bring `store` to version `to`.
pub fn plan(
    catalog: &Path,
    store: &StoreLocation,
    to: &VersionId,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let registry = load_catalog(catalog)?;
    let target = target_version(&registry, to)?;
    let manager = MigrationManager::new(registry, SledBackend::default(), CopyEngine::default());

    let path = manager.plan_for(store, &StoreType::sled(), &target)?;
    if path.is_empty() {
        writeln!(out, "store is already at {to}")?;
        return Ok(());
    }
    for (index, hop) in path.hops().iter().enumerate() {
        writeln!(
            out,
            "{index}: {} -> {} via {} (rule {})",
            hop.source.id(),
            hop.destination.id(),
            hop.mapping.name,
            hop.mapping.rule
        )?;
    }
    Ok(())
}

/// Run a migration.
pub fn migrate(config: MigrateConfig, out: &mut impl Write) -> Result<(), CliError> {
    let registry = load_catalog(&config.catalog)?;
    let target = target_version(&registry, &config.target)?;

    let backend = SledBackend::new(config.store_config.clone());
    let engine = CopyEngine::new(config.store_config, config.engine_config);
    let last_decile = AtomicU32::new(0);
    let manager = MigrationManager::new(registry, backend, engine)
        .with_config(config.migration)
        .with_observer(move |progress: f64| {
            let decile = (progress * 10.0).floor() as u32;
            if decile > last_decile.fetch_max(decile, Ordering::Relaxed) {
                info!(percent = decile * 10, "migration progress");
            }
        });

    let report = manager.migrate(&config.store, &StoreType::sled(), &target)?;
    if report.dry_run {
        writeln!(out, "dry run: store not modified")?;
    }
    if report.was_current() {
        writeln!(out, "store is already at {}", report.to_version)?;
    } else {
        writeln!(
            out,
            "{} -> {} via {}",
            report.from_version,
            report.to_version,
            report.path.join(", ")
        )?;
    }
    writeln!(out, "run {}: {} steps executed", report.run_id, report.steps_executed)?;
    Ok(())
}
