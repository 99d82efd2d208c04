//! Command-line arguments and run configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stepwise_core::migration::MigrationConfig;
use stepwise_core::storage::{CopyEngineConfig, SledStoreConfig, StoreLocation};
use stepwise_core::VersionId;

/// Default number of records copied per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "stepwise")]
#[command(version, about = "Progressive schema migration for sled stores", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show a store's schema metadata and the version it matches.
    Inspect(StoreArgs),

    /// Check a catalog for authoring errors.
    Validate {
        /// Path to the JSON catalog.
        #[arg(short, long)]
        catalog: PathBuf,
    },

    /// Show the hops that would bring a store to a version.
    Plan(TargetArgs),

    /// Migrate a store to a version.
    Migrate(MigrateArgs),
}

/// Catalog and store selection.
#[derive(clap::Args, Debug)]
pub struct StoreArgs {
    /// Path to the JSON catalog.
    #[arg(short, long)]
    pub catalog: PathBuf,

    /// Path to the store directory.
    #[arg(short, long)]
    pub store: PathBuf,
}

/// Catalog, store and final version.
#[derive(clap::Args, Debug)]
pub struct TargetArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Version to migrate to.
    #[arg(short, long)]
    pub to: String,
}

/// Arguments of the `migrate` command.
#[derive(clap::Args, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Directory for scratch stores (defaults to the store's parent directory).
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Records copied per batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Plan and report without modifying the store.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip checking each scratch store's schema stamp.
    #[arg(long)]
    pub no_verify: bool,
}

/// Settings for one `migrate` invocation.
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Path to the JSON catalog.
    pub catalog: PathBuf,
    /// Store to migrate.
    pub store: StoreLocation,
    /// Version to migrate to.
    pub target: VersionId,
    /// Sled settings shared by the backend and the copy engine.
    pub store_config: SledStoreConfig,
    /// Copy engine settings.
    pub engine_config: CopyEngineConfig,
    /// Run settings.
    pub migration: MigrationConfig,
}

impl MigrateArgs {
    /// Convert command-line arguments to a migrate configuration.
    pub fn into_config(self) -> MigrateConfig {
        let mut store_config = SledStoreConfig::default();
        if let Some(dir) = self.scratch_dir {
            store_config = store_config.with_scratch_dir(dir);
        }

        MigrateConfig {
            catalog: self.target.store.catalog,
            store: StoreLocation::new(self.target.store.store),
            target: VersionId::new(self.target.to),
            store_config,
            engine_config: CopyEngineConfig::default().with_batch_size(self.batch_size),
            migration: MigrationConfig::default()
                .with_dry_run(self.dry_run)
                .with_verify_steps(!self.no_verify),
        }
    }
}
