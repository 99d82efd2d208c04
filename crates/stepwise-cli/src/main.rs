//! Stepwise - progressive schema migration for sled stores.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stepwise_cli::{commands, Args, Command};
use stepwise_core::storage::StoreLocation;
use stepwise_core::VersionId;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stepwise=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut out = std::io::stdout().lock();

    match args.command {
        Command::Inspect(store) => {
            commands::inspect(&store.catalog, &StoreLocation::new(store.store), &mut out)?;
        }
        Command::Validate { catalog } => {
            if !commands::validate(&catalog, &mut out)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Plan(target) => {
            commands::plan(
                &target.store.catalog,
                &StoreLocation::new(target.store.store),
                &VersionId::new(target.to),
                &mut out,
            )?;
        }
        Command::Migrate(migrate) => {
            let config = migrate.into_config();
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                store = %config.store,
                target = %config.target,
                dry_run = config.migration.dry_run,
                "starting stepwise"
            );
            if let Err(e) = commands::migrate(config, &mut out) {
                tracing::error!(error = %e, "migration failed");
                return Err(e.into());
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
