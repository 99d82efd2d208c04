//! Progressive migration engine.
//!
//! A store written under an older schema version is brought up to a final
//! version one hop at a time:
//! - The store's current version is identified from its metadata fingerprint
//! - A shortest chain of mappings to the final version is planned
//! - Each hop is executed into a fresh scratch store
//! - The last scratch store replaces the original once every hop succeeded
//!
//! A failure at any hop discards the scratch stores and leaves the original
//! store as it was.
//!
//! # Example
//!
//! ```ignore
//! use stepwise_core::migration::MigrationManager;
//! use stepwise_core::storage::{CopyEngine, SledBackend, StoreType};
//!
//! let manager = MigrationManager::new(registry, SledBackend::default(), CopyEngine::default())
//!     .with_observer(|p: f64| println!("{:.0}%", p * 100.0));
//!
//! let report = manager.migrate(&location, &StoreType::sled(), &final_version)?;
//! println!("applied {:?}", report.path);
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod manager;
pub mod plan;
pub mod progress;
pub mod state;

// Config types
pub use config::{CancellationToken, MigrationConfig};

// Error types
pub use error::{FailureCategory, MigrationError, StepFailure};

// Executor types
pub use executor::{ExecutionSummary, MigrationExecutor};

// Manager types
pub use manager::{MigrationManager, MigrationReport};

// Plan types
pub use plan::{Hop, MigrationPath, PathPlanner, PlanError};

// Progress types
pub use progress::{ProgressAggregator, ProgressObserver};

// State types
pub use state::{generate_run_id, MigrationRun, RunStatus, StepProgress, StepStatus};
