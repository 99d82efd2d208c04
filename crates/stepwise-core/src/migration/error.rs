//! Migration-specific error types.

use crate::catalog::VersionId;
use crate::error::Error;
use crate::mapping::ResolveError;
use crate::storage::StoreLocation;
use thiserror::Error;

/// Category of a failed migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// The store's current version could not be identified.
    SchemaNotRecognized,
    /// No chain of mappings connects the current version to the target.
    NoMigrationPath,
    /// A hop failed; the original store is untouched.
    StepExecutionFailed,
    /// All hops succeeded but the migrated store could not be swapped in.
    CommitFailed,
    /// The run was cancelled between steps.
    Cancelled,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCategory::SchemaNotRecognized => write!(f, "schema_not_recognized"),
            FailureCategory::NoMigrationPath => write!(f, "no_migration_path"),
            FailureCategory::StepExecutionFailed => write!(f, "step_execution_failed"),
            FailureCategory::CommitFailed => write!(f, "commit_failed"),
            FailureCategory::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Proximate cause of a failed hop.
#[derive(Debug, Error)]
pub enum StepFailure {
    /// The hop's mapping could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Scratch storage or the transformation engine failed.
    #[error(transparent)]
    Store(#[from] Error),
}

/// Migration errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The store's current version could not be identified.
    #[error("schema of store {location} not recognized: {reason}")]
    SchemaNotRecognized {
        /// The store being migrated.
        location: StoreLocation,
        /// What went wrong.
        reason: String,
        /// Underlying storage error, if any.
        #[source]
        cause: Option<Error>,
    },

    /// No chain of mappings connects the two versions.
    #[error("no migration path from {from} to {to}")]
    NoMigrationPath {
        /// Version the store is at.
        from: VersionId,
        /// Requested final version.
        to: VersionId,
    },

    /// A hop failed. The original store is untouched.
    #[error("step {step_index} ({mapping}) failed: {cause}")]
    StepExecutionFailed {
        /// Zero-based index of the failed hop.
        step_index: usize,
        /// Name of the mapping being applied.
        mapping: String,
        /// Proximate cause.
        #[source]
        cause: StepFailure,
    },

    /// Swapping the migrated store over the original failed.
    #[error("commit failed (original restored: {original_restored}): {cause}")]
    CommitFailed {
        /// Underlying storage error.
        #[source]
        cause: Error,
        /// Whether the original store is in place and unmodified.
        original_restored: bool,
    },

    /// The run was cancelled before a step started.
    #[error("migration cancelled before step {step_index}")]
    Cancelled {
        /// Index of the step that did not run.
        step_index: usize,
    },
}

impl MigrationError {
    /// Failure category.
    pub fn category(&self) -> FailureCategory {
        match self {
            MigrationError::SchemaNotRecognized { .. } => FailureCategory::SchemaNotRecognized,
            MigrationError::NoMigrationPath { .. } => FailureCategory::NoMigrationPath,
            MigrationError::StepExecutionFailed { .. } => FailureCategory::StepExecutionFailed,
            MigrationError::CommitFailed { .. } => FailureCategory::CommitFailed,
            MigrationError::Cancelled { .. } => FailureCategory::Cancelled,
        }
    }

    /// Index of the step the failure is attributed to, if any.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            MigrationError::StepExecutionFailed { step_index, .. }
            | MigrationError::Cancelled { step_index } => Some(*step_index),
            _ => None,
        }
    }

    /// Whether the original store is guaranteed to be unmodified.
    pub fn original_intact(&self) -> bool {
        match self {
            MigrationError::CommitFailed {
                original_restored, ..
            } => *original_restored,
            _ => true,
        }
    }
}
