//! Migration configuration and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Migration run configuration.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Plan and report without touching the store.
    pub dry_run: bool,
    /// Check each scratch store's schema stamp after its hop.
    ///
    /// Scratch stores are stamped with the destination schema when they are
    /// created, so this only catches an engine that rewrites or drops the
    /// stamp. It does not inspect the records the engine wrote.
    pub verify_steps: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            verify_steps: true,
        }
    }
}

impl MigrationConfig {
    /// Enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable or disable per-hop stamp verification.
    pub fn with_verify_steps(mut self, verify_steps: bool) -> Self {
        self.verify_steps = verify_steps;
        self
    }
}

/// Shared flag asking a running migration to stop before its next hop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Visible to every clone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
