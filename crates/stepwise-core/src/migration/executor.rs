//! Migration executor - walks a planned path one hop at a time.
//!
//! Each hop reads the previous hop's output (the original store for the
//! first hop) and writes into a fresh scratch store. The original is only
//! touched by the final swap, after every hop has succeeded.

use super::config::{CancellationToken, MigrationConfig};
use super::error::{MigrationError, StepFailure};
use super::plan::Hop;
use super::progress::ProgressAggregator;
use super::state::MigrationRun;
use crate::error::Error;
use crate::mapping::MappingResolver;
use crate::storage::{ReplaceError, StoreBackend, StoreLocation, TransformEngine};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

/// Scratch store discarded when dropped unless disarmed.
struct ScratchStore<'a> {
    backend: &'a dyn StoreBackend,
    location: StoreLocation,
    armed: bool,
}

impl<'a> ScratchStore<'a> {
    fn new(backend: &'a dyn StoreBackend, location: StoreLocation) -> Self {
        Self {
            backend,
            location,
            armed: true,
        }
    }

    fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Keep the store on disk.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ScratchStore<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.backend.discard(&self.location) {
            warn!(scratch = %self.location, error = %e, "failed to discard scratch store");
        }
    }
}

/// Result of a successful execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Hops executed.
    pub steps_executed: usize,
    /// Hops in the path.
    pub total_steps: usize,
}

/// Executes the path of a [`MigrationRun`].
pub struct MigrationExecutor<'a> {
    backend: &'a dyn StoreBackend,
    engine: &'a dyn TransformEngine,
    resolver: MappingResolver<'a>,
    config: &'a MigrationConfig,
    cancellation: Option<&'a CancellationToken>,
}

impl<'a> MigrationExecutor<'a> {
    /// Create an executor.
    pub fn new(
        backend: &'a dyn StoreBackend,
        engine: &'a dyn TransformEngine,
        resolver: MappingResolver<'a>,
        config: &'a MigrationConfig,
    ) -> Self {
        Self {
            backend,
            engine,
            resolver,
            config,
            cancellation: None,
        }
    }

    /// Stop before the next hop once `token` is cancelled.
    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.is_some_and(CancellationToken::is_cancelled)
    }

    /// Execute every hop of `run`, then swap the result over the original.
    pub fn execute(
        &self,
        run: &mut MigrationRun,
        progress: &ProgressAggregator<'_>,
    ) -> Result<ExecutionSummary, MigrationError> {
        let total_steps = run.path.len();
        run.start();
        info!(
            run_id = %run.run_id_hex(),
            store = %run.location,
            steps = total_steps,
            "executing migration"
        );

        let hops: Vec<Hop> = run.path.hops().to_vec();
        let mut input: Option<ScratchStore<'a>> = None;

        for (index, hop) in hops.iter().enumerate() {
            if self.is_cancelled() {
                info!(run_id = %run.run_id_hex(), step = index, "migration cancelled");
                run.fail(Some(index), "cancelled");
                return Err(MigrationError::Cancelled { step_index: index });
            }

            run.begin_step(index);
            let source = match &input {
                Some(scratch) => scratch.location().clone(),
                None => run.location.clone(),
            };
            let tag = run.scratch_tag(index);
            let fraction = Mutex::new(0.0);

            match self.execute_step(index, hop, &source, &run.location, &tag, progress, &fraction) {
                Ok(output) => {
                    run.complete_step(index);
                    // Replacing the input drops and discards the previous scratch store.
                    input = Some(output);
                }
                Err(cause) => {
                    let fraction = *fraction.lock();
                    run.update_step(index, fraction);
                    run.fail(Some(index), cause.to_string());
                    warn!(
                        run_id = %run.run_id_hex(),
                        step = index,
                        mapping = %hop.mapping.name,
                        error = %cause,
                        "migration step failed"
                    );
                    return Err(MigrationError::StepExecutionFailed {
                        step_index: index,
                        mapping: hop.mapping.name.clone(),
                        cause,
                    });
                }
            }
        }

        if let Some(output) = input {
            self.commit(run, output)?;
        }

        run.succeed();
        progress.finish();
        info!(run_id = %run.run_id_hex(), store = %run.location, "migration complete");

        Ok(ExecutionSummary {
            steps_executed: total_steps,
            total_steps,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_step(
        &self,
        index: usize,
        hop: &Hop,
        input: &StoreLocation,
        original: &StoreLocation,
        tag: &str,
        progress: &ProgressAggregator<'_>,
        fraction: &Mutex<f64>,
    ) -> Result<ScratchStore<'a>, StepFailure> {
        let mapping = self.resolver.resolve_hop(hop)?;

        let location = self.backend.create_scratch(original, tag, &hop.destination)?;
        let scratch = ScratchStore::new(self.backend, location);
        debug!(
            step = index,
            mapping = %mapping.name,
            input = %input,
            scratch = %scratch.location(),
            "executing step"
        );

        let report = |p: f64| {
            *fraction.lock() = p;
            progress.on_step_progress(index, p);
        };
        self.engine
            .transform(input, &mapping, scratch.location(), &report)?;

        // The stamp was written by create_scratch; a mismatch means the engine
        // overwrote it.
        if self.config.verify_steps {
            let metadata = self.backend.read_metadata(scratch.location())?;
            if !hop.destination.is_compatible_with(&metadata) {
                return Err(Error::SchemaMismatch {
                    expected: hop.destination.to_string(),
                    found: metadata.schema_id,
                }
                .into());
            }
        }

        progress.on_step_progress(index, 1.0);
        debug!(step = index, mapping = %mapping.name, "step complete");
        Ok(scratch)
    }

    fn commit(&self, run: &mut MigrationRun, output: ScratchStore<'_>) -> Result<(), MigrationError> {
        match self.backend.replace(&run.location, output.location()) {
            Ok(()) => {
                output.disarm();
                Ok(())
            }
            Err(ReplaceError {
                cause,
                original_restored,
            }) => {
                if original_restored {
                    warn!(store = %run.location, error = %cause, "commit failed, original restored");
                } else {
                    error!(
                        store = %run.location,
                        migrated = %output.location(),
                        error = %cause,
                        "commit failed, original not restored; keeping migrated store"
                    );
                    output.disarm();
                }
                run.fail(None, cause.to_string());
                Err(MigrationError::CommitFailed {
                    cause,
                    original_restored,
                })
            }
        }
    }
}
