//! Runtime state of a migration run.
//!
//! A [`MigrationRun`] lives for one `migrate` call. It records the planned
//! path, the status of every hop and the outcome, and names the scratch
//! stores the run creates.

use super::plan::MigrationPath;
use crate::storage::{current_timestamp, StoreLocation, StoreType};
use std::sync::atomic::{AtomicU64, Ordering};

/// Status of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Created, no hop started.
    NotStarted,
    /// Executing hop `step`.
    Running {
        /// Index of the hop in progress.
        step: usize,
    },
    /// Every hop ran and the result replaced the original.
    Succeeded,
    /// The run stopped.
    Failed {
        /// Hop the failure is attributed to, if any.
        step: Option<usize>,
        /// Failure description.
        cause: String,
    },
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::NotStarted => write!(f, "not_started"),
            RunStatus::Running { step } => write!(f, "running(step {step})"),
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::Failed { step: Some(step), .. } => write!(f, "failed(step {step})"),
            RunStatus::Failed { step: None, .. } => write!(f, "failed"),
        }
    }
}

/// Status of a single hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Hop not yet started.
    Pending,
    /// Hop in progress.
    InProgress,
    /// Hop completed.
    Complete,
    /// Hop failed.
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::InProgress => write!(f, "in_progress"),
            StepStatus::Complete => write!(f, "complete"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Progress of a single hop.
#[derive(Debug, Clone)]
pub struct StepProgress {
    /// Index of the hop in the path.
    pub step_index: usize,
    /// Name of the mapping applied.
    pub mapping: String,
    /// Current status.
    pub status: StepStatus,
    /// Local fraction done.
    pub fraction: f64,
    /// When the hop started (microseconds since epoch).
    pub started_at: Option<u64>,
    /// When the hop finished (microseconds since epoch).
    pub completed_at: Option<u64>,
    /// Error text if the hop failed.
    pub error: Option<String>,
}

impl StepProgress {
    /// Create a pending entry.
    pub fn new(step_index: usize, mapping: impl Into<String>) -> Self {
        Self {
            step_index,
            mapping: mapping.into(),
            status: StepStatus::Pending,
            fraction: 0.0,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Mark the hop as started.
    pub fn start(&mut self) {
        self.status = StepStatus::InProgress;
        self.started_at = Some(current_timestamp());
    }

    /// Mark the hop as completed.
    pub fn complete(&mut self) {
        self.status = StepStatus::Complete;
        self.fraction = 1.0;
        self.completed_at = Some(current_timestamp());
    }

    /// Mark the hop as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.completed_at = Some(current_timestamp());
        self.error = Some(error.into());
    }
}

/// One migration run against one store.
#[derive(Debug, Clone)]
pub struct MigrationRun {
    /// Unique run ID.
    pub run_id: [u8; 16],
    /// The store being migrated.
    pub location: StoreLocation,
    /// Its type.
    pub store_type: StoreType,
    /// Planned hops.
    pub path: MigrationPath,
    /// Run status.
    pub status: RunStatus,
    /// Index of the hop being (or last) executed.
    pub current_step: usize,
    /// Per-hop progress.
    pub steps: Vec<StepProgress>,
    /// When the run started (microseconds since epoch).
    pub started_at: Option<u64>,
    /// When the run reached a terminal status.
    pub completed_at: Option<u64>,
}

impl MigrationRun {
    /// Create a run for `path` with a fresh ID.
    pub fn new(location: StoreLocation, store_type: StoreType, path: MigrationPath) -> Self {
        let steps = path
            .hops()
            .iter()
            .enumerate()
            .map(|(index, hop)| StepProgress::new(index, hop.mapping.name.clone()))
            .collect();

        Self {
            run_id: generate_run_id(),
            location,
            store_type,
            path,
            status: RunStatus::NotStarted,
            current_step: 0,
            steps,
            started_at: None,
            completed_at: None,
        }
    }

    /// Run ID as hex.
    pub fn run_id_hex(&self) -> String {
        hex::encode(self.run_id)
    }

    /// Record the start of the run.
    pub fn start(&mut self) {
        self.started_at = Some(current_timestamp());
    }

    /// Record the start of hop `step`.
    pub fn begin_step(&mut self, step: usize) {
        self.current_step = step;
        self.status = RunStatus::Running { step };
        if let Some(progress) = self.steps.get_mut(step) {
            progress.start();
        }
    }

    /// Record local progress of hop `step`.
    pub fn update_step(&mut self, step: usize, fraction: f64) {
        if let Some(progress) = self.steps.get_mut(step) {
            progress.fraction = fraction.clamp(0.0, 1.0);
        }
    }

    /// Record the completion of hop `step`.
    pub fn complete_step(&mut self, step: usize) {
        if let Some(progress) = self.steps.get_mut(step) {
            progress.complete();
        }
    }

    /// Record a failure, attributed to `step` when given.
    pub fn fail(&mut self, step: Option<usize>, cause: impl Into<String>) {
        let cause = cause.into();
        if let Some(progress) = step.and_then(|s| self.steps.get_mut(s)) {
            progress.fail(cause.clone());
        }
        self.status = RunStatus::Failed { step, cause };
        self.completed_at = Some(current_timestamp());
    }

    /// Record success.
    pub fn succeed(&mut self) {
        self.status = RunStatus::Succeeded;
        self.completed_at = Some(current_timestamp());
    }

    /// Whether the run has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RunStatus::Succeeded | RunStatus::Failed { .. })
    }

    /// Cumulative progress in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.status == RunStatus::Succeeded {
            return 1.0;
        }
        if self.steps.is_empty() {
            return 0.0;
        }
        let done: f64 = self.steps.iter().map(|s| s.fraction).sum();
        done / self.steps.len() as f64
    }

    /// Tag identifying the scratch store of hop `step`.
    ///
    /// Built from the hashed half of the run ID; the timestamp half is shared
    /// by runs started close together.
    pub fn scratch_tag(&self, step: usize) -> String {
        format!("{}-{step}", hex::encode(&self.run_id[8..14]))
    }
}

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a run ID from the clock and a process-wide counter.
pub fn generate_run_id() -> [u8; 16] {
    let ts = current_timestamp();
    let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = blake3::Hasher::new();
    hasher.update(&ts.to_be_bytes());
    hasher.update(&seq.to_be_bytes());
    hasher.update(&std::process::id().to_be_bytes());

    let mut id = [0u8; 16];
    id[0..8].copy_from_slice(&ts.to_be_bytes());
    id[8..16].copy_from_slice(&hasher.finalize().as_bytes()[0..8]);
    id
}
