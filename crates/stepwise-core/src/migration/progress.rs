//! Progress aggregation across hops.

use parking_lot::Mutex;

/// Receives overall migration progress in `0.0..=1.0`.
pub trait ProgressObserver: Send + Sync {
    /// Called with the new overall progress.
    fn on_progress(&self, progress: f64);
}

impl<F> ProgressObserver for F
where
    F: Fn(f64) + Send + Sync,
{
    fn on_progress(&self, progress: f64) {
        self(progress)
    }
}

#[derive(Debug, Default)]
struct AggregatorState {
    last: Option<f64>,
    finished: bool,
}

/// Turns "hop `i` of `N` is `p` done" into one non-decreasing stream.
///
/// Step values are `(step + fraction) / total`. Values that would reach 1.0
/// are held back; only [`finish`](Self::finish) reports completion. Delivery
/// happens under a lock so the observer never runs concurrently with itself.
pub struct ProgressAggregator<'a> {
    total_steps: usize,
    observer: Option<&'a dyn ProgressObserver>,
    state: Mutex<AggregatorState>,
}

impl<'a> ProgressAggregator<'a> {
    /// Create an aggregator for a path of `total_steps` hops.
    pub fn new(total_steps: usize, observer: Option<&'a dyn ProgressObserver>) -> Self {
        Self {
            total_steps,
            observer,
            state: Mutex::new(AggregatorState::default()),
        }
    }

    /// Number of hops being aggregated.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Report local progress of hop `step`.
    pub fn on_step_progress(&self, step: usize, fraction: f64) {
        if self.total_steps == 0 {
            return;
        }
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let overall = (step as f64 + fraction) / self.total_steps as f64;
        if overall >= 1.0 {
            return;
        }

        let mut state = self.state.lock();
        if state.finished || state.last.is_some_and(|last| overall <= last) {
            return;
        }
        state.last = Some(overall);
        if let Some(observer) = self.observer {
            observer.on_progress(overall);
        }
    }

    /// Report completion. Emits 1.0 exactly once.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if state.finished {
            return;
        }
        state.finished = true;
        state.last = Some(1.0);
        if let Some(observer) = self.observer {
            observer.on_progress(1.0);
        }
    }

    /// Last value delivered, if any.
    pub fn last_emitted(&self) -> Option<f64> {
        self.state.lock().last
    }
}
