//! Progress callbacks for registration runs.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use crate::error::{RegistrationError, Stage};

/// Progress of one solver iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    /// Stage the iteration belongs to.
    pub stage: Stage,
    /// 1-based iteration number within the stage.
    pub iteration: usize,
    /// Iterations planned for the stage.
    pub total: usize,
    /// Norm of the update applied in this iteration.
    pub update_norm: f64,
    /// Time since the run started.
    pub elapsed: Duration,
}

impl ProgressInfo {
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.iteration as f64 / self.total as f64 * 100.0
    }
}

/// Observer of registration progress.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);

    fn on_start(&self) {}

    fn on_complete(&self, _elapsed: Duration) {}

    fn on_error(&self, _error: &RegistrationError) {}
}

/// Logs progress through `tracing`.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Log every n-th iteration (and always the last one).
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 1 }
    }
}

impl ConsoleProgressCallback {
    pub fn new(log_interval: usize) -> Self {
        Self { log_interval: log_interval.max(1) }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.iteration % self.log_interval == 0 || info.iteration == info.total {
            tracing::info!(
                "{} {}/{} ({:.0}%) | update: {:.4e} | elapsed: {:.2}s",
                info.stage,
                info.iteration,
                info.total,
                info.progress_percent(),
                info.update_norm,
                info.elapsed.as_secs_f64()
            );
        }
    }

    fn on_start(&self) {
        tracing::info!("Registration started");
    }

    fn on_complete(&self, elapsed: Duration) {
        tracing::info!("Registration completed in {:.2}s", elapsed.as_secs_f64());
    }

    fn on_error(&self, error: &RegistrationError) {
        tracing::error!("Registration failed: {}", error);
    }
}

/// Records every progress report.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Recorded updates of one stage, in order.
    pub fn update_norms(&self, stage: Stage) -> Vec<f64> {
        self.history()
            .iter()
            .filter(|info| info.stage == stage)
            .map(|info| info.update_norm)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Ok(mut history) = self.history.lock() {
            history.push(info.clone());
        }
    }
}
