//! Aggregate batch progress

use super::task::TaskStatus;
use serde::Serialize;

/// Batch progress derived from the task set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Number of tasks in the queue
    pub total: usize,
    /// Tasks that rendered successfully
    pub completed: usize,
    /// Tasks whose render failed
    pub failed: usize,
}

impl BatchStats {
    /// Count statuses. Never stored; always recomputed from the tasks.
    pub fn from_statuses(statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        statuses
            .into_iter()
            .fold(Self::default(), |mut stats, status| {
                stats.total += 1;
                match status {
                    TaskStatus::Completed => stats.completed += 1,
                    TaskStatus::Failed => stats.failed += 1,
                    TaskStatus::Pending | TaskStatus::Processing => {}
                }
                stats
            })
    }

    pub fn pending_or_processing(&self) -> usize {
        self.total - self.completed - self.failed
    }

    /// Share of completed tasks, 0 for an empty batch
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }

    /// Every task reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.completed + self.failed == self.total
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
