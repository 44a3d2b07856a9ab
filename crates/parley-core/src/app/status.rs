//! Status - worker の状態スナップショット

use serde::{Deserialize, Serialize};

/// Counts of live tasks by state plus terminal totals since the worker started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub running: usize,
    pub suspended: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub pending_requests: usize,
}

impl WorkerStatus {
    pub fn live(&self) -> usize {
        self.running + self.suspended
    }
}
