//! WorkerConfig - worker の設定
//!
//! JSON ファイルから読み込み、足りない項目は既定値で埋めます。

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Live task limit; `None` means unlimited.
    pub max_live_tasks: Option<usize>,

    /// Send a `ready` envelope listing the exports when the loop starts.
    pub announce_ready: bool,

    /// Longest inbound frame a line-based transport accepts.
    pub max_frame_bytes: usize,

    /// How long teardown waits for cancelled tasks before aborting them.
    pub teardown_grace_ms: u64,
}

impl WorkerConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_live_tasks: None,
            announce_ready: true,
            max_frame_bytes: 1024 * 1024,
            teardown_grace_ms: 100,
        }
    }
}
