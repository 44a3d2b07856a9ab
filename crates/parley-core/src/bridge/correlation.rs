//! CorrelationTable - 応答待ちリクエストの管理
//!
//! `request_input` で停止したタスクの continuation（oneshot の送信側）を
//! CorrelationId で引けるように保持します。
//!
//! # 不変条件
//! - 1 つの CorrelationId に対して生きているエントリは高々 1 つ
//! - ID は 1 から単調増加で採番し、再利用しない
//! - エントリは reply か cancel_all のどちらか一方で、ちょうど 1 回だけ取り除かれる
//!   （oneshot::Sender::send は self を消費するので二重 resume は起こらない）

use std::collections::HashMap;

use log::debug;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::domain::{BridgeError, CorrelationId, TaskId};

/// Single-resume continuation of a suspended task.
pub type Continuation = oneshot::Sender<Result<Value, BridgeError>>;

struct PendingRequest {
    task_id: TaskId,
    continuation: Continuation,
}

/// What `resolve` did with a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The owning task was resumed.
    Resumed(TaskId),
    /// The entry existed but its task had already gone away.
    Orphaned(TaskId),
    /// No pending entry for that id (unknown, duplicate or late reply).
    Stale,
}

#[derive(Default)]
pub struct CorrelationTable {
    last_id: u64,
    pending: HashMap<CorrelationId, PendingRequest>,
    closed: bool,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `continuation` under a fresh id.
    ///
    /// Refuses with `LinkClosed` once the table has been torn down.
    pub fn register(
        &mut self,
        task_id: TaskId,
        continuation: Continuation,
    ) -> Result<CorrelationId, BridgeError> {
        if self.closed {
            return Err(BridgeError::LinkClosed);
        }
        self.last_id += 1;
        let id = CorrelationId::new(self.last_id);
        self.pending.insert(
            id,
            PendingRequest {
                task_id,
                continuation,
            },
        );
        debug!("registered {id} for {task_id}");
        Ok(id)
    }

    /// Remove the entry for `id` and resume its task with `outcome`.
    pub fn resolve(&mut self, id: CorrelationId, outcome: Result<Value, BridgeError>) -> Resolution {
        let Some(pending) = self.pending.remove(&id) else {
            return Resolution::Stale;
        };
        match pending.continuation.send(outcome) {
            Ok(()) => Resolution::Resumed(pending.task_id),
            Err(_) => Resolution::Orphaned(pending.task_id),
        }
    }

    /// Resume every pending task with `reason` and close the table.
    ///
    /// Returns the tasks that were waiting. A second call finds nothing and
    /// returns an empty list.
    pub fn cancel_all(&mut self, reason: BridgeError) -> Vec<TaskId> {
        self.closed = true;
        let mut drained: Vec<(CorrelationId, PendingRequest)> = self.pending.drain().collect();
        drained.sort_by_key(|(id, _)| *id);

        drained
            .into_iter()
            .map(|(id, pending)| {
                debug!("cancelling {id} for {}: {reason}", pending.task_id);
                // The receiver may already be gone; either way the entry is removed.
                let _ = pending.continuation.send(Err(reason.clone()));
                pending.task_id
            })
            .collect()
    }

    pub fn owner(&self, id: CorrelationId) -> Option<TaskId> {
        self.pending.get(&id).map(|p| p.task_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
