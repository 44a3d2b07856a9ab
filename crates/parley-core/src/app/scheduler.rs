//! Scheduler - export 呼び出しごとのタスク実行
//!
//! 1 つの worker loop の中で多数のタスクを協調的に多重化します。
//! タスクは `JoinSet` に spawn され、`request_input` の await と開始・終了の
//! 時点でのみ切り替わります（current-thread ランタイム前提）。
//!
//! - `TaskTable`: 生きているタスクの状態と終端状態の累計
//! - `Scheduler`: JoinSet の所有と、終了したタスクの回収

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;
use tokio::task::{Id, JoinError, JoinSet};

use crate::app::status::WorkerStatus;
use crate::bridge::Bridge;
use crate::domain::{CorrelationId, InvocationId, TaskError, TaskId, TaskState};
use crate::typed::DynExport;

pub(crate) struct TaskRecord {
    pub(crate) invocation_id: InvocationId,
    pub(crate) function_name: Arc<str>,
    pub(crate) state: TaskState,
}

#[derive(Default)]
pub(crate) struct TaskTable {
    live: HashMap<TaskId, TaskRecord>,
    invocations: HashMap<InvocationId, TaskId>,
    completed: usize,
    failed: usize,
    cancelled: usize,
}

impl TaskTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(
        &mut self,
        task_id: TaskId,
        invocation_id: InvocationId,
        function_name: Arc<str>,
    ) {
        self.invocations.insert(invocation_id, task_id);
        self.live.insert(
            task_id,
            TaskRecord {
                invocation_id,
                function_name,
                state: TaskState::Running,
            },
        );
    }

    pub(crate) fn contains_invocation(&self, invocation_id: InvocationId) -> bool {
        self.invocations.contains_key(&invocation_id)
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn live_ids(&self) -> Vec<TaskId> {
        self.live.keys().copied().collect()
    }

    pub(crate) fn state(&self, task_id: TaskId) -> Option<TaskState> {
        self.live.get(&task_id).map(|r| r.state)
    }

    pub(crate) fn mark_suspended(&mut self, task_id: TaskId, correlation_id: CorrelationId) {
        if let Some(record) = self.live.get_mut(&task_id)
            && record.state == TaskState::Running
        {
            record.state = TaskState::Suspended(correlation_id);
        }
    }

    pub(crate) fn mark_running(&mut self, task_id: TaskId) {
        if let Some(record) = self.live.get_mut(&task_id)
            && record.state.is_suspended()
        {
            record.state = TaskState::Running;
        }
    }

    /// Move a task to a terminal state and release it.
    ///
    /// Returns `None` when the task was already released.
    pub(crate) fn finish(&mut self, task_id: TaskId, terminal: TaskState) -> Option<TaskRecord> {
        debug_assert!(terminal.is_terminal());
        let mut record = self.live.remove(&task_id)?;
        self.invocations.remove(&record.invocation_id);
        match terminal {
            TaskState::Completed => self.completed += 1,
            TaskState::Failed => self.failed += 1,
            _ => self.cancelled += 1,
        }
        record.state = terminal;
        Some(record)
    }

    pub(crate) fn status(&self) -> WorkerStatus {
        let suspended = self.live.values().filter(|r| r.state.is_suspended()).count();
        WorkerStatus {
            running: self.live.len() - suspended,
            suspended,
            completed: self.completed,
            failed: self.failed,
            cancelled: self.cancelled,
            pending_requests: 0,
        }
    }
}

/// A task whose future has ended.
pub(crate) struct Finished {
    pub(crate) task_id: TaskId,
    pub(crate) outcome: Result<Value, TaskError>,
}

#[derive(Default)]
pub(crate) struct Scheduler {
    running: JoinSet<Result<Value, TaskError>>,
    handles: HashMap<Id, TaskId>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn spawn(&mut self, task_id: TaskId, export: Arc<dyn DynExport>, bridge: Bridge) {
        let handle = self.running.spawn(async move { export.call(bridge).await });
        self.handles.insert(handle.id(), task_id);
        debug!("spawned {task_id}");
    }

    pub(crate) fn len(&self) -> usize {
        self.running.len()
    }

    /// Wait for the next task to end. `None` when nothing is running.
    ///
    /// Cancel-safe: a task that ends while this future is dropped is picked up
    /// by the next call.
    pub(crate) async fn next_finished(&mut self) -> Option<Finished> {
        loop {
            let joined = self.running.join_next_with_id().await?;
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(err) => (err.id(), Err(join_failure(err))),
            };
            match self.handles.remove(&id) {
                Some(task_id) => return Some(Finished { task_id, outcome }),
                None => warn!("joined a task the scheduler never spawned ({id})"),
            }
        }
    }

    /// Let every task observe teardown, aborting stragglers after `grace`.
    ///
    /// Returns the tasks that ended here; their outcomes are discarded.
    pub(crate) async fn drain(&mut self, grace: Duration) -> Vec<TaskId> {
        let mut ended = Vec::new();
        let settled = tokio::time::timeout(grace, async {
            while let Some(finished) = self.next_finished().await {
                ended.push(finished.task_id);
            }
        })
        .await;

        if settled.is_err() {
            warn!(
                "{} task(s) still running after teardown grace; aborting",
                self.running.len()
            );
            self.running.abort_all();
            while let Some(finished) = self.next_finished().await {
                ended.push(finished.task_id);
            }
        }
        ended
    }
}

fn join_failure(err: JoinError) -> TaskError {
    if err.is_panic() {
        let panic = err.into_panic();
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        TaskError::Panicked(message)
    } else {
        TaskError::failed("task was aborted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn task() -> TaskId {
        TaskId::from_ulid(Ulid::new())
    }

    #[test]
    fn suspend_and_resume_round_trip() {
        let mut table = TaskTable::new();
        let id = task();
        table.insert(id, InvocationId::new(1), Arc::from("run_program"));

        table.mark_suspended(id, CorrelationId::new(1));
        assert_eq!(table.state(id), Some(TaskState::Suspended(CorrelationId::new(1))));
        assert_eq!(table.status().suspended, 1);

        table.mark_running(id);
        assert_eq!(table.state(id), Some(TaskState::Running));
        assert_eq!(table.status().running, 1);
    }

    #[test]
    fn finish_releases_the_task_exactly_once() {
        let mut table = TaskTable::new();
        let id = task();
        table.insert(id, InvocationId::new(7), Arc::from("f"));
        assert!(table.contains_invocation(InvocationId::new(7)));

        let record = table.finish(id, TaskState::Completed).unwrap();
        assert_eq!(record.invocation_id, InvocationId::new(7));
        assert_eq!(record.state, TaskState::Completed);
        assert!(table.finish(id, TaskState::Failed).is_none());

        let status = table.status();
        assert_eq!(status.completed, 1);
        assert_eq!(status.failed, 0);
        assert_eq!(status.live(), 0);
        assert!(!table.contains_invocation(InvocationId::new(7)));
    }

    #[test]
    fn cancelled_task_is_not_revived_by_mark_running() {
        let mut table = TaskTable::new();
        let id = task();
        table.insert(id, InvocationId::new(1), Arc::from("f"));
        table.finish(id, TaskState::Cancelled);
        table.mark_running(id);

        assert_eq!(table.state(id), None);
        assert_eq!(table.status().cancelled, 1);
    }

    #[test]
    fn panic_payload_becomes_task_error() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let err = rt.block_on(async {
            tokio::spawn(async { panic!("kaboom") }).await.unwrap_err()
        });

        let task_err = join_failure(err);
        assert!(matches!(task_err, TaskError::Panicked(ref m) if m == "kaboom"));
    }
}
