//! State - タスクの状態

use serde::{Deserialize, Serialize};

use super::ids::CorrelationId;

/// TaskState はタスクの状態を表現
///
/// # 状態遷移
/// - Running -> Suspended(corr) -> Running（reply 到着で再開）
/// - Running -> Completed / Failed
/// - Running / Suspended -> Cancelled（teardown）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "correlationId", rename_all = "snake_case")]
pub enum TaskState {
    Running,
    Suspended(CorrelationId),
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    pub fn is_suspended(self) -> bool {
        matches!(self, TaskState::Suspended(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::running(TaskState::Running, false)]
    #[case::suspended(TaskState::Suspended(CorrelationId::new(1)), false)]
    #[case::completed(TaskState::Completed, true)]
    #[case::failed(TaskState::Failed, true)]
    #[case::cancelled(TaskState::Cancelled, true)]
    fn terminal_states(#[case] state: TaskState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn suspended_state_serializes_with_its_correlation_id() {
        let v = serde_json::to_value(TaskState::Suspended(CorrelationId::new(4))).unwrap();
        assert_eq!(v, serde_json::json!({"state": "suspended", "correlationId": 4}));
    }
}
