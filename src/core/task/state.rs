use serde::{Deserialize, Serialize};

/// 下载任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    ProbingNetwork,
    Downloading,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// 状态只能向前推进，终态之后不再变化
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (Idle, ProbingNetwork) | (Idle, Downloading) => true,
            (ProbingNetwork, Downloading) => true,
            (Downloading, Completed) => true,
            (from, Failed) | (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(TaskState::Idle.can_transition_to(TaskState::ProbingNetwork));
        assert!(TaskState::Idle.can_transition_to(TaskState::Downloading));
        assert!(TaskState::ProbingNetwork.can_transition_to(TaskState::Downloading));
        assert!(TaskState::Downloading.can_transition_to(TaskState::Completed));
        assert!(TaskState::Downloading.can_transition_to(TaskState::Failed));
        assert!(TaskState::ProbingNetwork.can_transition_to(TaskState::Cancelled));
    }

    #[test]
    fn test_no_backward_or_terminal_exit() {
        assert!(!TaskState::Downloading.can_transition_to(TaskState::ProbingNetwork));
        assert!(!TaskState::Idle.can_transition_to(TaskState::Completed));
        for terminal in [TaskState::Completed, TaskState::Failed, TaskState::Cancelled] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(TaskState::Failed));
            assert!(!terminal.can_transition_to(TaskState::Downloading));
        }
    }
}
