#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Completed => "Completed",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }

    /// A history row with an end time is completed.
    pub fn from_end_time(end: Option<&str>) -> Self {
        match end {
            Some(e) if !e.trim().is_empty() => TaskStatus::Completed,
            _ => TaskStatus::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

/// Completed is terminal; nothing here moves a task back to Pending.
pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    if from == to {
        return true;
    }
    match from {
        TaskStatus::Pending => matches!(to, TaskStatus::Completed),
        TaskStatus::Completed => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Claim,
    Submit,
}

/// Why an action is refused for the requesting user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionDenied {
    #[error("task is already completed")]
    Completed,
    #[error("task is assigned to another user")]
    AssignedElsewhere,
    #[error("task is already assigned to you")]
    AlreadyAssigned,
    #[error("you are not a candidate for this task")]
    NotCandidate,
    #[error("claim the task before submitting")]
    NotAssignee,
}

/// Checks `action` against the task's status and the user's relation to it.
pub fn check_action(
    action: TaskAction,
    status: TaskStatus,
    is_assignee: bool,
    has_assignee: bool,
    can_claim: bool,
) -> Result<(), ActionDenied> {
    if status.is_terminal() {
        return Err(ActionDenied::Completed);
    }
    match action {
        TaskAction::Claim if is_assignee => Err(ActionDenied::AlreadyAssigned),
        TaskAction::Claim if has_assignee => Err(ActionDenied::AssignedElsewhere),
        TaskAction::Claim if !can_claim => Err(ActionDenied::NotCandidate),
        TaskAction::Claim => Ok(()),
        TaskAction::Submit if !is_assignee => Err(ActionDenied::NotAssignee),
        TaskAction::Submit => Ok(()),
    }
}
