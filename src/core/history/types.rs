use serde::Serialize;

use crate::core::forms::NamedValue;
use crate::core::tasks::TaskStatus;

/// A task as seen by one user, rebuilt from history on every request.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    pub id: String,
    pub name: Option<String>,
    pub status: TaskStatus,
    pub start: Option<String>,
    pub end: Option<String>,
    pub proc_inst_id: Option<String>,
    pub assignee: Option<String>,
    pub can_claim: bool,
    pub is_assignee: bool,
    pub variables: Vec<NamedValue>,
    pub content_items: Vec<ContentItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentItem {
    pub id: String,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub created: Option<String>,
    pub created_by: Option<String>,
    pub field: Option<String>,
}

/// Engine identity row plus group memberships.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub groups: Vec<String>,
}

impl IdentityUser {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.id.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryFilter {
    pub start: String,
    pub end: String,
    pub circle: String,
    pub activity: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CircleHeadSummary {
    #[serde(rename = "Pending")]
    pub pending: i64,
    #[serde(rename = "Completed")]
    pub completed: i64,
    #[serde(rename = "Flag")]
    pub flag: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DesignTeamSummary {
    #[serde(rename = "Pending")]
    pub pending: i64,
    #[serde(rename = "Completed")]
    pub completed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySites {
    pub activity: String,
    pub completed_sites: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UserTaskFilter {
    pub site: Option<String>,
    pub activity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserTaskRow {
    pub id: String,
    pub name: Option<String>,
    pub siteid: Option<String>,
    pub activity: Option<String>,
    pub status: TaskStatus,
    pub date: String,
    pub proc_inst_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub completed: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserTaskStats {
    pub summary: TaskCounts,
    pub tasks: Vec<UserTaskRow>,
}

impl UserTaskStats {
    pub fn from_rows(tasks: Vec<UserTaskRow>) -> Self {
        let mut summary = TaskCounts::default();
        for task in &tasks {
            match task.status {
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::Pending => summary.pending += 1,
            }
        }
        Self { summary, tasks }
    }
}
