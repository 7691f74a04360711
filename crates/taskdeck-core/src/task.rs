use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }

    /// Exact-match parse of the wire value; `None` for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Not Started" => Some(Self::NotStarted),
            "In Progress" => Some(Self::InProgress),
            "Completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Low" => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of work inside a project. `id` is assigned by the store
/// and unique within the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub summary: String,
    pub assignee: String,
    pub remarks: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default)]
    pub highlight: bool,
}

/// Field set for a task that does not have an id yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub summary: String,
    pub assignee: String,
    pub remarks: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub highlight: bool,
}

impl Task {
    pub fn from_draft(id: i64, draft: NewTask) -> Self {
        Self {
            id,
            summary: draft.summary,
            assignee: draft.assignee,
            remarks: draft.remarks,
            status: draft.status,
            priority: draft.priority,
            highlight: draft.highlight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_wire_values() {
        for status in [
            TaskStatus::NotStarted,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("Done"), None);
    }

    #[test]
    fn priority_rejects_unknown_and_case_variants() {
        assert_eq!(TaskPriority::parse("High"), Some(TaskPriority::High));
        assert_eq!(TaskPriority::parse("high"), None);
        assert_eq!(TaskPriority::parse("Urgent"), None);
    }

    #[test]
    fn defaults_match_creation_policy() {
        let draft = NewTask::default();
        assert_eq!(draft.status, TaskStatus::NotStarted);
        assert_eq!(draft.priority, TaskPriority::Medium);
        assert!(!draft.highlight);
    }

    #[test]
    fn task_serializes_to_wire_shape() {
        let task = Task::from_draft(
            3,
            NewTask {
                summary: "Ship it".to_string(),
                status: TaskStatus::InProgress,
                ..Default::default()
            },
        );
        let value = serde_json::to_value(&task).expect("serialize");
        assert_eq!(value["id"], 3);
        assert_eq!(value["status"], "In Progress");
        assert_eq!(value["priority"], "Medium");
        assert_eq!(value["highlight"], false);
    }
}
