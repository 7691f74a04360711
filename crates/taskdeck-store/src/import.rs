//! Conversion of untyped JSON payloads into [`Task`] values, used when
//! ingesting task sets from exported files or older tooling.

use serde_json::Value;

use taskdeck_core::task::{Task, TaskPriority, TaskStatus};

use crate::error::StoreError;

/// Build a [`Task`] from a loose JSON object. `id`, `summary`, `status` and
/// `priority` are required; status and priority must match a known label
/// exactly. Older exports used `task_id` for the id field, which is still
/// accepted.
pub fn task_from_payload(value: &Value) -> Result<Task, StoreError> {
    let obj = value
        .as_object()
        .ok_or(StoreError::InvalidField("task"))?;

    let id = obj
        .get("id")
        .or_else(|| obj.get("task_id"))
        .ok_or(StoreError::MissingField("id"))?
        .as_i64()
        .ok_or(StoreError::InvalidField("id"))?;

    let summary = obj
        .get("summary")
        .ok_or(StoreError::MissingField("summary"))?
        .as_str()
        .ok_or(StoreError::InvalidField("summary"))?
        .to_string();

    let status = obj
        .get("status")
        .ok_or(StoreError::MissingField("status"))?
        .as_str()
        .and_then(TaskStatus::parse)
        .ok_or(StoreError::InvalidField("status"))?;

    let priority = obj
        .get("priority")
        .ok_or(StoreError::MissingField("priority"))?
        .as_str()
        .and_then(TaskPriority::parse)
        .ok_or(StoreError::InvalidField("priority"))?;

    let assignee = match obj.get("assignee") {
        None | Some(Value::Null) => String::new(),
        Some(value) => value
            .as_str()
            .ok_or(StoreError::InvalidField("assignee"))?
            .to_string(),
    };
    let remarks = match obj.get("remarks") {
        None | Some(Value::Null) => String::new(),
        Some(value) => value
            .as_str()
            .ok_or(StoreError::InvalidField("remarks"))?
            .to_string(),
    };
    let highlight = match obj.get("highlight") {
        None | Some(Value::Null) => false,
        Some(value) => value
            .as_bool()
            .ok_or(StoreError::InvalidField("highlight"))?,
    };

    Ok(Task {
        id,
        summary,
        assignee,
        remarks,
        status,
        priority,
        highlight,
    })
}

/// Convert a JSON array of task objects, failing on the first bad entry.
pub fn tasks_from_payload(value: &Value) -> Result<Vec<Task>, StoreError> {
    let items = value
        .as_array()
        .ok_or(StoreError::InvalidField("tasks"))?;
    items.iter().map(task_from_payload).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_payload_converts() {
        let task = task_from_payload(&json!({
            "id": 3,
            "summary": "Wire up backups",
            "assignee": "dana",
            "remarks": "nightly",
            "status": "In Progress",
            "priority": "High",
            "highlight": true,
        }))
        .expect("convert");
        assert_eq!(task.id, 3);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.highlight);
    }

    #[test]
    fn legacy_task_id_key_is_accepted() {
        let task = task_from_payload(&json!({
            "task_id": 7,
            "summary": "Old export row",
            "status": "Completed",
            "priority": "Low",
        }))
        .expect("convert");
        assert_eq!(task.id, 7);
        assert_eq!(task.assignee, "");
        assert!(!task.highlight);
    }

    #[test]
    fn missing_required_field_is_named() {
        let err = task_from_payload(&json!({
            "id": 1,
            "status": "Completed",
            "priority": "Low",
        }))
        .expect_err("must fail");
        assert!(matches!(err, StoreError::MissingField("summary")));
    }

    #[test]
    fn unknown_status_label_is_rejected() {
        let err = task_from_payload(&json!({
            "id": 1,
            "summary": "x",
            "status": "Done",
            "priority": "Low",
        }))
        .expect_err("must fail");
        assert!(matches!(err, StoreError::InvalidField("status")));
    }

    #[test]
    fn array_conversion_fails_on_first_bad_entry() {
        let err = tasks_from_payload(&json!([
            {"id": 0, "summary": "ok", "status": "Completed", "priority": "Low"},
            {"id": 1, "summary": "bad", "status": "nope", "priority": "Low"},
        ]))
        .expect_err("must fail");
        assert!(matches!(err, StoreError::InvalidField("status")));
        let tasks = tasks_from_payload(&json!([])).expect("empty array");
        assert!(tasks.is_empty());
    }
}
