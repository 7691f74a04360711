//! Transport-independent request handling.
//!
//! Every method validates an untyped JSON payload, delegates to the store,
//! and returns `(body, status)` shaped like an HTTP exchange without doing
//! any network I/O itself. Status codes follow the server's convention:
//! 200 success, 400 for anything the client got wrong (including unknown
//! ids and rename collisions), 500 for storage failures.

use std::fs;

use serde_json::{json, Map, Value};
use tracing::warn;

use taskdeck_core::paths::markdown_export_path;
use taskdeck_core::task::{NewTask, Task, TaskPriority, TaskStatus};
use taskdeck_store::StoreError;

use crate::state::ServerState;

pub type ApiReply = (Value, u16);

/// A project name doubles as a path fragment for export files, so anything
/// that could escape the data directory is rejected up front.
pub fn invalid_project_name(name: &str) -> bool {
    name.is_empty()
        || name.contains("..")
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
}

fn error(status: u16, message: &str) -> ApiReply {
    (json!({ "error": message }), status)
}

fn store_failure(context: &str, err: &StoreError) -> ApiReply {
    if err.is_client_error() {
        (json!({ "error": err.to_string() }), 400)
    } else {
        (json!({ "error": format!("{context}: {err}") }), 500)
    }
}

fn task_json(task: &Task) -> Value {
    serde_json::to_value(task).unwrap_or(Value::Null)
}

pub struct ProjectApi<'a> {
    state: &'a ServerState,
}

impl<'a> ProjectApi<'a> {
    pub fn new(state: &'a ServerState) -> Self {
        Self { state }
    }

    // ----- Project routes -----

    pub fn list_projects(&self) -> ApiReply {
        match self.state.store.list_projects(false) {
            Ok(projects) => (
                json!({
                    "projects": projects,
                    "currentProject": self.state.current_project(),
                }),
                200,
            ),
            Err(err) => store_failure("Failed to list projects", &err),
        }
    }

    pub fn get_state(&self) -> ApiReply {
        (json!({ "currentProject": self.state.current_project() }), 200)
    }

    pub fn open_project(&self, body: &Value) -> ApiReply {
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if name.is_empty() {
            return error(400, "Missing 'name'");
        }
        if invalid_project_name(name) {
            return error(400, "Invalid project name");
        }
        let canonical = match self.state.store.upsert_project_name(name) {
            Ok(canonical) => canonical,
            Err(err) => return store_failure("Failed to open project", &err),
        };
        if let Err(err) = self.state.store.ensure_table(&canonical) {
            return store_failure("Failed to open project", &err);
        }
        self.state.set_current_project(Some(canonical.clone()));
        (json!({ "ok": true, "currentProject": canonical }), 200)
    }

    pub fn edit_project_name(&self, body: &Value) -> ApiReply {
        let old = body
            .get("old_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        let new = body
            .get("new_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if old.is_empty() || new.is_empty() {
            return error(400, "'old_name' and 'new_name' required");
        }
        if invalid_project_name(old) || invalid_project_name(new) {
            return error(400, "Invalid project name");
        }
        let stored = match self.state.store.rename_project(old, new) {
            Ok(stored) => stored,
            Err(err) if err.is_client_error() => {
                return (json!({ "ok": false, "error": err.to_string() }), 400);
            }
            Err(err) => return store_failure("Failed to rename project", &err),
        };

        // Carry the markdown export along; losing it is not worth failing
        // an otherwise committed rename.
        let old_md = markdown_export_path(&self.state.data_dir, old);
        let new_md = markdown_export_path(&self.state.data_dir, new);
        if old_md != new_md && old_md.is_file() {
            if let Err(err) = fs::rename(&old_md, &new_md) {
                warn!(from = %old_md.display(), to = %new_md.display(), %err, "markdown export rename failed");
            }
        }

        let current = match self.state.current_project() {
            Some(current) if current.to_lowercase() == old.to_lowercase() => {
                self.state.set_current_project(Some(stored.clone()));
                Some(stored)
            }
            other => other,
        };
        (json!({ "ok": true, "currentProject": current }), 200)
    }

    // ----- Task routes -----

    pub fn list_tasks(&self, name: &str) -> ApiReply {
        if invalid_project_name(name) {
            return error(400, "Invalid project name");
        }
        match self.state.store.fetch_all(name) {
            Ok(tasks) => {
                let tasks: Vec<Value> = tasks.iter().map(task_json).collect();
                (json!({ "project": name, "tasks": tasks }), 200)
            }
            Err(err) => store_failure("Failed to list tasks", &err),
        }
    }

    /// Creation is deliberately lenient: all fields are optional and an
    /// unknown status or priority label falls back to the default instead
    /// of failing the request. Update (below) is the strict counterpart.
    pub fn create_task(&self, name: &str, body: &Value) -> ApiReply {
        if invalid_project_name(name) {
            return error(400, "Invalid project name");
        }
        let obj = body.as_object();
        let field = |key: &str| -> String {
            obj.and_then(|map| map.get(key))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        };
        let draft = NewTask {
            summary: field("summary"),
            assignee: field("assignee"),
            remarks: field("remarks"),
            status: obj
                .and_then(|map| map.get("status"))
                .and_then(Value::as_str)
                .and_then(TaskStatus::parse)
                .unwrap_or_default(),
            priority: obj
                .and_then(|map| map.get("priority"))
                .and_then(Value::as_str)
                .and_then(TaskPriority::parse)
                .unwrap_or_default(),
            highlight: false,
        };
        match self.state.store.create(name, draft) {
            Ok(task) => (json!({ "ok": true, "id": task.id, "task": task_json(&task) }), 200),
            Err(err) => store_failure("Failed to create task", &err),
        }
    }

    pub fn update_task(&self, name: &str, body: &Value) -> ApiReply {
        if invalid_project_name(name) {
            return error(400, "Invalid project name");
        }
        let Some(obj) = body.as_object() else {
            return error(400, "Invalid payload");
        };
        let Some(id) = obj.get("id").and_then(Value::as_i64) else {
            return error(400, "'id' must be an integer");
        };
        let fields = match obj.get("fields").and_then(Value::as_object) {
            Some(fields) if !fields.is_empty() => fields,
            _ => return error(400, "'fields' must be a non-empty object"),
        };

        const ALLOWED: [&str; 6] =
            ["summary", "assignee", "remarks", "status", "priority", "highlight"];
        if fields.keys().any(|key| !ALLOWED.contains(&key.as_str())) {
            return error(400, "Unknown fields present");
        }

        // Validate everything before touching the task so a bad payload
        // leaves it unchanged.
        let status = match parse_enum_field(fields, "status", TaskStatus::parse) {
            Ok(status) => status,
            Err(reply) => return reply,
        };
        let priority = match parse_enum_field(fields, "priority", TaskPriority::parse) {
            Ok(priority) => priority,
            Err(reply) => return reply,
        };
        let highlight = match fields.get("highlight") {
            None => None,
            Some(Value::Bool(value)) => Some(*value),
            Some(_) => return error(400, "Invalid highlight"),
        };
        let summary = match parse_text_field(fields, "summary") {
            Ok(summary) => summary,
            Err(reply) => return reply,
        };
        let assignee = match parse_text_field(fields, "assignee") {
            Ok(assignee) => assignee,
            Err(reply) => return reply,
        };
        let remarks = match parse_text_field(fields, "remarks") {
            Ok(remarks) => remarks,
            Err(reply) => return reply,
        };

        let tasks = match self.state.store.fetch_all(name) {
            Ok(tasks) => tasks,
            Err(err) => return store_failure("Failed to update task", &err),
        };
        let Some(mut task) = tasks.into_iter().find(|task| task.id == id) else {
            return error(400, "Task not found");
        };

        if let Some(summary) = summary {
            task.summary = summary;
        }
        if let Some(assignee) = assignee {
            task.assignee = assignee;
        }
        if let Some(remarks) = remarks {
            task.remarks = remarks;
        }
        if let Some(status) = status {
            task.status = status;
        }
        if let Some(priority) = priority {
            task.priority = priority;
        }
        if let Some(highlight) = highlight {
            task.highlight = highlight;
        }

        match self.state.store.upsert(name, &task) {
            Ok(()) => (json!({ "ok": true, "id": id, "task": task_json(&task) }), 200),
            Err(err) => store_failure("Failed to update task", &err),
        }
    }

    /// Highlight toggling is modeled as a partial update of one field.
    pub fn highlight_task(&self, name: &str, body: &Value) -> ApiReply {
        if invalid_project_name(name) {
            return error(400, "Invalid project name");
        }
        let Some(obj) = body.as_object() else {
            return error(400, "Invalid payload");
        };
        let Some(highlight) = obj.get("highlight").and_then(Value::as_bool) else {
            return error(400, "Invalid highlight");
        };
        let payload = json!({
            "id": obj.get("id").cloned().unwrap_or(Value::Null),
            "fields": { "highlight": highlight },
        });
        self.update_task(name, &payload)
    }

    pub fn delete_task(&self, name: &str, body: &Value) -> ApiReply {
        if invalid_project_name(name) {
            return error(400, "Invalid project name");
        }
        let Some(obj) = body.as_object() else {
            return error(400, "Invalid payload");
        };
        let Some(id) = obj.get("id").and_then(Value::as_i64) else {
            return error(400, "'id' must be an integer");
        };
        let tasks = match self.state.store.fetch_all(name) {
            Ok(tasks) => tasks,
            Err(err) => return store_failure("Failed to delete task", &err),
        };
        let Some(removed) = tasks.into_iter().find(|task| task.id == id) else {
            return error(400, "Task not found");
        };
        match self.state.store.delete(name, id) {
            Ok(()) => (json!({ "ok": true, "id": id, "task": task_json(&removed) }), 200),
            Err(err) => store_failure("Failed to delete task", &err),
        }
    }

    pub fn list_highlights(&self) -> ApiReply {
        let collect = || -> Result<Vec<Value>, StoreError> {
            let mut highlights = Vec::new();
            for name in self.state.store.list_projects(false)? {
                for task in self.state.store.fetch_all(&name)? {
                    if task.highlight {
                        highlights.push(json!({
                            "project": name,
                            "summary": task.summary,
                            "assignee": task.assignee,
                            "status": task.status.as_str(),
                            "priority": task.priority.as_str(),
                        }));
                    }
                }
            }
            Ok(highlights)
        };
        match collect() {
            Ok(highlights) => (json!({ "highlights": highlights }), 200),
            Err(err) => store_failure("Failed to fetch highlights", &err),
        }
    }

    // ----- Tag routes -----

    pub fn get_project_tags(&self, name: &str) -> ApiReply {
        if invalid_project_name(name) {
            return error(400, "Invalid project name");
        }
        match self.state.store.tags_for_project(name) {
            Ok(tags) => (json!({ "project": name, "tags": tags }), 200),
            Err(err) => store_failure("Failed to fetch tags", &err),
        }
    }

    pub fn add_project_tags(&self, name: &str, body: &Value) -> ApiReply {
        if invalid_project_name(name) {
            return error(400, "Invalid project name");
        }
        let tags: Vec<String> = body
            .get("tags")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if tags.is_empty() {
            return error(400, "No tags provided");
        }
        match self.state.store.add_tags(name, &tags) {
            Ok(updated) => (json!({ "project": name, "tags": updated }), 200),
            Err(err) => store_failure("Failed to add tags", &err),
        }
    }

    pub fn remove_project_tag(&self, name: &str, body: &Value) -> ApiReply {
        if invalid_project_name(name) {
            return error(400, "Invalid project name");
        }
        let tag = body
            .get("tag")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if tag.is_empty() {
            return error(400, "No tag provided");
        }
        match self.state.store.remove_tag(name, tag) {
            Ok(updated) => (json!({ "project": name, "tags": updated }), 200),
            Err(err) => store_failure("Failed to remove tag", &err),
        }
    }

    pub fn list_all_project_tags(&self) -> ApiReply {
        match self.state.store.tags_by_project() {
            Ok(grouped) => {
                let mut by_project = Map::new();
                for (key, tags) in grouped {
                    by_project.insert(key, json!(tags));
                }
                (json!({ "tagsByProject": by_project }), 200)
            }
            Err(err) => store_failure("Failed to fetch project tags", &err),
        }
    }
}

fn parse_enum_field<T>(
    fields: &Map<String, Value>,
    key: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, ApiReply> {
    match fields.get(key) {
        None => Ok(None),
        Some(value) => {
            let parsed = value.as_str().and_then(|label| parse(label));
            match parsed {
                Some(parsed) => Ok(Some(parsed)),
                None => Err((json!({ "error": format!("Invalid {key}") }), 400)),
            }
        }
    }
}

fn parse_text_field(
    fields: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, ApiReply> {
    match fields.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(String::new())),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err((json!({ "error": format!("Invalid {key}") }), 400)),
    }
}
