use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use taskdeck_core::table::{project_key, project_table_name, NameError};
use taskdeck_core::task::{NewTask, Task, TaskPriority, TaskStatus};

use crate::error::StoreError;

/// Storage engine for every project in one SQLite file.
///
/// The connection is shared by all request threads and is not safe for
/// unsynchronized use, so every operation (reads included) passes through
/// the single internal lock. `open` is idempotent and `close` may be
/// called on a store that was never opened.
#[derive(Debug)]
pub struct TaskStore {
    db_path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl TaskStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            conn: Mutex::new(None),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn open(&self) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS projects (
              key  TEXT PRIMARY KEY,
              name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS project_tags (
              project_key TEXT NOT NULL,
              tag         TEXT NOT NULL,
              position    INTEGER NOT NULL,
              PRIMARY KEY (project_key, tag)
            );
            "#,
        )?;
        *guard = Some(conn);
        Ok(())
    }

    pub fn close(&self) {
        let mut guard = self.lock();
        *guard = None;
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(StoreError::NotOpen)?;
        f(conn)
    }

    // ----- Task CRUD -----

    /// Create the project's table if absent. Every row operation calls this
    /// implicitly; it is exposed for callers that want the side effect only.
    pub fn ensure_table(&self, project: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| ensure_table_on(conn, project).map(|_| ()))
    }

    /// All tasks for the project, ordered by id ascending. A project whose
    /// table does not exist yet yields an empty list, not an error.
    pub fn fetch_all(&self, project: &str) -> Result<Vec<Task>, StoreError> {
        self.with_conn(|conn| {
            let table = ensure_table_on(conn, project)?;
            fetch_all_on(conn, &table)
        })
    }

    /// Insert a new task with a store-assigned id: `max(existing) + 1`, or 0
    /// for an empty table. The id comes from the live table under the lock,
    /// never from a cached counter, so a hand-edited table cannot
    /// desynchronize assignment and deleted ids are never reused.
    pub fn create(&self, project: &str, draft: NewTask) -> Result<Task, StoreError> {
        self.with_conn(|conn| {
            let table = ensure_table_on(conn, project)?;
            let next_id: i64 = conn.query_row(
                &format!("SELECT COALESCE(MAX(task_id) + 1, 0) FROM {table}"),
                [],
                |row| row.get(0),
            )?;
            let task = Task::from_draft(next_id, draft);
            upsert_on(conn, &table, &task)?;
            Ok(task)
        })
    }

    /// Insert the task or overwrite all non-id fields of the existing row.
    /// Partial-update semantics live in the API layer, not here.
    pub fn upsert(&self, project: &str, task: &Task) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let table = ensure_table_on(conn, project)?;
            upsert_on(conn, &table, task)
        })
    }

    /// Replace the project's entire task set in one transaction. Any
    /// failure (for example a duplicate id within the batch) rolls the
    /// whole replacement back, leaving prior data untouched.
    pub fn bulk_replace(&self, project: &str, tasks: &[Task]) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let table = ensure_table_on(conn, project)?;
            let tx = conn.transaction()?;
            tx.execute(&format!("DELETE FROM {table}"), [])?;
            {
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO {table} \
                     (task_id, summary, assignee, remarks, status, priority, highlight) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ))?;
                for task in tasks {
                    stmt.execute(params![
                        task.id,
                        task.summary,
                        task.assignee,
                        task.remarks,
                        task.status.as_str(),
                        task.priority.as_str(),
                        task.highlight as i64,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Delete the task if present. Deleting an absent id is a no-op so that
    /// at-least-once callers stay idempotent.
    pub fn delete(&self, project: &str, id: i64) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let table = ensure_table_on(conn, project)?;
            conn.execute(&format!("DELETE FROM {table} WHERE task_id = ?1"), params![id])?;
            Ok(())
        })
    }

    // ----- Project registry -----

    /// Register the project name and return the canonical stored casing.
    /// A name differing only by case from an existing project does not
    /// create a duplicate row.
    pub fn upsert_project_name(&self, name: &str) -> Result<String, StoreError> {
        let key = project_key(name);
        if key.is_empty() {
            return Err(NameError::Empty.into());
        }
        let display = name.trim().to_string();
        self.with_conn(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT name FROM projects WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(existing) = existing {
                return Ok(existing);
            }
            conn.execute(
                "INSERT INTO projects (key, name) VALUES (?1, ?2)",
                params![key, display],
            )?;
            Ok(display)
        })
    }

    /// Canonical project names in registration order, or their lowercase
    /// variants for membership checks.
    pub fn list_projects(&self, case_insensitive: bool) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM projects ORDER BY rowid ASC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut names = Vec::new();
            for name in rows {
                let name = name?;
                names.push(if case_insensitive { name.to_lowercase() } else { name });
            }
            Ok(names)
        })
    }

    /// Rename a project. Fails when `old` is unknown or `new` collides with
    /// a different project; a case-only rename of the same project succeeds.
    /// When the sanitized table identifier changes, the task rows move to
    /// the new table and the tag key is re-keyed inside the same
    /// transaction, so a rename never orphans tasks or tags.
    pub fn rename_project(&self, old: &str, new: &str) -> Result<String, StoreError> {
        let old_key = project_key(old);
        let new_key = project_key(new);
        if old_key.is_empty() || new_key.is_empty() {
            return Err(NameError::Empty.into());
        }
        let new_display = new.trim().to_string();
        let old_table = project_table_name(old)?;
        let new_table = project_table_name(new)?;
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let found: Option<String> = tx
                .query_row(
                    "SELECT key FROM projects WHERE key = ?1",
                    params![old_key],
                    |row| row.get(0),
                )
                .optional()?;
            if found.is_none() {
                return Err(StoreError::UnknownProject(old.trim().to_string()));
            }
            if new_key != old_key {
                let taken: Option<String> = tx
                    .query_row(
                        "SELECT key FROM projects WHERE key = ?1",
                        params![new_key],
                        |row| row.get(0),
                    )
                    .optional()?;
                if taken.is_some() {
                    return Err(StoreError::NameConflict(new_display));
                }
            }

            tx.execute(
                "UPDATE projects SET key = ?1, name = ?2 WHERE key = ?3",
                params![new_key, new_display, old_key],
            )?;

            if new_table != old_table && table_exists(&tx, &old_table)? {
                ensure_table_on(&tx, new)?;
                tx.execute_batch(&format!(
                    "INSERT INTO {new_table} \
                     SELECT task_id, summary, assignee, remarks, status, priority, highlight \
                     FROM {old_table}; \
                     DROP TABLE {old_table};"
                ))?;
            }

            if new_key != old_key {
                // OR IGNORE handles stale tag rows already present under the
                // new key; leftovers under the old key are dropped.
                tx.execute(
                    "UPDATE OR IGNORE project_tags SET project_key = ?1 WHERE project_key = ?2",
                    params![new_key, old_key],
                )?;
                tx.execute(
                    "DELETE FROM project_tags WHERE project_key = ?1",
                    params![old_key],
                )?;
            }

            tx.commit()?;
            Ok(new_display)
        })
    }

    // ----- Tags -----

    /// Append tags, preserving insertion order and suppressing duplicates.
    /// Tag values are case-sensitive; the project key is not.
    pub fn add_tags(&self, project: &str, tags: &[String]) -> Result<Vec<String>, StoreError> {
        let key = project_key(project);
        if key.is_empty() {
            return Err(NameError::Empty.into());
        }
        self.with_conn(|conn| {
            let mut current = tags_on(conn, &key)?;
            let mut next_pos: i64 = conn.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM project_tags WHERE project_key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            for tag in tags {
                let tag = tag.trim();
                if tag.is_empty() || current.iter().any(|existing| existing == tag) {
                    continue;
                }
                conn.execute(
                    "INSERT INTO project_tags (project_key, tag, position) VALUES (?1, ?2, ?3)",
                    params![key, tag, next_pos],
                )?;
                current.push(tag.to_string());
                next_pos += 1;
            }
            Ok(current)
        })
    }

    /// Remove one tag (exact match) and return the remaining list.
    pub fn remove_tag(&self, project: &str, tag: &str) -> Result<Vec<String>, StoreError> {
        let key = project_key(project);
        if key.is_empty() {
            return Err(NameError::Empty.into());
        }
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM project_tags WHERE project_key = ?1 AND tag = ?2",
                params![key, tag],
            )?;
            tags_on(conn, &key)
        })
    }

    pub fn tags_for_project(&self, project: &str) -> Result<Vec<String>, StoreError> {
        let key = project_key(project);
        if key.is_empty() {
            return Err(NameError::Empty.into());
        }
        self.with_conn(|conn| tags_on(conn, &key))
    }

    /// Tag lists for every project key that has tags, keyed by lowercase
    /// project name.
    pub fn tags_by_project(&self) -> Result<Vec<(String, Vec<String>)>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT project_key, tag FROM project_tags ORDER BY project_key, position ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
            for row in rows {
                let (key, tag) = row?;
                match grouped.last_mut() {
                    Some((last_key, tags)) if *last_key == key => tags.push(tag),
                    _ => grouped.push((key, vec![tag])),
                }
            }
            Ok(grouped)
        })
    }
}

fn ensure_table_on(conn: &Connection, project: &str) -> Result<String, StoreError> {
    let table = project_table_name(project)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
           task_id   INTEGER PRIMARY KEY,
           summary   TEXT NOT NULL,
           assignee  TEXT,
           remarks   TEXT,
           status    TEXT NOT NULL,
           priority  TEXT NOT NULL,
           highlight INTEGER NOT NULL DEFAULT 0
         )"
    ))?;
    // Tables written by pre-highlight builds get the column added in place.
    // This is the only schema evolution the store performs.
    let mut has_highlight = false;
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let column: String = row.get(1)?;
        if column == "highlight" {
            has_highlight = true;
            break;
        }
    }
    if !has_highlight {
        conn.execute_batch(&format!(
            "ALTER TABLE {table} ADD COLUMN highlight INTEGER NOT NULL DEFAULT 0"
        ))?;
    }
    Ok(table)
}

fn tags_on(conn: &Connection, key: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT tag FROM project_tags WHERE project_key = ?1 ORDER BY position ASC",
    )?;
    let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
    let mut tags = Vec::new();
    for tag in rows {
        tags.push(tag?);
    }
    Ok(tags)
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn fetch_all_on(conn: &Connection, table: &str) -> Result<Vec<Task>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT task_id, summary, assignee, remarks, status, priority, highlight \
         FROM {table} ORDER BY task_id ASC"
    ))?;
    let rows = stmt.query_map([], |row| {
        let status: String = row.get(4)?;
        let priority: String = row.get(5)?;
        Ok(Task {
            id: row.get(0)?,
            summary: row.get(1)?,
            assignee: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            remarks: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            status: TaskStatus::parse(&status).unwrap_or_default(),
            priority: TaskPriority::parse(&priority).unwrap_or_default(),
            highlight: row.get::<_, i64>(6)? != 0,
        })
    })?;
    let mut tasks = Vec::new();
    for task in rows {
        tasks.push(task?);
    }
    Ok(tasks)
}

fn upsert_on(conn: &Connection, table: &str, task: &Task) -> Result<(), StoreError> {
    conn.execute(
        &format!(
            "INSERT INTO {table} \
             (task_id, summary, assignee, remarks, status, priority, highlight) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(task_id) DO UPDATE SET \
               summary   = excluded.summary, \
               assignee  = excluded.assignee, \
               remarks   = excluded.remarks, \
               status    = excluded.status, \
               priority  = excluded.priority, \
               highlight = excluded.highlight"
        ),
        params![
            task.id,
            task.summary,
            task.assignee,
            task.remarks,
            task.status.as_str(),
            task.priority.as_str(),
            task.highlight as i64,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> TaskStore {
        TaskStore::new(temp.path().join("taskdeck.db"))
    }

    #[test]
    fn open_is_idempotent_and_close_is_safe_unopened() {
        let temp = TempDir::new().expect("tempdir");
        let store = store_in(&temp);
        store.close();
        store.open().expect("first open");
        store.open().expect("second open is a no-op");
        assert!(store.is_open());
        store.close();
        assert!(!store.is_open());
    }

    #[test]
    fn operations_before_open_fail_with_not_open() {
        let temp = TempDir::new().expect("tempdir");
        let store = store_in(&temp);
        assert!(matches!(store.fetch_all("alpha"), Err(StoreError::NotOpen)));
        assert!(matches!(store.ensure_table("alpha"), Err(StoreError::NotOpen)));
        assert!(matches!(store.delete("alpha", 0), Err(StoreError::NotOpen)));
        assert!(matches!(
            store.bulk_replace("alpha", &[]),
            Err(StoreError::NotOpen)
        ));
    }

    #[test]
    fn empty_project_name_is_rejected_before_sqlite() {
        let temp = TempDir::new().expect("tempdir");
        let store = store_in(&temp);
        store.open().expect("open");
        assert!(matches!(
            store.fetch_all("   "),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            store.upsert_project_name(""),
            Err(StoreError::InvalidName(_))
        ));
    }
}
