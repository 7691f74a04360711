use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use taskdeck_core::config::resolve_data_dir;
use taskdeck_core::paths::db_path;
use taskdeck_store::{import, TaskStore};

mod client;

use client::{encode_segment, ApiClient, DEFAULT_HOST, DEFAULT_PORT};

#[derive(Parser)]
#[command(name = "taskdeck", version, about = "Taskdeck console client")]
struct Cli {
    /// Server host.
    #[arg(long, env = "TASKDECK_HOST", default_value = DEFAULT_HOST)]
    host: String,
    /// Server port.
    #[arg(long, env = "TASKDECK_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether the server is reachable
    Health,
    /// List known projects and the currently open one
    Projects,
    /// Show the currently open project
    State,
    /// Open (or create) a project
    Open { name: String },
    /// Rename a project
    Rename { old_name: String, new_name: String },
    /// List a project's tasks
    Tasks { project: String },
    /// Create a task
    Create {
        project: String,
        #[arg(long, default_value = "")]
        summary: String,
        #[arg(long, default_value = "")]
        assignee: String,
        #[arg(long, default_value = "")]
        remarks: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Update fields of a task
    Update {
        project: String,
        id: i64,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        remarks: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Set or clear a task's highlight flag
    Highlight {
        project: String,
        id: i64,
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        on: bool,
    },
    /// Delete a task
    Delete { project: String, id: i64 },
    /// Highlighted tasks across all projects
    Highlights,
    /// List a project's tags
    Tags { project: String },
    /// Add tags to a project
    TagAdd {
        project: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Remove one tag from a project
    TagRemove { project: String, tag: String },
    /// Ask the server to shut down gracefully
    Exit,
    /// Replace a project's task set from a JSON file (offline, bypasses the server)
    Import {
        project: String,
        file: PathBuf,
        /// Data directory holding the database file.
        #[arg(long, env = "TASKDECK_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::new(cli.host.clone(), cli.port);

    let reply = match cli.command {
        Command::Health => {
            if client.is_available() {
                json!({ "status": "ok" })
            } else {
                anyhow::bail!("server at {}:{} is not reachable", cli.host, cli.port);
            }
        }
        Command::Projects => client.get_json("/api/projects")?,
        Command::State => client.get_json("/api/state")?,
        Command::Open { name } => {
            client.post_json("/api/projects/open", &json!({ "name": name }))?
        }
        Command::Rename { old_name, new_name } => client.post_json(
            "/api/projects/edit-name",
            &json!({ "old_name": old_name, "new_name": new_name }),
        )?,
        Command::Tasks { project } => {
            client.get_json(&format!("/api/projects/{}/tasks", encode_segment(&project)))?
        }
        Command::Create {
            project,
            summary,
            assignee,
            remarks,
            status,
            priority,
        } => {
            let mut payload = json!({
                "summary": summary,
                "assignee": assignee,
                "remarks": remarks,
            });
            if let Some(status) = status {
                payload["status"] = json!(status);
            }
            if let Some(priority) = priority {
                payload["priority"] = json!(priority);
            }
            client.post_json(
                &format!("/api/projects/{}/tasks/create", encode_segment(&project)),
                &payload,
            )?
        }
        Command::Update {
            project,
            id,
            summary,
            assignee,
            remarks,
            status,
            priority,
        } => {
            let mut fields = serde_json::Map::new();
            if let Some(summary) = summary {
                fields.insert("summary".into(), json!(summary));
            }
            if let Some(assignee) = assignee {
                fields.insert("assignee".into(), json!(assignee));
            }
            if let Some(remarks) = remarks {
                fields.insert("remarks".into(), json!(remarks));
            }
            if let Some(status) = status {
                fields.insert("status".into(), json!(status));
            }
            if let Some(priority) = priority {
                fields.insert("priority".into(), json!(priority));
            }
            client.post_json(
                &format!("/api/projects/{}/tasks/update", encode_segment(&project)),
                &json!({ "id": id, "fields": fields }),
            )?
        }
        Command::Highlight { project, id, on } => client.post_json(
            &format!("/api/projects/{}/tasks/highlight", encode_segment(&project)),
            &json!({ "id": id, "highlight": on }),
        )?,
        Command::Delete { project, id } => client.post_json(
            &format!("/api/projects/{}/tasks/delete", encode_segment(&project)),
            &json!({ "id": id }),
        )?,
        Command::Highlights => client.get_json("/api/highlights")?,
        Command::Tags { project } => {
            client.get_json(&format!("/api/projects/{}/tags", encode_segment(&project)))?
        }
        Command::TagAdd { project, tags } => client.post_json(
            &format!("/api/projects/{}/tags/add", encode_segment(&project)),
            &json!({ "tags": tags }),
        )?,
        Command::TagRemove { project, tag } => client.post_json(
            &format!("/api/projects/{}/tags/remove", encode_segment(&project)),
            &json!({ "tag": tag }),
        )?,
        Command::Exit => client.post_json("/api/exit", &json!({}))?,
        Command::Import {
            project,
            file,
            data_dir,
        } => import_tasks(&project, &file, data_dir)?,
    };

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

/// Offline migration path: reads a JSON array of task objects and swaps it
/// in as the project's entire task set in one transaction. Runs against
/// the database file directly, so the server should not be running.
fn import_tasks(project: &str, file: &PathBuf, data_dir: Option<PathBuf>) -> Result<Value> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let payload: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;
    let tasks = import::tasks_from_payload(&payload)
        .with_context(|| format!("{} has invalid task entries", file.display()))?;

    let data_dir = data_dir.unwrap_or_else(|| {
        let config = taskdeck_core::config::load_config().ok().flatten();
        resolve_data_dir(config.as_ref())
    });
    let store = TaskStore::new(db_path(&data_dir));
    store.open().context("failed to open database")?;
    let canonical = store.upsert_project_name(project)?;
    store.bulk_replace(&canonical, &tasks)?;
    store.close();
    Ok(json!({ "ok": true, "project": canonical, "imported": tasks.len() }))
}
