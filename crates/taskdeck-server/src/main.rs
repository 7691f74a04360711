use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use taskdeck_core::config::{load_config, resolve_data_dir};
use taskdeck_core::paths::db_path;
use taskdeck_server::server::serve;
use taskdeck_server::ServerState;
use taskdeck_store::TaskStore;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8765;

#[derive(Parser)]
#[command(name = "taskdeck-server", version, about = "Taskdeck HTTP daemon")]
struct Cli {
    /// Interface to bind. Defaults to loopback.
    #[arg(long, env = "TASKDECK_HOST")]
    host: Option<String>,
    /// TCP port to listen on.
    #[arg(long, env = "TASKDECK_PORT")]
    port: Option<u16>,
    /// Directory holding the database file and markdown exports.
    #[arg(long, env = "TASKDECK_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Directory of static UI assets served on unmatched paths.
    #[arg(long, env = "TASKDECK_UI_DIR")]
    ui_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TASKDECK_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config().context("failed to load config file")?;

    let host = cli
        .host
        .or_else(|| config.as_ref().and_then(|c| c.host.clone()))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = cli
        .port
        .or_else(|| config.as_ref().and_then(|c| c.port))
        .unwrap_or(DEFAULT_PORT);
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| resolve_data_dir(config.as_ref()));
    let ui_dir = cli
        .ui_dir
        .or_else(|| config.as_ref().and_then(|c| c.ui_dir.clone().map(PathBuf::from)));

    let store = TaskStore::new(db_path(&data_dir));
    store
        .open()
        .with_context(|| format!("failed to open database in {}", data_dir.display()))?;

    let listener = TcpListener::bind((host.as_str(), port))
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    info!(%host, port, data_dir = %data_dir.display(), "taskdeck server listening");

    let state = Arc::new(ServerState::new(store, data_dir, ui_dir));
    serve(listener, state)?;
    Ok(())
}
