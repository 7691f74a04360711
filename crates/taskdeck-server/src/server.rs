//! Accept loop and graceful shutdown.
//!
//! One thread per inbound connection, no pool. Shutdown is a drain: once
//! the `/api/exit` handler flips the flag the listener stops accepting,
//! every in-flight handler thread is joined, and only then does the store
//! close. The exit response itself is flushed before the flag is set, so
//! the triggering exchange always completes.

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::http::read_request;
use crate::routes::handle_request;
use crate::state::ServerState;

const ACCEPT_POLL: Duration = Duration::from_millis(25);
const STREAM_TIMEOUT: Duration = Duration::from_secs(5);

pub fn serve(listener: TcpListener, state: Arc<ServerState>) -> std::io::Result<()> {
    listener.set_nonblocking(true)?;
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut workers: Vec<JoinHandle<()>> = Vec::new();

    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let state = Arc::clone(&state);
                let shutdown = Arc::clone(&shutdown);
                workers.push(thread::spawn(move || {
                    if let Err(err) = handle_client(stream, &state, &shutdown) {
                        debug!(%peer, %err, "connection ended with error");
                    }
                }));
                workers.retain(|handle| !handle.is_finished());
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                warn!(%err, "accept failed");
            }
        }
    }

    info!("draining in-flight requests");
    for handle in workers {
        let _ = handle.join();
    }
    state.store.close();
    info!("server stopped");
    Ok(())
}

fn handle_client(
    mut stream: TcpStream,
    state: &ServerState,
    shutdown: &AtomicBool,
) -> std::io::Result<()> {
    let _ = stream.set_read_timeout(Some(STREAM_TIMEOUT));
    let _ = stream.set_write_timeout(Some(STREAM_TIMEOUT));
    let Some(request) = read_request(&mut stream)? else {
        return Ok(());
    };
    handle_request(&mut stream, state, shutdown, &request)
}
