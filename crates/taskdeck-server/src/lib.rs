//! HTTP daemon for taskdeck.
//!
//! A thread-per-connection listener dispatches REST routes onto the
//! transport-independent API layer in [`api`], which in turn delegates to
//! the storage crate. Server-wide state is the store plus the currently
//! open project, shared behind [`ServerState`].

pub mod api;
pub mod http;
pub mod routes;
pub mod server;
mod state;

pub use state::ServerState;
