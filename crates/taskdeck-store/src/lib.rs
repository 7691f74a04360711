//! SQLite-backed storage for taskdeck.
//!
//! One database file holds every project: a `projects` registry table, a
//! `project_tags` table, and one lazily-created task table per project.
//! A single connection is shared behind one lock, so concurrent request
//! threads see a total order of storage operations.

pub mod error;
pub mod import;
mod store;

pub use error::StoreError;
pub use store::TaskStore;
