use std::path::PathBuf;
use std::sync::Mutex;

use taskdeck_store::TaskStore;

/// State shared by every request thread. The currently open project is a
/// server-global that `open` and `edit-name` mutate while any thread may
/// read it, so it sits behind its own mutex rather than piggybacking on
/// the storage lock.
pub struct ServerState {
    pub store: TaskStore,
    pub data_dir: PathBuf,
    pub ui_dir: Option<PathBuf>,
    current_project: Mutex<Option<String>>,
}

impl ServerState {
    pub fn new(store: TaskStore, data_dir: PathBuf, ui_dir: Option<PathBuf>) -> Self {
        Self {
            store,
            data_dir,
            ui_dir,
            current_project: Mutex::new(None),
        }
    }

    pub fn current_project(&self) -> Option<String> {
        match self.current_project.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_current_project(&self, name: Option<String>) {
        let mut guard = match self.current_project.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = name;
    }
}
