use std::path::{Path, PathBuf};

use crate::table::project_key;

/// Path of the shared SQLite database file inside the data directory.
pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("taskdeck.db")
}

/// Path of a project's markdown export. Derived from the lowercased name,
/// which is why project names may not contain path separators or dots.
pub fn markdown_export_path(data_dir: &Path, project_name: &str) -> PathBuf {
    data_dir.join(format!("{}_tasks_export.md", project_key(project_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_path_uses_lowercased_name() {
        let dir = Path::new("/tmp/data");
        assert_eq!(
            markdown_export_path(dir, "Alpha"),
            dir.join("alpha_tasks_export.md")
        );
        assert_eq!(
            markdown_export_path(dir, "alpha"),
            markdown_export_path(dir, "ALPHA")
        );
    }
}
