//! Derivation of storage identifiers from project display names.
//!
//! Each project's tasks live in their own table. The table name is derived
//! from the lowercased display name, so `"Alpha"` and `"alpha"` always map
//! to the same table.

use thiserror::Error;

pub const TABLE_PREFIX: &str = "tasks_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("Project name must be a non-empty string")]
    Empty,
}

/// Lowercased registry/tags key for a project name.
pub fn project_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Safe SQL table identifier for a project: `tasks_` plus the lowercased
/// name with every character outside `[a-z0-9_]` replaced by `_`.
pub fn project_table_name(name: &str) -> Result<String, NameError> {
    let base = project_key(name);
    if base.is_empty() {
        return Err(NameError::Empty);
    }
    let mut out = String::with_capacity(TABLE_PREFIX.len() + base.len());
    out.push_str(TABLE_PREFIX);
    for ch in base.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_whitespace_names() {
        assert_eq!(project_table_name(""), Err(NameError::Empty));
        assert_eq!(project_table_name("   "), Err(NameError::Empty));
    }

    #[test]
    fn sanitizes_path_characters() {
        assert_eq!(project_table_name("Alpha/Beta").unwrap(), "tasks_alpha_beta");
        assert_eq!(project_table_name("My Project!").unwrap(), "tasks_my_project_");
    }

    #[test]
    fn case_insensitive_names_share_a_table() {
        assert_eq!(
            project_table_name("Demo").unwrap(),
            project_table_name("dEmO").unwrap()
        );
    }

    #[test]
    fn keeps_digits_and_underscores() {
        assert_eq!(project_table_name("proj_42").unwrap(), "tasks_proj_42");
    }
}
