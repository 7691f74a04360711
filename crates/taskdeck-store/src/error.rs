use taskdeck_core::table::NameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database connection is not open")]
    NotOpen,
    #[error(transparent)]
    InvalidName(#[from] NameError),
    #[error("Task payload missing required field: {0}")]
    MissingField(&'static str),
    #[error("Task payload has invalid value for field: {0}")]
    InvalidField(&'static str),
    #[error("Project '{0}' not found")]
    UnknownProject(String),
    #[error("Project name '{0}' already exists")]
    NameConflict(String),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Client-caused failures map to 400 at the API boundary; everything
    /// else is a storage failure and maps to 500.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidName(_)
                | Self::MissingField(_)
                | Self::InvalidField(_)
                | Self::UnknownProject(_)
                | Self::NameConflict(_)
        )
    }
}
