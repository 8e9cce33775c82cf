pub type SideFileResult<T> = Result<T, SideFileError>;

/// Every variant carries the path that failed so log lines are actionable.
#[derive(Debug, thiserror::Error)]
pub enum SideFileError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("cannot remove {path}: {source}")]
    Remove {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

impl SideFileError {
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            SideFileError::Unreadable { path, .. }
            | SideFileError::Write { path, .. }
            | SideFileError::Remove { path, .. } => path,
        }
    }
}
