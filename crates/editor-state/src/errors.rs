pub type EditorStateResult<T> = Result<T, EditorStateError>;

#[derive(Debug, thiserror::Error)]
pub enum EditorStateError {
    #[error(transparent)]
    Text(#[from] editor_core::TextBufferError),

    #[error(transparent)]
    Persistence(#[from] persistence::PersistenceError),

    #[error(transparent)]
    SideFile(#[from] io::SideFileError),

    #[error("cannot open {path}: {source}")]
    Open {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// The document has never been given a path. Use a save-as flow instead.
    #[error("document is untitled; nowhere to save it")]
    Untitled,
}
