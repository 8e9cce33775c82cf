pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Why a side-file could not be adopted. Callers treat each case differently:
/// an unreadable file may be retried, a foreign header is never touched, and a
/// malformed body usually means a write was cut short.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("side-file unreadable: {0}")]
    Unreadable(#[source] io::SideFileError),

    #[error("bad side-file header: expected {expected:?}, found {found:?}")]
    BadHeader {
        expected: &'static str,
        found: String,
    },

    #[error("malformed side-file body: {0}")]
    MalformedBody(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Io(#[from] io::SideFileError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("autosave is already running")]
    AlreadyRunning,

    #[error("autosave is not running")]
    NotRunning,

    #[error("failed to spawn the autosave thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("the autosave thread panicked")]
    WorkerPanicked,
}
