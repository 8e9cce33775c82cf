//! The document state handed between the editing thread and the autosave thread.
//!
//! Both threads go through one reader-writer lock: edits take the write side
//! for the whole mutation, snapshots take the read side for the whole copy.
//! Nobody keeps a reference into the buffer once the guard is gone.

/// Text and cursor, always mutated together.
#[derive(Debug, Default)]
pub struct DocumentState {
    pub text: editor_core::TextBuffer,
    pub cursor: editor_core::Cursor,
}

#[derive(Debug, Clone, Default)]
pub struct SharedDocument {
    inner: std::sync::Arc<std::sync::RwLock<DocumentState>>,
}

impl SharedDocument {
    #[must_use]
    pub fn new(state: DocumentState) -> Self {
        Self {
            inner: std::sync::Arc::new(std::sync::RwLock::new(state)),
        }
    }

    /// Shared access. A panic on another thread while it held the lock does
    /// not make the document unreadable.
    pub fn read(&self) -> std::sync::RwLockReadGuard<'_, DocumentState> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn write(&self) -> std::sync::RwLockWriteGuard<'_, DocumentState> {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl persistence::SnapshotSource for SharedDocument {
    fn capture(&self) -> persistence::DocumentSnapshot {
        let state = self.read();

        persistence::DocumentSnapshot {
            content: state.text.to_bytes(),
            cursor_position: state.cursor.position(),
            cursor_line: state.cursor.line(&state.text),
            preferred_column: state.cursor.preferred_column(),
        }
    }
}
