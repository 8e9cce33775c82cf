use crate::shared::{DocumentState, SharedDocument};

/// Cursor movements the input layer can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Left,
    Right,
    Up,
    Down,
    LineStart,
    LineEnd,
}

/// What startup recovery did with the side-file.
#[derive(Debug)]
pub enum Recovery {
    /// There was nothing to recover.
    NoSideFile,
    /// The side-file was older than the document and has been removed.
    Stale,
    /// The side-file replaced the document's text and cursor.
    Recovered { cursor_position: usize, bytes: usize },
    /// The side-file could not be adopted. The document is untouched and the
    /// side-file is left on disk for inspection.
    Rejected(persistence::DecodeError),
}

/// One open document: its text, its cursor, and the autosave that shadows it.
///
/// The session owns the editable state. The autosave thread only ever reads it
/// through [`SharedDocument`]'s lock, and is joined before the session is gone.
pub struct DocumentSession {
    document: SharedDocument,
    autosave: persistence::Autosave,
    original: Option<std::path::PathBuf>,
    span: tracing::Span,
}

/*

==================================
===== CREATION, OPEN, & CLOSE ====
==================================

*/

impl DocumentSession {
    /// Creates an empty, untitled document whose side-file lives in `dir`.
    pub fn untitled_in(
        dir: impl AsRef<std::path::Path>,
        config: persistence::AutosaveConfig,
        span: tracing::Span,
    ) -> Self {
        Self::assemble(
            DocumentState::default(),
            io::SideFile::untitled_in(dir),
            None,
            config,
            span,
        )
    }

    /// Opens the document at `path`. A path that does not exist yet gives an
    /// empty document that will be created on first save.
    ///
    /// The file's bytes are kept verbatim, valid UTF-8 or not.
    ///
    /// # Errors
    ///
    /// Returns [`EditorStateError::Open`] if the file exists but cannot be read.
    ///
    /// [`EditorStateError::Open`]: crate::errors::EditorStateError::Open
    pub fn open(
        path: impl AsRef<std::path::Path>,
        config: persistence::AutosaveConfig,
        span: tracing::Span,
    ) -> crate::errors::EditorStateResult<Self> {
        let path = path.as_ref().to_path_buf();

        let text = match std::fs::read(&path) {
            Ok(bytes) => editor_core::TextBuffer::from_bytes(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => editor_core::TextBuffer::new(),
            Err(source) => return Err(crate::errors::EditorStateError::Open { path, source }),
        };

        span.in_scope(|| {
            tracing::info!(path = %path.display(), bytes = text.len(), "document opened");
        });

        Ok(Self::assemble(
            DocumentState {
                text,
                cursor: editor_core::Cursor::default(),
            },
            io::SideFile::for_document(&path),
            Some(path),
            config,
            span,
        ))
    }

    fn assemble(
        state: DocumentState,
        side_file: io::SideFile,
        original: Option<std::path::PathBuf>,
        config: persistence::AutosaveConfig,
        span: tracing::Span,
    ) -> Self {
        let document = SharedDocument::new(state);
        let source: std::sync::Arc<dyn persistence::SnapshotSource> =
            std::sync::Arc::new(document.clone());
        let autosave = persistence::Autosave::new(side_file, source, config, span.clone());

        Self {
            document,
            autosave,
            original,
            span,
        }
    }

    /// Clean shutdown: stops autosave, then deletes the side-file.
    ///
    /// # Errors
    ///
    /// Returns an error if the autosave thread panicked or the side-file
    /// cannot be removed.
    pub fn close(&mut self) -> crate::errors::EditorStateResult<()> {
        let _entered = self.span.enter();

        self.autosave.stop()?;
        self.autosave.side_file().remove()?;

        tracing::info!("document session closed");

        Ok(())
    }
}

/*

=============================
===== READ-ONLY QUERIES =====
=============================

*/

impl DocumentSession {
    #[must_use]
    pub fn text(&self) -> String {
        self.document.read().text.get_text()
    }

    /// The document's raw bytes. [`DocumentSession::text`] is the lossy view.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.document.read().text.to_bytes()
    }

    /// Text of `line` without its terminator, or `None` past the last line.
    #[must_use]
    pub fn line(&self, line: usize) -> Option<String> {
        self.document.read().text.get_line(line)
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.document.read().text.line_count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.document.read().text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn cursor_position(&self) -> usize {
        self.document.read().cursor.position()
    }

    #[must_use]
    pub fn cursor_line(&self) -> usize {
        let state = self.document.read();
        state.cursor.line(&state.text)
    }

    #[must_use]
    pub fn cursor_column(&self) -> usize {
        let state = self.document.read();
        state.cursor.column(&state.text)
    }

    /// True when edits have happened since the last side-file write.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.autosave.is_dirty()
    }

    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        self.original.as_deref()
    }

    #[must_use]
    pub fn side_file(&self) -> &io::SideFile {
        self.autosave.side_file()
    }

    /// Handle to the shared state, for callers that render from another thread.
    #[must_use]
    pub fn shared(&self) -> &SharedDocument {
        &self.document
    }
}

/*

========================================
========= INSERTION & DELETION =========
========================================

*/

impl DocumentSession {
    /// Inserts `text` at the cursor and leaves the cursor after it.
    ///
    /// # Errors
    ///
    /// Returns [`TextBufferError::OutOfRange`] if the cursor no longer points
    /// inside the text.
    ///
    /// [`TextBufferError::OutOfRange`]: editor_core::TextBufferError::OutOfRange
    pub fn insert_text(&mut self, text: &str) -> crate::errors::EditorStateResult<()> {
        if text.is_empty() {
            return Ok(());
        }

        let _entered = self.span.enter();

        {
            let mut state = self.document.write();
            let DocumentState { text: buffer, cursor } = &mut *state;
            let position = cursor.position();

            buffer.insert(position, text)?;
            cursor.set_position(position + text.len());
            cursor.sync_preferred_column(buffer);

            tracing::trace!(position, bytes = text.len(), "inserted");
        }

        self.mark_dirty();

        Ok(())
    }

    /// # Errors
    ///
    /// See [`DocumentSession::insert_text`].
    pub fn insert_char(&mut self, ch: char) -> crate::errors::EditorStateResult<()> {
        let mut encoded = [0u8; 4];

        self.insert_text(ch.encode_utf8(&mut encoded))
    }

    /// # Errors
    ///
    /// See [`DocumentSession::insert_text`].
    pub fn insert_newline(&mut self) -> crate::errors::EditorStateResult<()> {
        self.insert_char('\n')
    }

    /// Backspace. Returns whether anything was deleted.
    pub fn delete_char_before_cursor(&mut self) -> bool {
        let _entered = self.span.enter();

        let deleted = {
            let mut state = self.document.write();
            let DocumentState { text, cursor } = &mut *state;
            let position = cursor.position().min(text.len());

            if position == 0 {
                return false;
            }

            let removed = text.erase(position - 1, 1);
            tracing::trace!(position, removed, "backspace");
            cursor.set_position(position - removed);
            cursor.sync_preferred_column(text);
            removed > 0
        };

        if deleted {
            self.mark_dirty();
        }

        deleted
    }

    /// Forward delete. Returns whether anything was deleted.
    pub fn delete_char_at_cursor(&mut self) -> bool {
        let _entered = self.span.enter();

        let deleted = {
            let mut state = self.document.write();
            let position = state.cursor.position();

            state.text.erase(position, 1) > 0
        };

        if deleted {
            self.mark_dirty();
        }

        deleted
    }

    /// Moves the cursor. Movement alone does not dirty the document.
    pub fn move_cursor(&mut self, motion: Motion) {
        let mut state = self.document.write();
        let DocumentState { text, cursor } = &mut *state;

        match motion {
            Motion::Left => cursor.move_left(text),
            Motion::Right => cursor.move_right(text),
            Motion::Up => cursor.move_up(text),
            Motion::Down => cursor.move_down(text),
            Motion::LineStart => cursor.move_to_line_start(text),
            Motion::LineEnd => cursor.move_to_line_end(text),
        }

        tracing::trace!(parent: &self.span, ?motion, position = cursor.position(), "cursor moved");
    }
}

/*

==============================
===== AUTOSAVE & SAVING ======
==============================

*/

impl DocumentSession {
    #[inline]
    pub fn mark_dirty(&self) {
        self.autosave.mark_dirty();
    }

    /// # Errors
    ///
    /// Returns an error if the autosave thread cannot be spawned.
    pub fn start_autosave(&mut self) -> crate::errors::EditorStateResult<()> {
        Ok(self.autosave.start()?)
    }

    /// # Errors
    ///
    /// Returns an error if the autosave thread panicked.
    pub fn stop_autosave(&mut self) -> crate::errors::EditorStateResult<()> {
        Ok(self.autosave.stop()?)
    }

    #[must_use]
    pub fn is_autosave_running(&self) -> bool {
        self.autosave.is_running()
    }

    /// Writes the side-file immediately, dirty or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the side-file cannot be written; the caller should
    /// surface this to the user.
    pub fn save_now(&self) -> crate::errors::EditorStateResult<usize> {
        Ok(self.autosave.save_now()?)
    }

    /// Writes the document itself to its path, then drops the side-file.
    /// The session is clean afterwards, so autosave does not recreate the
    /// side-file until the next edit.
    ///
    /// # Errors
    ///
    /// [`EditorStateError::Untitled`] for a document without a path, or a
    /// side-file error if the write or the cleanup fails.
    ///
    /// [`EditorStateError::Untitled`]: crate::errors::EditorStateError::Untitled
    pub fn save_document(&self) -> crate::errors::EditorStateResult<()> {
        let _entered = self.span.enter();
        let path = self
            .original
            .as_deref()
            .ok_or(crate::errors::EditorStateError::Untitled)?;
        let written = self.autosave.settle(|| {
            let bytes = self.document.read().text.to_bytes();

            io::write_atomic(path, &bytes)?;
            Ok::<_, crate::errors::EditorStateError>(bytes.len())
        })?;

        tracing::info!(path = %path.display(), bytes = written, "document saved");

        Ok(())
    }
}

/*

=========================
===== CRASH RECOVERY ====
=========================

*/

impl DocumentSession {
    /// Startup recovery.
    ///
    /// - No side-file: nothing happens.
    /// - Side-file older than the document: it is stale and gets removed.
    /// - Otherwise it is decoded; on success it replaces the text and cursor,
    ///   on failure the document is left exactly as it was.
    pub fn load_from_side_file_if_newer(&mut self) -> Recovery {
        let _entered = self.span.enter();
        let side_file = self.autosave.side_file();

        if !side_file.exists() {
            return Recovery::NoSideFile;
        }

        if !side_file.is_newer_than_original() {
            tracing::info!(path = %side_file.path().display(), "removing stale side-file");
            if let Err(e) = side_file.remove() {
                tracing::warn!(error = %e, "stale side-file could not be removed");
            }
            return Recovery::Stale;
        }

        tracing::warn!(path = %side_file.path().display(), "side-file detected; attempting crash recovery");

        let decoded = match persistence::recovery::read_side_file(side_file) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::error!(error = %e, "side-file rejected; keeping the document as opened");
                return Recovery::Rejected(e);
            }
        };

        let mut state = self.document.write();
        let DocumentState { text, cursor } = &mut *state;

        *text = editor_core::TextBuffer::from_bytes(&decoded.content);
        cursor.set_position(decoded.cursor_position);
        cursor.clamp_to(text);
        cursor.set_preferred_column(decoded.preferred_column);

        tracing::info!(
            bytes = text.len(),
            cursor = cursor.position(),
            "recovered from side-file"
        );

        Recovery::Recovered {
            cursor_position: cursor.position(),
            bytes: text.len(),
        }
    }
}
