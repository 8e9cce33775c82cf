use std::io::Write;

/// Side-file name used when the document has never been saved anywhere.
pub const UNTITLED_SIDE_FILE: &str = ".untitled.swp";

/// How a side-file write reaches the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Write a sibling temp file, fsync it, then rename it over the target.
    /// A crash mid-write leaves the previous side-file intact.
    #[default]
    Atomic,
    /// Truncate the target and write in place. A crash mid-write leaves a
    /// partial file, which the decoder rejects at its end-marker check.
    Truncate,
}

/// The swap side-file that shadows one document.
///
/// For a document at `dir/name` the side-file lives at `dir/.name.swp`.
/// Untitled documents use [`UNTITLED_SIDE_FILE`] in a chosen directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideFile {
    original: Option<std::path::PathBuf>,
    path: std::path::PathBuf,
}

/// A read-only memory map of a side-file, kept alive with its file handle.
#[derive(Debug)]
pub struct MappedFile {
    _file: std::fs::File,
    mmap: memmap2::Mmap,
}

impl MappedFile {
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

/*

====================
===== CREATION =====
====================

*/

impl SideFile {
    /// Derives the side-file location for a document at `original`.
    #[must_use]
    pub fn for_document(original: impl AsRef<std::path::Path>) -> Self {
        let original = original.as_ref().to_path_buf();
        let mut name = std::ffi::OsString::from(".");

        name.push(original.file_name().unwrap_or(original.as_os_str()));
        name.push(".swp");

        let path = match original.parent() {
            Some(dir) => dir.join(name),
            None => std::path::PathBuf::from(name),
        };

        Self {
            original: Some(original),
            path,
        }
    }

    /// Side-file for an untitled document, placed in `dir`.
    #[must_use]
    pub fn untitled_in(dir: impl AsRef<std::path::Path>) -> Self {
        Self {
            original: None,
            path: dir.as_ref().join(UNTITLED_SIDE_FILE),
        }
    }

    /// Side-file for an untitled document in the working directory.
    #[must_use]
    pub fn untitled() -> Self {
        Self {
            original: None,
            path: std::path::PathBuf::from(UNTITLED_SIDE_FILE),
        }
    }
}

/*

===========================
========= QUERIES =========
===========================

*/

impl SideFile {
    #[inline]
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn original_path(&self) -> Option<&std::path::Path> {
        self.original.as_deref()
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Crash-recovery heuristic: the side-file counts as newer when its
    /// modification time is strictly later than the original's, or when the
    /// original does not exist (or the document is untitled).
    ///
    /// A missing side-file is never newer.
    #[must_use]
    pub fn is_newer_than_original(&self) -> bool {
        let Some(side_mtime) = modified(&self.path) else {
            return false;
        };

        match self.original.as_deref().and_then(modified) {
            Some(original_mtime) => side_mtime > original_mtime,
            None => true,
        }
    }
}

fn modified(path: &std::path::Path) -> Option<std::time::SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/*

==================================
===== READ, WRITE, & REMOVE ======
==================================

*/

impl SideFile {
    /// Maps the side-file into memory for decoding.
    ///
    /// # Errors
    ///
    /// Returns [`SideFileError::Unreadable`] if the file cannot be opened or mapped.
    ///
    /// [`SideFileError::Unreadable`]: crate::errors::SideFileError::Unreadable
    pub fn map(&self) -> crate::errors::SideFileResult<MappedFile> {
        let unreadable = |source| crate::errors::SideFileError::Unreadable {
            path: self.path.clone(),
            source,
        };
        let file = std::fs::File::open(&self.path).map_err(unreadable)?;

        // SAFETY:
        // - File is opened read-only
        // - We keep the file handle alive in the struct
        // - Writers replace the file by rename, so the mapped inode is not truncated
        //   underneath us in the default write mode
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(unreadable)?;

        tracing::trace!(path = %self.path.display(), bytes = mmap.len(), "side-file mapped");

        Ok(MappedFile { _file: file, mmap })
    }

    /// Replaces the side-file's content with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`SideFileError::Write`] if any step of the write fails.
    ///
    /// [`SideFileError::Write`]: crate::errors::SideFileError::Write
    pub fn write(&self, bytes: &[u8], mode: WriteMode) -> crate::errors::SideFileResult<()> {
        match mode {
            WriteMode::Atomic => write_atomic(&self.path, bytes),
            WriteMode::Truncate => write_truncate(&self.path, bytes),
        }
    }

    /// Deletes the side-file. Removing a file that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`SideFileError::Remove`] for any failure other than `NotFound`.
    ///
    /// [`SideFileError::Remove`]: crate::errors::SideFileError::Remove
    pub fn remove(&self) -> crate::errors::SideFileResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "side-file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(crate::errors::SideFileError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Writes `bytes` to `target` through a temp file in the same directory.
///
/// The temp file must share the target's directory: a rename across
/// filesystems is not atomic and may fail outright.
///
/// # Errors
///
/// Returns [`SideFileError::Write`] if the temp file cannot be created,
/// written, synced, or renamed into place.
///
/// [`SideFileError::Write`]: crate::errors::SideFileError::Write
pub fn write_atomic(target: &std::path::Path, bytes: &[u8]) -> crate::errors::SideFileResult<()> {
    let failed = |source| crate::errors::SideFileError::Write {
        path: target.to_path_buf(),
        source,
    };
    let parent_dir = target
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));

    let mut temp_file = tempfile::Builder::new()
        .prefix(".save_tmp_")
        .tempfile_in(parent_dir)
        .map_err(failed)?;

    temp_file.write_all(bytes).map_err(failed)?;
    temp_file.as_file().sync_all().map_err(failed)?;
    temp_file.persist(target).map_err(|e| failed(e.error))?;

    tracing::debug!(path = %target.display(), bytes = bytes.len(), "atomic write finished");

    Ok(())
}

fn write_truncate(target: &std::path::Path, bytes: &[u8]) -> crate::errors::SideFileResult<()> {
    let failed = |source| crate::errors::SideFileError::Write {
        path: target.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::create(target).map_err(failed)?;

    file.write_all(bytes).map_err(failed)?;
    file.sync_all().map_err(failed)?;

    tracing::debug!(path = %target.display(), bytes = bytes.len(), "truncating write finished");

    Ok(())
}

#[cfg(test)]
mod side_file_path_tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_path_is_hidden_sibling() {
        let side = SideFile::for_document("/home/me/notes/todo.txt");

        assert_eq!(side.path(), Path::new("/home/me/notes/.todo.txt.swp"));
        assert_eq!(side.original_path(), Some(Path::new("/home/me/notes/todo.txt")));
    }

    #[test]
    fn test_bare_file_name_stays_relative() {
        let side = SideFile::for_document("draft.md");

        assert_eq!(side.path(), Path::new(".draft.md.swp"));
    }

    #[test]
    fn test_untitled_uses_fixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let side = SideFile::untitled_in(dir.path());

        assert_eq!(side.path(), dir.path().join(UNTITLED_SIDE_FILE));
        assert!(side.original_path().is_none());
        assert_eq!(SideFile::untitled().path(), Path::new(UNTITLED_SIDE_FILE));
    }
}

#[cfg(test)]
mod side_file_io_tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn set_mtime(path: &std::path::Path, when: SystemTime) {
        std::fs::OpenOptions::new()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    #[test]
    fn test_write_then_map_both_modes() {
        let dir = tempfile::tempdir().unwrap();
        let side = SideFile::for_document(dir.path().join("doc.txt"));

        for mode in [WriteMode::Atomic, WriteMode::Truncate] {
            side.write(b"payload\nbytes", mode).unwrap();

            assert!(side.exists());
            assert_eq!(side.map().unwrap().as_slice(), b"payload\nbytes");
        }
    }

    #[test]
    fn test_atomic_write_overwrites_longer_file() {
        let dir = tempfile::tempdir().unwrap();
        let side = SideFile::untitled_in(dir.path());

        side.write(b"a much longer first version", WriteMode::Atomic).unwrap();
        side.write(b"short", WriteMode::Atomic).unwrap();

        assert_eq!(side.map().unwrap().as_slice(), b"short");
    }

    #[test]
    fn test_map_missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let side = SideFile::untitled_in(dir.path());

        let err = side.map().unwrap_err();

        assert!(matches!(err, crate::errors::SideFileError::Unreadable { .. }));
        assert_eq!(err.path(), side.path());
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let side = SideFile::for_document(dir.path().join("nope").join("doc.txt"));

        let result = side.write(b"x", WriteMode::Atomic);

        assert!(matches!(result, Err(crate::errors::SideFileError::Write { .. })));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let side = SideFile::untitled_in(dir.path());

        side.write(b"x", WriteMode::Truncate).unwrap();
        side.remove().unwrap();
        side.remove().unwrap();

        assert!(!side.exists());
    }

    #[test]
    fn test_newer_than_original_uses_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("doc.txt");
        let side = SideFile::for_document(&original);
        let earlier = SystemTime::now() - Duration::from_secs(120);
        let later = SystemTime::now() - Duration::from_secs(60);

        assert!(!side.is_newer_than_original(), "no side-file yet");

        side.write(b"swap", WriteMode::Atomic).unwrap();
        assert!(side.is_newer_than_original(), "original missing");

        std::fs::write(&original, b"doc").unwrap();
        set_mtime(&original, later);
        set_mtime(side.path(), earlier);
        assert!(!side.is_newer_than_original());

        set_mtime(side.path(), later + Duration::from_secs(30));
        assert!(side.is_newer_than_original());
    }

    #[test]
    fn test_untitled_side_file_is_always_newer() {
        let dir = tempfile::tempdir().unwrap();
        let side = SideFile::untitled_in(dir.path());

        side.write(b"swap", WriteMode::Truncate).unwrap();

        assert!(side.is_newer_than_original());
    }

    #[test]
    fn test_write_atomic_to_document() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("doc.txt");

        write_atomic(&target, b"saved").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"saved");
    }
}
