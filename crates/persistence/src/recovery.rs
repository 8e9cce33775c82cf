//! Reading a side-file back for crash recovery.

/// Maps `side_file` and decodes it.
///
/// # Errors
///
/// [`DecodeError::Unreadable`] when the file cannot be opened or mapped;
/// otherwise whatever [`codec::decode`] reports.
///
/// [`DecodeError::Unreadable`]: crate::errors::DecodeError::Unreadable
/// [`codec::decode`]: crate::codec::decode
pub fn read_side_file(
    side_file: &io::SideFile,
) -> Result<crate::codec::DecodedSnapshot, crate::errors::DecodeError> {
    let mapped = side_file
        .map()
        .map_err(crate::errors::DecodeError::Unreadable)?;
    let decoded = crate::codec::decode(mapped.as_slice())?;

    tracing::info!(
        path = %side_file.path().display(),
        timestamp = decoded.timestamp,
        bytes = decoded.content.len(),
        "side-file decoded"
    );

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DocumentSnapshot, encode};
    use crate::errors::DecodeError;

    #[test]
    fn test_read_written_side_file() {
        let dir = tempfile::tempdir().unwrap();
        let side = io::SideFile::for_document(dir.path().join("doc.txt"));
        let snapshot = DocumentSnapshot {
            content: b"Hello\nWorld".to_vec(),
            cursor_position: 6,
            cursor_line: 1,
            preferred_column: 0,
        };

        side.write(&encode(&snapshot, 7), io::WriteMode::Atomic)
            .unwrap();
        let decoded = read_side_file(&side).unwrap();

        assert_eq!(decoded.content, b"Hello\nWorld");
        assert_eq!(decoded.cursor_position, 6);
    }

    #[test]
    fn test_missing_side_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let side = io::SideFile::untitled_in(dir.path());

        assert!(matches!(read_side_file(&side), Err(DecodeError::Unreadable(_))));
    }

    #[test]
    fn test_foreign_file_is_bad_header() {
        let dir = tempfile::tempdir().unwrap();
        let side = io::SideFile::untitled_in(dir.path());

        side.write(b"vim swap junk\n", io::WriteMode::Truncate).unwrap();

        assert!(matches!(read_side_file(&side), Err(DecodeError::BadHeader { .. })));
    }
}
