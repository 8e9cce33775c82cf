//! The swap side-file record.
//!
//! ```text
//! PHANTOM_SWAP_V1
//! timestamp: <unix-seconds>
//! cursor_line: <uint>
//! cursor_column: <uint>
//! cursor_position: <uint>
//! buffer_length: <uint>
//! ---BEGIN_CONTENT---
//! <raw document bytes>
//! ---END_CONTENT---
//! ```
//!
//! Only `cursor_position` is authoritative on reload. `cursor_line` and
//! `cursor_column` are diagnostic, and `buffer_length` is descriptive: the
//! content runs up to the end marker no matter what length was declared.

/// First line of every side-file this format can read.
pub const FORMAT_TAG: &str = "PHANTOM_SWAP_V1";

const BEGIN_MARKER: &[u8] = b"---BEGIN_CONTENT---";
/// Encoded content is always followed by `\n` and this marker.
const END_MARKER: &[u8] = b"\n---END_CONTENT---";

/// What the autosave loop captures from the live document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentSnapshot {
    /// Raw document bytes. Not necessarily valid UTF-8.
    pub content: Vec<u8>,
    pub cursor_position: usize,
    pub cursor_line: usize,
    pub preferred_column: usize,
}

/// A successfully decoded side-file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSnapshot {
    pub content: Vec<u8>,
    pub cursor_position: usize,
    pub preferred_column: usize,
    pub cursor_line: usize,
    pub timestamp: u64,
    pub declared_length: Option<usize>,
}

/// Renders `snapshot` as a side-file record stamped with `timestamp`.
///
/// The content is copied byte for byte; only the metadata is text.
#[must_use]
pub fn encode(snapshot: &DocumentSnapshot, timestamp: u64) -> Vec<u8> {
    let header = format!(
        "{FORMAT_TAG}\n\
         timestamp: {timestamp}\n\
         cursor_line: {}\n\
         cursor_column: {}\n\
         cursor_position: {}\n\
         buffer_length: {}\n\
         ---BEGIN_CONTENT---\n",
        snapshot.cursor_line,
        snapshot.preferred_column,
        snapshot.cursor_position,
        snapshot.content.len(),
    );
    let mut out = Vec::with_capacity(header.len() + snapshot.content.len() + END_MARKER.len() + 1);

    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&snapshot.content);
    out.extend_from_slice(END_MARKER);
    out.push(b'\n');
    out
}

/// Parses a side-file record.
///
/// # Errors
///
/// - [`DecodeError::BadHeader`] if the first line is not exactly [`FORMAT_TAG`].
/// - [`DecodeError::MalformedBody`] if a marker is missing, a metadata line
///   cannot be parsed, or `cursor_position` is absent.
///
/// The content itself is returned as raw bytes and never validated.
///
/// [`DecodeError::BadHeader`]: crate::errors::DecodeError::BadHeader
/// [`DecodeError::MalformedBody`]: crate::errors::DecodeError::MalformedBody
pub fn decode(bytes: &[u8]) -> Result<DecodedSnapshot, crate::errors::DecodeError> {
    let mut lines = MetadataLines { rest: bytes };

    let header = lines.next_line().unwrap_or(bytes);
    if header != FORMAT_TAG.as_bytes() {
        return Err(crate::errors::DecodeError::BadHeader {
            expected: FORMAT_TAG,
            found: String::from_utf8_lossy(&header[..header.len().min(64)]).into_owned(),
        });
    }

    let mut timestamp = 0u64;
    let mut cursor_line = 0usize;
    let mut preferred_column = 0usize;
    let mut cursor_position = None;
    let mut declared_length = None;

    loop {
        let Some(line) = lines.next_line() else {
            return Err(malformed("missing ---BEGIN_CONTENT--- marker"));
        };

        if line == BEGIN_MARKER {
            break;
        }

        let line = std::str::from_utf8(line).map_err(|_| malformed("metadata is not UTF-8"))?;
        let (key, value) = line
            .split_once(": ")
            .ok_or_else(|| malformed(&format!("metadata line without `: ` ({line:?})")))?;

        match key {
            "timestamp" => timestamp = parse_number(key, value)?,
            "cursor_line" => cursor_line = parse_number(key, value)?,
            "cursor_column" => preferred_column = parse_number(key, value)?,
            "cursor_position" => cursor_position = Some(parse_number(key, value)?),
            "buffer_length" => declared_length = Some(parse_number(key, value)?),
            other => tracing::debug!(key = other, "ignoring unknown side-file metadata"),
        }
    }

    let body = lines.rest;
    let body = body.strip_suffix(b"\n").unwrap_or(body);
    let content = body
        .strip_suffix(END_MARKER)
        .ok_or_else(|| malformed("missing ---END_CONTENT--- marker"))?;
    let content = content.to_vec();
    let cursor_position = cursor_position.ok_or_else(|| malformed("missing cursor_position"))?;

    if let Some(declared) = declared_length
        && declared != content.len()
    {
        tracing::debug!(
            declared,
            actual = content.len(),
            "side-file buffer_length differs from content; using content"
        );
    }

    Ok(DecodedSnapshot {
        content,
        cursor_position,
        preferred_column,
        cursor_line,
        timestamp,
        declared_length,
    })
}

fn malformed(reason: &str) -> crate::errors::DecodeError {
    crate::errors::DecodeError::MalformedBody(reason.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, crate::errors::DecodeError> {
    value
        .trim()
        .parse()
        .map_err(|_| malformed(&format!("{key} is not a number ({value:?})")))
}

/// Splits off `\n`-terminated lines from the front, leaving the rest untouched.
struct MetadataLines<'a> {
    rest: &'a [u8],
}

impl<'a> MetadataLines<'a> {
    fn next_line(&mut self) -> Option<&'a [u8]> {
        let newline = memchr::memchr(b'\n', self.rest)?;
        let line = &self.rest[..newline];

        self.rest = &self.rest[newline + 1..];
        Some(line)
    }
}
