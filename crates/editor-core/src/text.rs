/// # The Core Philosophies of This API
///
/// - Gap-Based: Content lives in one contiguous store with a single unused
///   region (the gap) sitting at the last edit position. Typing at the same spot
///   writes straight into the gap; editing elsewhere first slides the gap there.
/// - Forgiving Reads: Query functions (`get_text`, `get_char`, line lookups) take
///   `&self` and never fail. Out-of-range requests come back empty or as `None`.
///   The `_strict` variants report [`TextBufferError::OutOfRange`] instead.
/// - Bytes, Not Graphemes: Offsets are byte offsets. A line ends at `\n`.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    /// [pre-gap content | gap | post-gap content]
    data: Vec<u8>,
    gap_start: usize,
    gap_end: usize,
}

/// Gap size of a freshly created buffer.
pub const INITIAL_GAP_SIZE: usize = 128;
/// Smallest amount a gap grows by when an insert does not fit.
pub const MIN_GAP_GROWTH: usize = 64;

/*

====================
===== CREATION =====
====================

*/

impl TextBuffer {
    #[must_use]
    pub fn new() -> Self {
        tracing::trace!(gap = INITIAL_GAP_SIZE, "text buffer created");

        Self {
            data: vec![0; INITIAL_GAP_SIZE],
            gap_start: 0,
            gap_end: INITIAL_GAP_SIZE,
        }
    }

    /// Creates a buffer holding `text`, with the gap parked at the end.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Creates a buffer holding `bytes` verbatim. Nothing is validated as UTF-8.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let capacity = bytes.len() + INITIAL_GAP_SIZE;
        let mut data = Vec::with_capacity(capacity);

        data.extend_from_slice(bytes);
        data.resize(capacity, 0);

        Self {
            data,
            gap_start: bytes.len(),
            gap_end: capacity,
        }
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/*

==========================
===== INLINE METHODS =====
==========================

*/

impl TextBuffer {
    /// Logical length in bytes (the gap is not counted).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() - self.gap_len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the backing store, gap included.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn gap_len(&self) -> usize {
        self.gap_end - self.gap_start
    }

    /// Logical position of the gap, i.e. where the last edit happened.
    #[inline]
    #[must_use]
    pub fn gap_position(&self) -> usize {
        self.gap_start
    }

    /// The content before and after the gap.
    #[inline]
    fn segments(&self) -> (&[u8], &[u8]) {
        (&self.data[..self.gap_start], &self.data[self.gap_end..])
    }

    /// Logical offsets of every `\n`, in order.
    fn newline_positions(&self) -> impl Iterator<Item = usize> + '_ {
        let (before, after) = self.segments();
        let offset = self.gap_start;

        memchr::memchr_iter(b'\n', before)
            .chain(memchr::memchr_iter(b'\n', after).map(move |idx| idx + offset))
    }
}

/*

====================================
===== GAP MOVEMENT & GROWTH ========
====================================

*/

impl TextBuffer {
    /// Slides the gap so that it starts at logical `position`.
    ///
    /// Costs O(distance) bytes moved. `position` must be `<= len()`.
    fn move_gap(&mut self, position: usize) {
        if position < self.gap_start {
            let count = self.gap_start - position;

            self.data
                .copy_within(position..self.gap_start, self.gap_end - count);
            self.gap_start -= count;
            self.gap_end -= count;
        } else if position > self.gap_start {
            let count = position - self.gap_start;

            self.data
                .copy_within(self.gap_end..self.gap_end + count, self.gap_start);
            self.gap_start += count;
            self.gap_end += count;
        }
    }

    /// Guarantees the gap can hold `needed` bytes, relocating the post-gap
    /// content into a larger store when it cannot.
    fn ensure_gap(&mut self, needed: usize) {
        let current_gap = self.gap_len();

        if current_gap >= needed {
            return;
        }

        let old_capacity = self.data.len();
        let growth = needed
            .max(current_gap)
            .max(old_capacity)
            .max(MIN_GAP_GROWTH);
        let post_gap_len = old_capacity - self.gap_end;
        let new_capacity = old_capacity + growth;

        self.data.resize(new_capacity, 0);

        if post_gap_len > 0 {
            self.data
                .copy_within(self.gap_end..old_capacity, new_capacity - post_gap_len);
        }

        self.gap_end = new_capacity - post_gap_len;

        tracing::debug!(
            old_capacity,
            new_capacity,
            gap = self.gap_len(),
            "text buffer gap expanded"
        );
    }
}

/*

========================================
========= INSERTION & DELETION =========
========================================

*/

impl TextBuffer {
    /// Splices `text` in at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`TextBufferError::OutOfRange`] if `position > len()`.
    ///
    /// [`TextBufferError::OutOfRange`]: crate::errors::TextBufferError::OutOfRange
    pub fn insert(&mut self, position: usize, text: &str) -> crate::errors::TextBufferResult<()> {
        self.insert_bytes(position, text.as_bytes())
    }

    /// Inserts a single character (UTF-8 encoded) at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`TextBufferError::OutOfRange`] if `position > len()`.
    ///
    /// [`TextBufferError::OutOfRange`]: crate::errors::TextBufferError::OutOfRange
    pub fn insert_char(&mut self, position: usize, ch: char) -> crate::errors::TextBufferResult<()> {
        let mut encoded = [0u8; 4];

        self.insert_bytes(position, ch.encode_utf8(&mut encoded).as_bytes())
    }

    fn insert_bytes(&mut self, position: usize, bytes: &[u8]) -> crate::errors::TextBufferResult<()> {
        let length = self.len();

        if position > length {
            return Err(crate::errors::TextBufferError::OutOfRange { position, length });
        }

        if bytes.is_empty() {
            return Ok(());
        }

        self.move_gap(position);
        self.ensure_gap(bytes.len());

        let end = self.gap_start + bytes.len();

        self.data[self.gap_start..end].copy_from_slice(bytes);
        self.gap_start = end;

        tracing::trace!(position, inserted = bytes.len(), "text buffer insert");

        Ok(())
    }

    /// Removes up to `length` bytes starting at `position`.
    ///
    /// `length` is clamped to what is available. Erasing zero bytes or starting
    /// at/after the end is a no-op. Returns the number of bytes actually removed.
    pub fn erase(&mut self, position: usize, length: usize) -> usize {
        let available = self.len();

        if length == 0 || position >= available {
            return 0;
        }

        let length = length.min(available - position);

        self.move_gap(position);
        // The erased bytes simply become part of the gap.
        self.gap_end += length;

        tracing::trace!(position, erased = length, "text buffer erase");

        length
    }

    /// Drops all content. The whole store becomes gap.
    pub fn clear(&mut self) {
        self.gap_start = 0;
        self.gap_end = self.data.len();

        tracing::debug!("text buffer cleared");
    }
}

/*

===========================
========= GETTERS =========
===========================

*/

impl TextBuffer {
    /// The whole document as a `String` (invalid UTF-8 is replaced).
    #[must_use]
    pub fn get_text(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }

    /// The whole document as raw bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let (before, after) = self.segments();
        let mut bytes = Vec::with_capacity(self.len());

        bytes.extend_from_slice(before);
        bytes.extend_from_slice(after);
        bytes
    }

    /// FORGIVING: Up to `length` bytes starting at `start`.
    /// Returns an empty string if `start` is at or past the end.
    #[must_use]
    pub fn get_text_range(&self, start: usize, length: usize) -> String {
        let total = self.len();

        if start >= total {
            return String::new();
        }

        let end = start.saturating_add(length).min(total);

        String::from_utf8_lossy(&self.bytes_in(start, end)).into_owned()
    }

    /// STRICT: Exactly `length` bytes starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`TextBufferError::OutOfRange`] if the range reaches past the end.
    ///
    /// [`TextBufferError::OutOfRange`]: crate::errors::TextBufferError::OutOfRange
    pub fn get_text_strict(&self, start: usize, length: usize) -> crate::errors::TextBufferResult<String> {
        let total = self.len();
        let end = start
            .checked_add(length)
            .filter(|end| *end <= total)
            .ok_or(crate::errors::TextBufferError::OutOfRange {
                position: start,
                length: total,
            })?;

        Ok(String::from_utf8_lossy(&self.bytes_in(start, end)).into_owned())
    }

    /// FORGIVING: The byte at `position`, or `None` past the end.
    #[must_use]
    pub fn get_char(&self, position: usize) -> Option<u8> {
        if position >= self.len() {
            return None;
        }

        if position < self.gap_start {
            Some(self.data[position])
        } else {
            Some(self.data[position + self.gap_len()])
        }
    }

    /// STRICT: The byte at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`TextBufferError::OutOfRange`] if `position >= len()`.
    ///
    /// [`TextBufferError::OutOfRange`]: crate::errors::TextBufferError::OutOfRange
    pub fn get_char_strict(&self, position: usize) -> crate::errors::TextBufferResult<u8> {
        self.get_char(position)
            .ok_or(crate::errors::TextBufferError::OutOfRange {
                position,
                length: self.len(),
            })
    }

    /// Logical `[start, end)` copied out across the gap. Caller guarantees bounds.
    fn bytes_in(&self, start: usize, end: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(end - start);

        if start < self.gap_start {
            bytes.extend_from_slice(&self.data[start..end.min(self.gap_start)]);
        }

        if end > self.gap_start {
            let from = start.max(self.gap_start) + self.gap_len();
            let to = end + self.gap_len();

            bytes.extend_from_slice(&self.data[from..to]);
        }

        bytes
    }
}

/*

===================================
========= LINE ADDRESSING =========
===================================

*/

impl TextBuffer {
    /// Number of lines. An empty buffer has one (empty) line, and a trailing
    /// `\n` opens a new empty last line.
    #[must_use]
    pub fn line_count(&self) -> usize {
        1 + self.newline_positions().count()
    }

    /// Offset of the first byte of `line`, or `None` if the line does not exist.
    #[must_use]
    pub fn line_start_position(&self, line: usize) -> Option<usize> {
        if line == 0 {
            return Some(0);
        }

        self.newline_positions().nth(line - 1).map(|newline| newline + 1)
    }

    /// Offset just past the last byte of `line`'s content (its `\n`, or the
    /// end of the text), or `None` if the line does not exist.
    #[must_use]
    pub fn line_end_position(&self, line: usize) -> Option<usize> {
        let start = self.line_start_position(line)?;

        Some(
            self.newline_positions()
                .find(|newline| *newline >= start)
                .unwrap_or_else(|| self.len()),
        )
    }

    /// STRICT: Offset of the first byte of `line`.
    ///
    /// # Errors
    ///
    /// Returns [`TextBufferError::LineNotFound`] if `line >= line_count()`.
    ///
    /// [`TextBufferError::LineNotFound`]: crate::errors::TextBufferError::LineNotFound
    pub fn line_start_position_strict(&self, line: usize) -> crate::errors::TextBufferResult<usize> {
        self.line_start_position(line)
            .ok_or(crate::errors::TextBufferError::LineNotFound(line))
    }

    /// STRICT: Offset just past the content of `line`.
    ///
    /// # Errors
    ///
    /// Returns [`TextBufferError::LineNotFound`] if `line >= line_count()`.
    ///
    /// [`TextBufferError::LineNotFound`]: crate::errors::TextBufferError::LineNotFound
    pub fn line_end_position_strict(&self, line: usize) -> crate::errors::TextBufferResult<usize> {
        self.line_end_position(line)
            .ok_or(crate::errors::TextBufferError::LineNotFound(line))
    }

    /// Length of `line` without its terminator.
    #[must_use]
    pub fn line_length(&self, line: usize) -> Option<usize> {
        let start = self.line_start_position(line)?;
        let end = self.line_end_position(line)?;

        Some(end - start)
    }

    /// Text of `line` without its terminator.
    #[must_use]
    pub fn get_line(&self, line: usize) -> Option<String> {
        let start = self.line_start_position(line)?;
        let end = self.line_end_position(line)?;

        Some(self.get_text_range(start, end - start))
    }

    /// Line containing `position`. Positions past the end map to the last line.
    #[must_use]
    pub fn position_to_line(&self, position: usize) -> usize {
        let position = position.min(self.len());

        self.newline_positions()
            .take_while(|newline| *newline < position)
            .count()
    }

    /// Byte column of `position` within its line.
    #[must_use]
    pub fn position_to_column(&self, position: usize) -> usize {
        let position = position.min(self.len());
        let line_start = self
            .line_start_position(self.position_to_line(position))
            .unwrap_or(0);

        position - line_start
    }
}

impl std::fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Decoded as one run: a multibyte sequence may straddle the gap.
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}


#[cfg(test)]
mod text_buffer_editing_tests {
    use super::*;
    use crate::errors::TextBufferError;

    #[test]
    fn test_insert_erase_scenario() {
        let mut buffer = TextBuffer::new();

        buffer.insert(0, "Hello").unwrap();
        assert_eq!(buffer.get_text(), "Hello");

        buffer.insert(5, " World").unwrap();
        assert_eq!(buffer.get_text(), "Hello World");

        buffer.insert(5, "123").unwrap();
        assert_eq!(buffer.get_text(), "Hello123 World");

        assert_eq!(buffer.erase(5, 3), 3);
        assert_eq!(buffer.get_text(), "Hello World");
        assert_eq!(buffer.len(), 11);
    }

    #[test]
    fn test_insert_past_end_is_rejected() {
        let mut buffer = TextBuffer::from_text("abc");

        assert_eq!(
            buffer.insert(4, "x"),
            Err(TextBufferError::OutOfRange {
                position: 4,
                length: 3
            })
        );
        assert_eq!(buffer.get_text(), "abc");
    }

    #[test]
    fn test_empty_insert_and_zero_erase_are_noops() {
        let mut buffer = TextBuffer::from_text("abc");
        let gap_before = buffer.gap_position();

        buffer.insert(1, "").unwrap();
        assert_eq!(buffer.erase(1, 0), 0);
        assert_eq!(buffer.erase(3, 5), 0);

        assert_eq!(buffer.get_text(), "abc");
        assert_eq!(buffer.gap_position(), gap_before);
    }

    #[test]
    fn test_erase_clamps_length() {
        let mut buffer = TextBuffer::from_text("Hello World");

        assert_eq!(buffer.erase(5, 100), 6);
        assert_eq!(buffer.get_text(), "Hello");
    }

    #[test]
    fn test_insert_grows_past_initial_gap() {
        let mut buffer = TextBuffer::new();
        let long = "x".repeat(INITIAL_GAP_SIZE * 3);

        buffer.insert(0, "ab").unwrap();
        buffer.insert(1, &long).unwrap();

        assert_eq!(buffer.len(), long.len() + 2);
        assert!(buffer.capacity() >= INITIAL_GAP_SIZE + long.len());
        assert_eq!(buffer.get_char(0), Some(b'a'));
        assert_eq!(buffer.get_char(buffer.len() - 1), Some(b'b'));
    }

    #[test]
    fn test_many_single_char_inserts_keep_order() {
        let mut buffer = TextBuffer::new();

        for (idx, ch) in "the quick brown fox".chars().enumerate() {
            buffer.insert_char(idx, ch).unwrap();
        }

        assert_eq!(buffer.get_text(), "the quick brown fox");
    }

    #[test]
    fn test_insert_char_multibyte() {
        let mut buffer = TextBuffer::from_text("ab");

        buffer.insert_char(1, 'é').unwrap();

        assert_eq!(buffer.get_text(), "aéb");
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_clear_reuses_store() {
        let mut buffer = TextBuffer::from_text("some text");
        let capacity = buffer.capacity();

        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), capacity);
        buffer.insert(0, "new").unwrap();
        assert_eq!(buffer.get_text(), "new");
    }
}
