/// A caret addressed by absolute byte offset.
///
/// The cursor keeps no reference to the text it moves through. Every movement
/// takes the [`TextBuffer`] by shared reference and derives line/column facts
/// from it on the spot, so a cursor is only meaningful next to the buffer it
/// was last moved against.
///
/// [`TextBuffer`]: crate::text::TextBuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    position: usize,
    /// The preferred visual column. Used to maintain horizontal position
    /// when moving vertically across shorter lines.
    preferred_column: usize,
}

impl Cursor {
    #[must_use]
    pub fn new(position: usize) -> Self {
        Self {
            position,
            preferred_column: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn preferred_column(&self) -> usize {
        self.preferred_column
    }

    /// Places the cursor without touching the preferred column.
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
        tracing::trace!(position, "cursor position set");
    }

    pub fn set_preferred_column(&mut self, column: usize) {
        self.preferred_column = column;
    }

    /// Recomputes the preferred column from the current position.
    pub fn sync_preferred_column(&mut self, text: &crate::text::TextBuffer) {
        self.preferred_column = text.position_to_column(self.position);
    }

    /// Pulls the position back inside `text` after the text was replaced.
    pub fn clamp_to(&mut self, text: &crate::text::TextBuffer) {
        self.position = self.position.min(text.len());
    }

    #[must_use]
    pub fn line(&self, text: &crate::text::TextBuffer) -> usize {
        text.position_to_line(self.position)
    }

    #[must_use]
    pub fn column(&self, text: &crate::text::TextBuffer) -> usize {
        text.position_to_column(self.position)
    }
}

/*

===========================
===== HORIZONTAL MOVES ====
===========================

*/

impl Cursor {
    pub fn move_left(&mut self, text: &crate::text::TextBuffer) {
        if self.position == 0 {
            return;
        }

        self.position = (self.position - 1).min(text.len());
        self.sync_preferred_column(text);
        tracing::trace!(position = self.position, "cursor moved left");
    }

    pub fn move_right(&mut self, text: &crate::text::TextBuffer) {
        if self.position >= text.len() {
            return;
        }

        self.position += 1;
        self.sync_preferred_column(text);
        tracing::trace!(position = self.position, "cursor moved right");
    }

    /// Line start resets the preferred column to 0.
    pub fn move_to_line_start(&mut self, text: &crate::text::TextBuffer) {
        let line = self.line(text);

        self.position = text.line_start_position(line).unwrap_or(0);
        self.preferred_column = 0;
        tracing::trace!(position = self.position, "cursor moved to line start");
    }

    /// Line end makes the line's length the new preferred column.
    pub fn move_to_line_end(&mut self, text: &crate::text::TextBuffer) {
        let line = self.line(text);

        self.position = text.line_end_position(line).unwrap_or_else(|| text.len());
        self.sync_preferred_column(text);
        tracing::trace!(position = self.position, "cursor moved to line end");
    }
}

/*

=========================
===== VERTICAL MOVES ====
=========================

*/

impl Cursor {
    /// Moves to the previous line at `min(preferred_column, line length)`.
    /// On the first line, moves to the start of the document instead.
    pub fn move_up(&mut self, text: &crate::text::TextBuffer) {
        let line = self.line(text);

        if line == 0 {
            self.position = 0;
            return;
        }

        self.move_to_line(text, line - 1);
    }

    /// Moves to the next line at `min(preferred_column, line length)`.
    /// On the last line, moves to the end of the document instead.
    pub fn move_down(&mut self, text: &crate::text::TextBuffer) {
        let line = self.line(text);

        if line + 1 >= text.line_count() {
            self.position = text.len();
            return;
        }

        self.move_to_line(text, line + 1);
    }

    /// Lands on `target` using the sticky column. The preferred column is kept
    /// so a later move onto a longer line restores it.
    fn move_to_line(&mut self, text: &crate::text::TextBuffer, target: usize) {
        let (Some(start), Some(length)) = (
            text.line_start_position(target),
            text.line_length(target),
        ) else {
            return;
        };

        self.position = start + self.preferred_column.min(length);
        tracing::trace!(line = target, position = self.position, "cursor moved vertically");
    }
}
