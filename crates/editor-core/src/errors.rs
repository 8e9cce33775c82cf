pub type TextBufferResult<T> = Result<T, TextBufferError>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TextBufferError {
    /// A position (or position + length) reaches past the logical end of the text.
    #[error("position {position} is out of range (len={length})")]
    OutOfRange { position: usize, length: usize },

    /// The requested line index is past the document's last line.
    #[error("line {0} does not exist")]
    LineNotFound(usize),
}
