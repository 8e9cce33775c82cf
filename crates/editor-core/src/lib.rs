//! In-memory document model: a gap-buffer text store and a cursor that moves
//! through it by byte offset.

pub mod cursor;
pub mod errors;
pub mod text;

pub use cursor::Cursor;
pub use errors::{TextBufferError, TextBufferResult};
pub use text::TextBuffer;
