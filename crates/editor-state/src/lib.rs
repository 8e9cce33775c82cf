//! The document engine's composition root: a text buffer and cursor shared
//! with the autosave thread, plus the editing surface the UI drives.

pub mod document;
pub mod errors;
pub mod shared;

pub use document::{DocumentSession, Motion, Recovery};
pub use errors::{EditorStateError, EditorStateResult};
pub use shared::{DocumentState, SharedDocument};
