//! Filesystem primitives for the swap side-file and the document it shadows.

pub mod errors;
pub mod side_file;

pub use errors::{SideFileError, SideFileResult};
pub use side_file::{MappedFile, SideFile, UNTITLED_SIDE_FILE, WriteMode, write_atomic};
