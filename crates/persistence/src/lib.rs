//! Crash-recovery persistence: the swap side-file wire format and the
//! background autosave loop that keeps it current.

pub mod autosave;
pub mod codec;
pub mod config;
pub mod errors;
pub mod recovery;

pub use autosave::{Autosave, SnapshotSource};
pub use codec::{DecodedSnapshot, DocumentSnapshot, FORMAT_TAG};
pub use config::AutosaveConfig;
pub use errors::{DecodeError, PersistenceError, PersistenceResult};
