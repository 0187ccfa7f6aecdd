// State management module
// Handles writing chop runs to the file system

pub mod storage;

pub use storage::{calculate_sha256, write_run, StorageError, StoredFile};
