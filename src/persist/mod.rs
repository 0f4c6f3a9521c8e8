//! Dump/load byte format and storage backend collaborator (§6).

pub mod backend;
pub mod dump;
pub mod load;
pub mod segment;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use dump::dump;
pub use load::{load, Loaded};
