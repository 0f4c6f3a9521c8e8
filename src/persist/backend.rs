//! The storage backend collaborator: `open`/`read_segment`/`write_segment`/
//! `commit`/`snapshot`, grounded on the teacher's own
//! `persistence::storage::{StorageBackend, MemoryBackend}` pair, extended
//! here with a filesystem backend that makes `flush`'s "atomic write to
//! temp + rename" wording concrete.

use crate::error::Result;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// A named, append-only byte sink the dump/load format writes its segment
/// stream into. `commit` makes a pending write durable and atomic;
/// `snapshot` returns the current durable bytes for a named dump.
pub trait StorageBackend: Send + Sync {
    /// Opens (creating if absent) a durable byte stream named `name`.
    fn open(&self, name: &str) -> Result<()>;

    /// Appends `bytes` to the pending (not-yet-committed) buffer for `name`.
    fn write_segment(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Makes the pending buffer for `name` the new durable content,
    /// replacing whatever was previously committed.
    fn commit(&self, name: &str) -> Result<()>;

    /// The durable (already committed) bytes for `name`, if any.
    fn snapshot(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// An in-memory backend: useful for tests and for `Builder::dump`/
/// `Streamer::flush` targets that the caller will relocate themselves.
#[derive(Default)]
pub struct MemoryBackend {
    committed: Mutex<HashMap<String, Vec<u8>>>,
    pending: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// An empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn open(&self, name: &str) -> Result<()> {
        self.pending.lock().unwrap().entry(name.to_string()).or_default();
        Ok(())
    }

    fn write_segment(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.pending
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    fn commit(&self, name: &str) -> Result<()> {
        let mut pending = self.pending.lock().unwrap();
        let bytes = pending.remove(name).unwrap_or_default();
        self.committed.lock().unwrap().insert(name.to_string(), bytes);
        Ok(())
    }

    fn snapshot(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.committed.lock().unwrap().get(name).cloned())
    }
}

/// A filesystem backend: `write_segment` appends to `{dir}/{name}.tmp`,
/// `commit` fsyncs it and renames over `{dir}/{name}`, giving the same
/// all-or-nothing visibility a crash between `write` and `rename` can't
/// violate (the reader only ever sees the old or the new file, never a
/// half-written one).
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Targets `dir`, creating it if it doesn't exist.
    ///
    /// # Errors
    /// Propagates any `std::io::Error` from directory creation.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn tmp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.tmp"))
    }

    fn final_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl StorageBackend for FileBackend {
    fn open(&self, name: &str) -> Result<()> {
        if !self.tmp_path(name).exists() {
            std::fs::File::create(self.tmp_path(name))?;
        }
        Ok(())
    }

    fn write_segment(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.tmp_path(name))?;
        f.write_all(bytes)?;
        Ok(())
    }

    fn commit(&self, name: &str) -> Result<()> {
        let tmp = self.tmp_path(name);
        let f = std::fs::File::open(&tmp)?;
        f.sync_all()?;
        drop(f);
        std::fs::rename(&tmp, self.final_path(name))?;
        Ok(())
    }

    fn snapshot(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.final_path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_commit_then_snapshot() {
        let b = MemoryBackend::new();
        b.open("idx").unwrap();
        b.write_segment("idx", b"hello ").unwrap();
        b.write_segment("idx", b"world").unwrap();
        assert!(b.snapshot("idx").unwrap().is_none());
        b.commit("idx").unwrap();
        assert_eq!(b.snapshot("idx").unwrap().unwrap(), b"hello world");
    }

    #[test]
    fn file_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let b = FileBackend::new(dir.path()).unwrap();
        b.open("idx").unwrap();
        b.write_segment("idx", b"payload").unwrap();
        b.commit("idx").unwrap();
        assert_eq!(b.snapshot("idx").unwrap().unwrap(), b"payload");
    }
}
