//! Key-value blob storage backing session persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::SessionError;

/// Abstract named-blob store with get/set/remove.
pub trait BlobStore: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, SessionError>;
    fn set(&self, name: &str, bytes: &[u8]) -> Result<(), SessionError>;
    fn remove(&self, name: &str) -> Result<(), SessionError>;
}

/// Stores each blob as `<directory>/<name>.json`.
pub struct FileBlobStore {
    directory: PathBuf,
}

impl FileBlobStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{}.json", name))
    }

    fn io_error(name: &str, source: std::io::Error) -> SessionError {
        SessionError::Io {
            name: name.to_string(),
            source,
        }
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, SessionError> {
        match std::fs::read(self.path_for(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(name, e)),
        }
    }

    fn set(&self, name: &str, bytes: &[u8]) -> Result<(), SessionError> {
        std::fs::create_dir_all(&self.directory).map_err(|e| Self::io_error(name, e))?;

        // Write beside the target then rename, so a crash mid-write never
        // leaves a truncated session behind.
        let target = self.path_for(name);
        let temp = self.directory.join(format!(".{}.json.tmp", name));
        std::fs::write(&temp, bytes).map_err(|e| Self::io_error(name, e))?;
        std::fs::rename(&temp, &target).map_err(|e| Self::io_error(name, e))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), SessionError> {
        match std::fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(name, e)),
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, SessionError> {
        let blobs = self.blobs.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(blobs.get(name).cloned())
    }

    fn set(&self, name: &str, bytes: &[u8]) -> Result<(), SessionError> {
        let mut blobs = self.blobs.lock().map_err(|_| SessionError::Poisoned)?;
        blobs.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), SessionError> {
        let mut blobs = self.blobs.lock().map_err(|_| SessionError::Poisoned)?;
        blobs.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path().join("nested"));

        assert_eq!(store.get("session").unwrap(), None);
        store.set("session", b"{\"a\":1}").unwrap();
        assert_eq!(store.get("session").unwrap(), Some(b"{\"a\":1}".to_vec()));

        store.set("session", b"{}").unwrap();
        assert_eq!(store.get("session").unwrap(), Some(b"{}".to_vec()));
        assert!(!dir.path().join("nested/.session.json.tmp").exists());

        store.remove("session").unwrap();
        assert_eq!(store.get("session").unwrap(), None);
        // Removing twice is fine
        store.remove("session").unwrap();
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryBlobStore::new();
        assert!(store.is_empty());
        store.set("x", b"1").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("x").unwrap(), Some(b"1".to_vec()));
        store.remove("x").unwrap();
        assert!(store.is_empty());
    }
}
