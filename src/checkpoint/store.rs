//! Checkpoint stores: logical name -> byte blob.
//!
//! `FileStore` writes through a temporary file in the destination folder and
//! renames it into place, so a reader sees either the previous blob or the new
//! one, never a partial write.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::CheckpointError;

/// Durable name -> bytes mapping.
pub trait CheckpointStore: Send + Sync {
    /// Store `bytes` under `name`, creating missing parent containers.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), CheckpointError>;

    /// Fetch the bytes stored under `name`, `NotFound` if there are none.
    fn get(&self, name: &str) -> Result<Vec<u8>, CheckpointError>;
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_user(name: &str) -> PathBuf {
    let home = || dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    if name == "~" {
        home()
    } else if let Some(rest) = name.strip_prefix("~/") {
        home().join(rest)
    } else {
        PathBuf::from(name)
    }
}

/// Join a folder and a file name into a store name.
pub fn join_name(folder: &str, file: &str) -> String {
    Path::new(folder).join(file).to_string_lossy().into_owned()
}

/// Filesystem-backed store. Names are paths; `~` is expanded.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        FileStore
    }
}

impl CheckpointStore for FileStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), CheckpointError> {
        let path = expand_user(name);
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| CheckpointError::Io(e.error))?;

        log::debug!("[Checkpoint] Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, CheckpointError> {
        let path = expand_user(name);
        fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CheckpointError::NotFound(path.display().to_string())
            } else {
                CheckpointError::Io(e)
            }
        })
    }
}

/// In-process store, useful when checkpoints only need to outlive a learner
/// and not the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl CheckpointStore for MemoryStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), CheckpointError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        entries.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, CheckpointError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        entries
            .get(name)
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound(name.to_string()))
    }
}
