//! Named blob storage for quest state snapshots.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::StorageError;

/// Flat, name-addressed byte storage
pub trait BlobStorage {
    /// Names of all blobs starting with `prefix`, sorted
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    fn remove(&mut self, name: &str) -> Result<(), StorageError>;
}

/// One file per blob inside a directory
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    dir: PathBuf,
}

impl DirectoryStorage {
    /// Open (and create if needed) a storage directory
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl BlobStorage for DirectoryStorage {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if name.starts_with(prefix) => names.push(name),
                Ok(_) => {}
                Err(name) => warn!("Skipping non UTF-8 state file {:?}", name),
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_of(name);
        if !path.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_of(name);
        debug!("Writing {} bytes to {:?}", bytes.len(), path);
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        let path = self.path_of(name);
        if !path.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }
}

/// In-memory storage. Clones share the same blobs, so a caller can keep a
/// handle after boxing one into a manager.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: Rc<RefCell<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.borrow().is_empty()
    }
}

impl BlobStorage for MemoryStorage {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .blobs
            .borrow()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.blobs
            .borrow_mut()
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        self.blobs
            .borrow_mut()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}
