//! Persistence media for the history store.
//!
//! A medium is a dumb key-value byte store. It knows nothing about records,
//! ordering or serialization; the store owns all of that and addresses the
//! medium by a single fixed key.
//!
//! Uses synchronous `std::fs` for the on-disk medium: the payload is one small
//! JSON document, written whole on every mutation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::PersistenceError;

/// Client-local key-value byte store.
pub trait PersistenceMedium: Send + Sync {
    /// Read the bytes stored under `key`. `Ok(None)` means never written.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    /// Replace the bytes stored under `key`.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl PersistenceMedium for FileMedium {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io { path, source }),
        }
    }

    /// Writes to a sibling temp file and renames it over the target, so a
    /// crash mid-write leaves the previous document intact.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, bytes).map_err(|source| PersistenceError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| PersistenceError::Io { path, source })
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
}

/// In-process medium. Clones share the same storage, so a test can keep a
/// clone to inspect or break the medium after handing it to a store.
#[derive(Debug, Default, Clone)]
pub struct MemoryMedium {
    inner: Arc<MemoryInner>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the medium going away (quota exceeded, storage disabled).
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Store raw bytes directly, bypassing any store.
    pub fn insert_raw(&self, key: &str, bytes: &[u8]) {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), bytes.to_vec());
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "in-memory medium disabled".to_string(),
            ));
        }
        Ok(())
    }
}

impl PersistenceMedium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        self.check_available()?;
        Ok(self.raw(key))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        self.check_available()?;
        self.insert_raw(key, bytes);
        Ok(())
    }
}
