//! Local key-value store used as a write-through cache.
//!
//! Nothing in the store is authoritative: the in-memory state managers own
//! the session's data and only mirror it here so a later run can restore the
//! display. Implementations are cheap cloneable handles so several managers
//! can share one backing store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::debug;

/// Keys written by the storefront.
pub mod keys {
    /// Compact cart snapshot (`sessionId/id:qty,id:qty`).
    pub const CART: &str = "cart";

    /// Bearer token of the logged-in user.
    pub const TOKEN: &str = "token";

    /// Session identifier used as the cart snapshot prefix.
    pub const SESSION_ID: &str = "sessionId";

    /// JSON encoded profile of the logged-in user.
    pub const USER: &str = "user";

    /// JSON encoded order history.
    pub const ORDERS: &str = "orders";
}

/// Errors raised by a key-value store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not a JSON object of strings.
    #[error("store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// A previous writer panicked while holding the lock.
    #[error("store lock poisoned")]
    Poisoned,
}

/// String key-value storage.
pub trait KeyValueStore: Clone + Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the backend cannot be written.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

type Entries = BTreeMap<String, String>;

fn lock(entries: &Mutex<Entries>) -> Result<MutexGuard<'_, Entries>, StoreError> {
    entries.lock().map_err(|_| StoreError::Poisoned)
}

// =============================================================================
// MemoryStore
// =============================================================================

/// Process-local store, used in tests and for throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<Entries>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.entries)?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

// =============================================================================
// FileStore
// =============================================================================

/// Store persisted as a single JSON object on disk.
///
/// The file is read once on open and rewritten after every change through a
/// temporary sibling file, so a crash mid-write leaves the old contents.
#[derive(Debug, Clone)]
pub struct FileStore {
    inner: Arc<FileStoreInner>,
}

#[derive(Debug)]
struct FileStoreInner {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Entries::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Entries::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), keys = entries.len(), "Opened file store");

        Ok(Self {
            inner: Arc::new(FileStoreInner {
                path,
                entries: Mutex::new(entries),
            }),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn flush(&self, entries: &Entries) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.inner.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.inner.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.inner.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = lock(&self.inner.entries)?;
        entries.insert(key.to_owned(), value.to_owned());
        self.flush(&entries)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = lock(&self.inner.entries)?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}
