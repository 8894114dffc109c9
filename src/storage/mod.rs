//! Local key-value persistence.
//!
//! The draft pipeline owns two capped lists (semantic cache entries and
//! generation history) and reads user settings. All of them live in a
//! [`KeyValueStore`], a small synchronous interface with the semantics of
//! browser local storage: whole JSON values per key, read-modify-write,
//! last write wins.
//!
//! Two implementations:
//! - [`MemoryStore`]: process-local map, used by tests and dry runs
//! - [`JsonFileStore`]: one JSON object file on disk

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Storage key for the semantic cache entry list.
pub const CACHE_ENTRIES_KEY: &str = "semantic_cache_entries";
/// Storage key for the generation history list.
pub const HISTORY_KEY: &str = "message_history";
/// Storage key for the display name.
pub const DISPLAY_NAME_KEY: &str = "display_name";
/// Storage key for the ordered category list.
pub const CATEGORIES_KEY: &str = "interaction_categories";
/// Storage key for the per-category preference map.
pub const PREFERENCES_KEY: &str = "category_preferences";
/// Storage key for credentials saved through the settings surface.
pub const CREDENTIALS_KEY: &str = "stored_credentials";

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Stored bytes are not valid JSON.
    #[error("storage file {path} is corrupt: {reason}")]
    Corrupt {
        /// File involved.
        path: PathBuf,
        /// Parse error text.
        reason: String,
    },
    /// A value could not be (de)serialized into the requested type.
    #[error("value for key '{key}' has unexpected shape: {reason}")]
    Shape {
        /// Key involved.
        key: String,
        /// Serde error text.
        reason: String,
    },
    /// Internal lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Whole-value key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backing medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backing medium cannot be written.
    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Delete `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backing medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and deserialize a typed value.
///
/// # Errors
///
/// Returns [`StorageError::Shape`] when the stored JSON does not match `T`.
pub fn load_typed<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StorageError::Shape {
                key: key.to_owned(),
                reason: e.to_string(),
            }),
    }
}

/// Serialize and store a typed value.
///
/// # Errors
///
/// Returns [`StorageError`] on serialization or write failure.
pub fn save_typed<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let json = serde_json::to_value(value).map_err(|e| StorageError::Shape {
        key: key.to_owned(),
        reason: e.to_string(),
    })?;
    store.set(key, json)
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// Store backed by a single JSON object file.
///
/// Every operation re-reads the file so that separate processes (the CLI
/// and a running watcher) observe each other's writes. Writes go to a
/// sibling temp file that is renamed into place.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the parent directory cannot be created.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        debug!(path = %path.display(), "opened json store");
        Ok(Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write_all(&self, values: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let serialized = serde_json::to_string_pretty(values).map_err(|e| StorageError::Shape {
            key: "*".to_owned(),
            reason: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, serialized.as_bytes()).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| {
            warn!(path = %tmp.display(), "failed to move temp store file into place");
            StorageError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// Write `bytes` to `path` readable by the owner only. The store can hold
/// credentials.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        // `mode` only applies on creation; a leftover temp file keeps its bits.
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(bytes)?;
    file.sync_all()
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut values = self.read_all()?;
        values.insert(key.to_owned(), value);
        self.write_all(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }
}
