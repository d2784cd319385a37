use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::atomic::write_atomic;
use crate::error::StoreError;

const STORE_TARGET: &str = "plughost_store";

/// Permission bits for persisted documents.
const DOCUMENT_MODE: u32 = 0o644;

type Table = BTreeMap<String, serde_yaml::Value>;

/// A YAML document on disk whose top level is a name-keyed mapping.
///
/// A missing or empty file reads as the default value of the requested type,
/// so callers never have to special-case first use.
///
/// Clones, and the sections they hand out, share one lock. Writes through
/// any of them are serialized, so a section update never overwrites a
/// concurrent update to a sibling.
#[derive(Debug, Clone)]
pub struct YamlDocument {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl PartialEq for YamlDocument {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for YamlDocument {}

impl YamlDocument {
    /// Addresses the document at `path`. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Location of the document.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Reads and deserializes the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the file exists but cannot be read and
    /// [`StoreError::Parse`] if its content does not match `T`.
    pub fn read<T>(&self) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: Arc::new(source),
                });
            }
        };
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        let parsed: Option<T> =
            serde_yaml::from_str(&text).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(parsed.unwrap_or_default())
    }

    /// Serializes `value` and atomically replaces the document with it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] or [`StoreError::Write`].
    pub fn write<T>(&self, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        let _guard = self.lock_writes();
        self.replace(value)
    }

    /// Returns a handle on the section stored under `key`.
    #[must_use]
    pub fn section(&self, key: impl Into<String>) -> YamlSection {
        YamlSection {
            document: self.clone(),
            key: key.into(),
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_table(&self) -> Result<Table, StoreError> {
        self.read::<Table>()
    }

    /// Writes `value` without taking the lock. Callers must hold it.
    fn replace<T>(&self, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_yaml::to_string(value).map_err(|source| StoreError::Serialize {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, text.as_bytes(), DOCUMENT_MODE).map_err(|source| {
            StoreError::Write {
                path: self.path.clone(),
                source: Arc::new(source),
            }
        })?;
        debug!(
            target: STORE_TARGET,
            file = %self.path.display(),
            bytes = text.len(),
            "document written"
        );
        Ok(())
    }
}

/// One top-level entry of a [`YamlDocument`].
///
/// Every mutation re-reads the full document, changes only this entry, and
/// writes the full document back while holding the document's lock, so
/// other sections survive untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlSection {
    document: YamlDocument,
    key: String,
}

impl YamlSection {
    /// Key of this section in the enclosing document.
    #[must_use]
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// The enclosing document.
    #[must_use]
    pub const fn document(&self) -> &YamlDocument {
        &self.document
    }

    /// Reads the section, returning `None` when it is absent or null.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the document cannot be read or the section
    /// does not match `T`.
    pub fn read<T>(&self) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let mut table = self.document.read_table()?;
        let Some(value) = table.remove(&self.key) else {
            return Ok(None);
        };
        serde_yaml::from_value(value).map_err(|source| StoreError::Parse {
            path: self.document.path.clone(),
            source,
        })
    }

    /// Stores `value` under this section's key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the document cannot be read, the value
    /// cannot be serialized, or the write fails.
    pub fn write<T>(&self, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        let entry = serde_yaml::to_value(value).map_err(|source| StoreError::Serialize {
            path: self.document.path.clone(),
            source,
        })?;
        let _guard = self.document.lock_writes();
        let mut table = self.document.read_table()?;
        table.insert(self.key.clone(), entry);
        self.document.replace(&table)
    }

    /// Deletes the section. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the document cannot be read or written.
    pub fn remove(&self) -> Result<bool, StoreError> {
        let _guard = self.document.lock_writes();
        let mut table = self.document.read_table()?;
        if table.remove(&self.key).is_none() {
            return Ok(false);
        }
        self.document.replace(&table)?;
        Ok(true)
    }
}
