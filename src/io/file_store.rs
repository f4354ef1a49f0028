use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;
use tempfile::NamedTempFile;

use super::backend::{
    StorageArea, StorageBackend, StorageError, StorageKey, StoredValues, Subscription,
};
use super::lock::FileLock;
use super::watcher;

/// A key-value store kept as one JSON object in a file.
///
/// Keys this crate does not know about are preserved on write. Several
/// instances may share one file: writes take an advisory lock and replace
/// the file atomically, and `subscribe` watches it for changes made by
/// anyone, this instance included.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    area: StorageArea,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, area: StorageArea) -> Self {
        FileStore {
            path: path.into(),
            area,
        }
    }

    fn dir(&self) -> &Path {
        parent_dir(&self.path)
    }
}

impl StorageBackend for FileStore {
    fn area(&self) -> StorageArea {
        self.area
    }

    fn get(&self, keys: &[StorageKey]) -> Result<StoredValues, StorageError> {
        let map = read_store_file(&self.path)?;
        Ok(keys
            .iter()
            .filter_map(|k| map.get(k.as_str()).map(|v| (*k, v.clone())))
            .collect())
    }

    fn set(&self, values: &StoredValues) -> Result<(), StorageError> {
        fs::create_dir_all(self.dir()).map_err(|e| StorageError::WriteError {
            path: self.path.clone(),
            source: e,
        })?;
        let _lock = FileLock::acquire_default(&self.path)?;

        let mut map = match read_store_file(&self.path) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(area = %self.area, error = %e, "replacing unreadable store file");
                IndexMap::new()
            }
        };
        for (key, value) in values {
            map.insert(key.as_str().to_string(), value.clone());
        }

        let content = serde_json::to_string_pretty(&map)?;
        atomic_write(&self.path, content.as_bytes()).map_err(|e| StorageError::WriteError {
            path: self.path.clone(),
            source: e,
        })
    }

    fn subscribe(&self) -> Result<Option<Subscription>, StorageError> {
        fs::create_dir_all(self.dir()).map_err(|e| StorageError::WriteError {
            path: self.path.clone(),
            source: e,
        })?;
        let subscription = watcher::watch_store(&self.path, self.area)?;
        Ok(Some(subscription))
    }
}

/// Read a store file. A missing file is an empty store.
pub fn read_store_file(path: &Path) -> Result<IndexMap<String, Value>, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(IndexMap::new()),
        Err(e) => {
            return Err(StorageError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    if content.trim().is_empty() {
        return Ok(IndexMap::new());
    }
    serde_json::from_str(&content).map_err(|e| StorageError::Malformed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub(crate) fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}
