use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc;

use indexmap::IndexMap;
use serde_json::Value;

use super::lock::LockError;

/// The three logical keys each backend holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Tasks,
    Theme,
    Minimized,
}

impl StorageKey {
    pub const ALL: [StorageKey; 3] = [StorageKey::Tasks, StorageKey::Theme, StorageKey::Minimized];

    /// The key string as written to a backend
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::Tasks => "popupTasks",
            StorageKey::Theme => "popupTasksTheme",
            StorageKey::Minimized => "popupTasksMinimized",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which storage area a backend or change event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageArea {
    /// Fast, instance-local cache
    Local,
    /// Store that propagates across devices and instances
    Sync,
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageArea::Local => write!(f, "local"),
            StorageArea::Sync => write!(f, "sync"),
        }
    }
}

/// Values read from or written to a backend, in key order
pub type StoredValues = IndexMap<StorageKey, Value>;

/// A change reported by a backend. `None` means the key was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub area: StorageArea,
    pub changes: Vec<(StorageKey, Option<Value>)>,
}

/// Error type for storage backends
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed store {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not encode stored value: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("could not watch store: {0}")]
    Watch(#[from] notify::Error),
}

/// A live change feed from one backend. Dropping it unsubscribes.
pub struct Subscription {
    rx: mpsc::Receiver<ChangeEvent>,
    _handle: Option<Box<dyn Send>>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<ChangeEvent>) -> Self {
        Subscription { rx, _handle: None }
    }

    /// Keep `handle` alive for as long as the subscription is.
    pub fn with_handle(rx: mpsc::Receiver<ChangeEvent>, handle: impl Send + 'static) -> Self {
        Subscription {
            rx,
            _handle: Some(Box::new(handle)),
        }
    }

    /// Non-blocking poll. Returns all queued events (may be empty).
    pub fn poll(&self) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }
}

/// An opaque key-value store holding the persisted keys.
///
/// Writes are best-effort: callers log and drop errors. A backend without a
/// change channel returns `Ok(None)` from `subscribe`.
pub trait StorageBackend {
    fn area(&self) -> StorageArea;

    /// Read the requested keys. Absent keys are missing from the result.
    fn get(&self, keys: &[StorageKey]) -> Result<StoredValues, StorageError>;

    /// Write the given keys, leaving other keys untouched.
    fn set(&self, values: &StoredValues) -> Result<(), StorageError>;

    fn subscribe(&self) -> Result<Option<Subscription>, StorageError> {
        Ok(None)
    }
}

/// A backend capability, resolved once at startup
pub enum Backend {
    Available(Box<dyn StorageBackend>),
    Unavailable,
}

impl Backend {
    pub fn available(backend: impl StorageBackend + 'static) -> Self {
        Backend::Available(Box::new(backend))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Backend::Available(_))
    }

    pub fn as_available(&self) -> Option<&dyn StorageBackend> {
        match self {
            Backend::Available(backend) => Some(backend.as_ref()),
            Backend::Unavailable => None,
        }
    }
}

impl<B: StorageBackend + 'static> From<Option<B>> for Backend {
    fn from(backend: Option<B>) -> Self {
        match backend {
            Some(b) => Backend::available(b),
            None => Backend::Unavailable,
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Available(b) => write!(f, "Available({})", b.area()),
            Backend::Unavailable => write!(f, "Unavailable"),
        }
    }
}
