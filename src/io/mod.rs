pub mod backend;
pub mod codec;
pub mod config_io;
pub mod file_store;
pub mod lock;
pub mod memory_store;
pub mod watcher;

pub use backend::{
    Backend, ChangeEvent, StorageArea, StorageBackend, StorageError, StorageKey, StoredValues,
    Subscription,
};
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
