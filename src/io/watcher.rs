use std::path::Path;
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::backend::{ChangeEvent, StorageArea, StorageError, StorageKey, Subscription};
use super::file_store::{parent_dir, read_store_file};

/// Start watching a store file. Every create/modify/remove of the file
/// re-reads it and sends the current value of every key.
///
/// The parent directory is watched rather than the file itself, because
/// atomic writes replace the file's inode.
pub fn watch_store(store_path: &Path, area: StorageArea) -> Result<Subscription, notify::Error> {
    let (tx, rx) = mpsc::channel();
    let store_path_owned = store_path.to_path_buf();
    let file_name = store_path.file_name().map(|n| n.to_os_string());

    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| {
            let event = match result {
                Ok(e) => e,
                Err(_) => return,
            };

            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                _ => return,
            }

            // Skip the lock file and temp files next to the store
            let relevant = event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
            if !relevant {
                return;
            }

            match read_change_event(&store_path_owned, area) {
                Ok(change) => {
                    let _ = tx.send(change);
                }
                Err(e) => {
                    tracing::debug!(%area, error = %e, "ignoring unreadable store change");
                }
            }
        },
        Config::default(),
    )?;

    watcher.watch(parent_dir(store_path), RecursiveMode::NonRecursive)?;
    Ok(Subscription::with_handle(rx, watcher))
}

/// Snapshot a store file as a change event carrying every key
pub fn read_change_event(store_path: &Path, area: StorageArea) -> Result<ChangeEvent, StorageError> {
    let map = read_store_file(store_path)?;
    let changes = StorageKey::ALL
        .into_iter()
        .map(|k| (k, map.get(k.as_str()).cloned()))
        .collect();
    Ok(ChangeEvent { area, changes })
}
