//! The persistence coordinator.
//!
//! `Store` owns the canonical [`AppState`] of one list instance. It hydrates
//! that state from the local cache and the synchronized backend, writes
//! mutations back to both, and merges change notifications from other
//! instances. Storage failures are logged and dropped; the in-memory state
//! stays authoritative for this instance.
//!
//! Everything runs on the caller's thread. Mutations are visible on the next
//! read; write-back happens when the host calls [`Store::flush`], and remote
//! changes are merged when it calls [`Store::poll_changes`].

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tracing::{debug, warn};

use crate::io::backend::{Backend, ChangeEvent, StorageArea, StorageKey, StoredValues, Subscription};
use crate::io::codec;
use crate::model::{AppState, EditState, Task, Theme};
use crate::ops::task_ops;

/// A change to canonical state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    AddTask(Task),
    ToggleDone(String),
    CyclePriority(String),
    /// Set trimmed text; empty text removes the task
    SetText { id: String, text: String },
    RemoveTask(String),
    ClearCompleted,
    SetTheme(Theme),
    SetMinimized(bool),
}

impl Mutation {
    fn touches_tasks(&self) -> bool {
        !matches!(self, Mutation::SetTheme(_) | Mutation::SetMinimized(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Defaults stand in; nothing is written back
    Hydrating,
    Ready,
}

/// Key groups awaiting write-back to one backend
#[derive(Debug, Default, Clone, Copy)]
struct Dirty {
    tasks: bool,
    /// theme and minimized flag
    settings: bool,
}

impl Dirty {
    fn any(self) -> bool {
        self.tasks || self.settings
    }
}

#[derive(Debug, Default)]
struct Outbox {
    local: Dirty,
    sync: Dirty,
}

impl Outbox {
    fn mark(&mut self, tasks: bool, areas: &[StorageArea]) {
        for area in areas {
            let dirty = self.get_mut(*area);
            if tasks {
                dirty.tasks = true;
            } else {
                dirty.settings = true;
            }
        }
    }

    fn get_mut(&mut self, area: StorageArea) -> &mut Dirty {
        match area {
            StorageArea::Local => &mut self.local,
            StorageArea::Sync => &mut self.sync,
        }
    }

    fn take(&mut self, area: StorageArea) -> Dirty {
        std::mem::take(self.get_mut(area))
    }

    /// Whether `key` holds an unflushed change bound for `area`
    fn is_pending(&self, area: StorageArea, key: StorageKey) -> bool {
        let dirty = match area {
            StorageArea::Local => self.local,
            StorageArea::Sync => self.sync,
        };
        match key {
            StorageKey::Tasks => dirty.tasks,
            StorageKey::Theme | StorageKey::Minimized => dirty.settings,
        }
    }
}

/// Writes kept per backend and key
const MAX_OWN_WRITES: usize = 8;

/// Values this instance wrote, held until their change notifications come
/// back. A notification can arrive after newer local changes, so it is
/// recognized by value rather than compared against current state.
#[derive(Debug, Default)]
struct OwnWrites {
    pending: HashMap<(StorageArea, StorageKey), VecDeque<Value>>,
}

impl OwnWrites {
    fn record(&mut self, area: StorageArea, values: &StoredValues) {
        for (key, value) in values {
            let queue = self.pending.entry((area, *key)).or_default();
            if queue.len() == MAX_OWN_WRITES {
                queue.pop_front();
            }
            queue.push_back(value.clone());
        }
    }

    /// Consume `value` if it is one of our writes, along with every older
    /// write of the same key.
    fn take_echo(&mut self, area: StorageArea, key: StorageKey, value: &Value) -> bool {
        let Some(queue) = self.pending.get_mut(&(area, key)) else {
            return false;
        };
        match queue.iter().position(|v| v == value) {
            Some(pos) => {
                queue.drain(..=pos);
                true
            }
            None => false,
        }
    }
}

const BOTH_AREAS: [StorageArea; 2] = [StorageArea::Local, StorageArea::Sync];

/// Values read from one backend during hydration
#[derive(Debug, Default)]
struct Loaded {
    tasks: Option<Vec<Task>>,
    theme: Option<Theme>,
    minimized: Option<bool>,
}

impl Loaded {
    fn from_values(values: &StoredValues) -> Self {
        Loaded {
            tasks: values.get(&StorageKey::Tasks).and_then(codec::decode_tasks),
            theme: values.get(&StorageKey::Theme).and_then(codec::decode_theme),
            minimized: values
                .get(&StorageKey::Minimized)
                .and_then(codec::decode_minimized),
        }
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_none() && self.theme.is_none() && self.minimized.is_none()
    }

    /// Take every value `newer` has
    fn overwrite_with(&mut self, newer: Loaded) {
        if newer.tasks.is_some() {
            self.tasks = newer.tasks;
        }
        if newer.theme.is_some() {
            self.theme = newer.theme;
        }
        if newer.minimized.is_some() {
            self.minimized = newer.minimized;
        }
    }

    fn encode(&self) -> StoredValues {
        let mut values = StoredValues::new();
        if let Some(tasks) = &self.tasks {
            match codec::encode_tasks(tasks) {
                Ok(v) => {
                    values.insert(StorageKey::Tasks, v);
                }
                Err(e) => warn!(error = %e, "could not encode tasks"),
            }
        }
        if let Some(theme) = self.theme {
            values.insert(StorageKey::Theme, codec::encode_theme(theme));
        }
        if let Some(minimized) = self.minimized {
            values.insert(StorageKey::Minimized, codec::encode_minimized(minimized));
        }
        values
    }
}

fn read_backend(backend: &Backend) -> Option<Loaded> {
    let backend = backend.as_available()?;
    match backend.get(&StorageKey::ALL) {
        Ok(values) => Some(Loaded::from_values(&values)),
        Err(e) => {
            warn!(area = %backend.area(), error = %e, "treating unreadable store as empty");
            None
        }
    }
}

/// Owner of canonical state for one list instance
pub struct Store {
    state: AppState,
    local: Backend,
    sync: Backend,
    phase: Phase,
    /// Mutations made before hydration, replayed onto the hydrated state
    journal: Vec<Mutation>,
    outbox: Outbox,
    own_writes: OwnWrites,
    subscriptions: Vec<Subscription>,
    system_theme: Option<Theme>,
}

impl Store {
    /// Create an unhydrated store and subscribe to both backends' change
    /// channels. `system_theme` is the host's light/dark preference, used
    /// when no theme is stored.
    pub fn new(local: Backend, sync: Backend, system_theme: Option<Theme>) -> Self {
        let mut subscriptions = Vec::new();
        for backend in [&local, &sync] {
            let Some(backend) = backend.as_available() else {
                continue;
            };
            match backend.subscribe() {
                Ok(Some(sub)) => subscriptions.push(sub),
                Ok(None) => {}
                Err(e) => {
                    warn!(area = %backend.area(), error = %e, "change notifications unavailable");
                }
            }
        }

        Store {
            state: AppState {
                theme: system_theme.unwrap_or_default(),
                ..AppState::default()
            },
            local,
            sync,
            phase: Phase::Hydrating,
            journal: Vec::new(),
            outbox: Outbox::default(),
            own_writes: OwnWrites::default(),
            subscriptions,
            system_theme,
        }
    }

    /// A store with no backends at all
    pub fn in_memory() -> Self {
        Self::new(Backend::Unavailable, Backend::Unavailable, None)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn is_hydrated(&self) -> bool {
        self.phase == Phase::Ready
    }

    fn backend(&self, area: StorageArea) -> &Backend {
        match area {
            StorageArea::Local => &self.local,
            StorageArea::Sync => &self.sync,
        }
    }

    /// Areas with a backend to write to, excluding `except`
    fn writable_areas(&self, except: Option<StorageArea>) -> Vec<StorageArea> {
        BOTH_AREAS
            .into_iter()
            .filter(|a| Some(*a) != except && self.backend(*a).is_available())
            .collect()
    }

    /// Load state from storage: the local cache first, then the synchronized
    /// backend, whose values win and are copied into the local cache.
    /// Mutations made before this call are then replayed in order.
    ///
    /// Runs once; later calls do nothing.
    pub fn hydrate(&mut self) {
        if self.is_hydrated() {
            return;
        }

        let mut loaded = read_backend(&self.local).unwrap_or_default();
        if let Some(from_sync) = read_backend(&self.sync)
            && !from_sync.is_empty()
        {
            self.mirror_to_local(&from_sync);
            loaded.overwrite_with(from_sync);
        }

        self.state.tasks = loaded.tasks.unwrap_or_default();
        self.state.theme = loaded.theme.or(self.system_theme).unwrap_or_default();
        self.state.minimized = loaded.minimized.unwrap_or(false);
        self.state.editing = None;
        self.outbox = Outbox::default();
        self.phase = Phase::Ready;

        let journal = std::mem::take(&mut self.journal);
        debug!(
            tasks = self.state.tasks.len(),
            replayed = journal.len(),
            "hydrated"
        );
        for mutation in journal {
            self.apply(mutation);
        }
    }

    fn mirror_to_local(&self, from_sync: &Loaded) {
        let Some(local) = self.local.as_available() else {
            return;
        };
        if let Err(e) = local.set(&from_sync.encode()) {
            warn!(error = %e, "could not copy synchronized values into local cache");
        }
    }

    /// Apply a mutation to canonical state. Returns whether state changed.
    ///
    /// Before hydration the mutation applies to the defaults and is also
    /// journaled for replay; nothing is queued for write-back until then.
    pub fn apply(&mut self, mutation: Mutation) -> bool {
        if !self.is_hydrated() {
            self.journal.push(mutation.clone());
        }

        let touches_tasks = mutation.touches_tasks();
        let tasks = &mut self.state.tasks;
        let changed = match mutation {
            Mutation::AddTask(task) => task_ops::add_task(tasks, task),
            Mutation::ToggleDone(id) => task_ops::toggle_done(tasks, &id),
            Mutation::CyclePriority(id) => task_ops::cycle_priority(tasks, &id),
            Mutation::SetText { id, text } => task_ops::set_text(tasks, &id, &text),
            Mutation::RemoveTask(id) => task_ops::remove_task(tasks, &id),
            Mutation::ClearCompleted => task_ops::clear_completed(tasks) > 0,
            Mutation::SetTheme(theme) => {
                let changed = self.state.theme != theme;
                self.state.theme = theme;
                changed
            }
            Mutation::SetMinimized(minimized) => {
                let changed = self.state.minimized != minimized;
                self.state.minimized = minimized;
                changed
            }
        };

        if changed {
            if touches_tasks {
                self.drop_edit_if_target_gone();
            }
            if self.is_hydrated() {
                let areas = self.writable_areas(None);
                self.outbox.mark(touches_tasks, &areas);
            }
        }
        changed
    }

    fn drop_edit_if_target_gone(&mut self) {
        let gone = self
            .state
            .editing
            .as_ref()
            .is_some_and(|edit| self.state.find_task(&edit.task_id).is_none());
        if gone {
            self.state.editing = None;
        }
    }

    /// Start editing a task, seeding the draft with its text. Fails when the
    /// task does not exist or another edit is in progress.
    pub fn begin_edit(&mut self, id: &str) -> bool {
        if self.state.editing.is_some() {
            return false;
        }
        let Some(task) = self.state.find_task(id) else {
            return false;
        };
        self.state.editing = Some(EditState {
            task_id: task.id.clone(),
            draft: task.text.clone(),
        });
        true
    }

    pub fn update_draft(&mut self, text: &str) -> bool {
        match self.state.editing.as_mut() {
            Some(edit) => {
                edit.draft = text.to_string();
                true
            }
            None => false,
        }
    }

    /// End the edit in progress, returning it
    pub fn take_edit(&mut self) -> Option<EditState> {
        self.state.editing.take()
    }

    /// Write every pending key group to its backend. Failures are logged and
    /// dropped; there is no retry. Does nothing before hydration.
    ///
    /// Returns whether any write was attempted.
    pub fn flush(&mut self) -> bool {
        if !self.is_hydrated() {
            return false;
        }

        let mut attempted = false;
        for area in BOTH_AREAS {
            let dirty = self.outbox.take(area);
            if !dirty.any() {
                continue;
            }
            let Some(backend) = self.backend(area).as_available() else {
                continue;
            };

            let values = self.encode(dirty);
            attempted = true;
            let result = backend.set(&values);
            match result {
                Ok(()) => {
                    debug!(%area, keys = values.len(), "wrote back");
                    self.own_writes.record(area, &values);
                }
                Err(e) => warn!(%area, error = %e, "write-back failed"),
            }
        }
        attempted
    }

    fn encode(&self, dirty: Dirty) -> StoredValues {
        Loaded {
            tasks: dirty.tasks.then(|| self.state.tasks.clone()),
            theme: dirty.settings.then_some(self.state.theme),
            minimized: dirty.settings.then_some(self.state.minimized),
        }
        .encode()
    }

    /// Merge every queued change notification. Returns whether canonical
    /// state changed, i.e. whether views need re-deriving.
    ///
    /// Notifications stay queued until hydration has completed.
    pub fn poll_changes(&mut self) -> bool {
        if !self.is_hydrated() {
            return false;
        }
        let events: Vec<ChangeEvent> = self
            .subscriptions
            .iter()
            .flat_map(Subscription::poll)
            .collect();

        let mut changed = false;
        for event in events {
            changed |= self.merge(event);
        }
        changed
    }

    /// Merge one change notification. Only called once hydrated.
    ///
    /// Skipped, per key: the echo of one of our own writes, and any value
    /// for a key with an unflushed change bound for the same backend (the
    /// next flush overwrites it). Otherwise a value deep-equal to current
    /// state changes nothing. Accepted changes are written back to the
    /// other backend only.
    fn merge(&mut self, event: ChangeEvent) -> bool {
        let origin = event.area;
        let others = self.writable_areas(Some(origin));
        let mut changed = false;
        for (key, value) in event.changes {
            let Some(value) = value else {
                continue;
            };
            if self.own_writes.take_echo(origin, key, &value) {
                debug!(%origin, %key, "own write echoed back");
                continue;
            }
            if self.outbox.is_pending(origin, key) {
                debug!(%origin, %key, "keeping unflushed local change");
                continue;
            }
            let merged = match key {
                StorageKey::Tasks => self.merge_tasks(&value),
                StorageKey::Theme => match codec::decode_theme(&value) {
                    Some(theme) if theme != self.state.theme => {
                        self.state.theme = theme;
                        true
                    }
                    _ => false,
                },
                StorageKey::Minimized => match codec::decode_minimized(&value) {
                    Some(minimized) if minimized != self.state.minimized => {
                        self.state.minimized = minimized;
                        true
                    }
                    _ => false,
                },
            };
            if merged {
                self.outbox.mark(key == StorageKey::Tasks, &others);
                debug!(%origin, %key, "merged remote change");
            }
            changed |= merged;
        }
        changed
    }

    fn merge_tasks(&mut self, value: &Value) -> bool {
        let Some(tasks) = codec::decode_tasks(value) else {
            warn!("ignoring malformed remote task collection");
            return false;
        };
        if tasks == self.state.tasks {
            return false;
        }

        let edited_text = self
            .state
            .editing
            .as_ref()
            .and_then(|e| self.state.find_task(&e.task_id))
            .map(|t| t.text.clone());
        self.state.tasks = tasks;

        let stale = self.state.editing.as_ref().is_some_and(|edit| {
            let current = self.state.find_task(&edit.task_id).map(|t| &t.text);
            current.is_none() || current != edited_text.as_ref()
        });
        if stale {
            debug!("edited task changed underneath the editor");
            self.state.editing = None;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::backend::{StorageBackend, StorageError};
    use crate::io::memory_store::MemoryStore;
    use crate::model::Priority;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn task(id: &str, text: &str, created_at: i64) -> Task {
        Task {
            id: id.into(),
            text: text.into(),
            done: false,
            priority: Priority::Medium,
            created_at,
        }
    }

    fn stored_tasks(tasks: &[Task]) -> StoredValues {
        [(StorageKey::Tasks, codec::encode_tasks(tasks).unwrap())]
            .into_iter()
            .collect()
    }

    fn stored_task_list(store: &MemoryStore) -> Option<Vec<Task>> {
        store
            .snapshot()
            .get(&StorageKey::Tasks)
            .and_then(codec::decode_tasks)
    }

    /// Counts writes and can be told to fail them
    #[derive(Clone)]
    struct Recording {
        inner: MemoryStore,
        writes: Rc<Cell<usize>>,
        fail: bool,
    }

    impl Recording {
        fn new(inner: MemoryStore) -> Self {
            Recording {
                inner,
                writes: Rc::new(Cell::new(0)),
                fail: false,
            }
        }

        fn failing(inner: MemoryStore) -> Self {
            Recording {
                fail: true,
                ..Self::new(inner)
            }
        }
    }

    impl StorageBackend for Recording {
        fn area(&self) -> StorageArea {
            self.inner.area()
        }

        fn get(&self, keys: &[StorageKey]) -> Result<StoredValues, StorageError> {
            self.inner.get(keys)
        }

        fn set(&self, values: &StoredValues) -> Result<(), StorageError> {
            self.writes.set(self.writes.get() + 1);
            if self.fail {
                return Err(StorageError::WriteError {
                    path: "quota".into(),
                    source: std::io::Error::other("quota exceeded"),
                });
            }
            self.inner.set(values)
        }

        fn subscribe(&self) -> Result<Option<Subscription>, StorageError> {
            self.inner.subscribe()
        }
    }

    /// A backend whose reads fail
    struct Unreadable;

    impl StorageBackend for Unreadable {
        fn area(&self) -> StorageArea {
            StorageArea::Local
        }

        fn get(&self, _keys: &[StorageKey]) -> Result<StoredValues, StorageError> {
            Err(StorageError::ReadError {
                path: "local".into(),
                source: std::io::Error::other("corrupt"),
            })
        }

        fn set(&self, _values: &StoredValues) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn hydrate_adopts_local_cache() {
        let mut values = stored_tasks(&[task("a", "from cache", 1)]);
        values.insert(StorageKey::Theme, json!("dark"));
        values.insert(StorageKey::Minimized, json!(true));
        let local = MemoryStore::with_values(StorageArea::Local, values);

        let mut store = Store::new(Backend::available(local), Backend::Unavailable, None);
        assert!(!store.is_hydrated());
        store.hydrate();

        assert!(store.is_hydrated());
        assert_eq!(store.state().tasks, vec![task("a", "from cache", 1)]);
        assert_eq!(store.state().theme, Theme::Dark);
        assert!(store.state().minimized);
    }

    #[test]
    fn sync_overwrites_local_and_refreshes_cache() {
        let local = MemoryStore::with_values(StorageArea::Local, stored_tasks(&[task("A", "a", 1)]));
        let sync = MemoryStore::with_values(StorageArea::Sync, stored_tasks(&[task("B", "b", 2)]));

        let mut store = Store::new(
            Backend::available(local.clone()),
            Backend::available(sync),
            None,
        );
        store.hydrate();

        assert_eq!(store.state().tasks, vec![task("B", "b", 2)]);
        assert_eq!(stored_task_list(&local), Some(vec![task("B", "b", 2)]));
    }

    #[test]
    fn empty_sync_keeps_local_values() {
        let local = MemoryStore::with_values(StorageArea::Local, stored_tasks(&[task("A", "a", 1)]));
        let sync = MemoryStore::new(StorageArea::Sync);

        let mut store = Store::new(
            Backend::available(local),
            Backend::available(sync.clone()),
            None,
        );
        store.hydrate();

        assert_eq!(store.state().tasks, vec![task("A", "a", 1)]);
        assert!(sync.snapshot().is_empty());
    }

    #[test]
    fn theme_falls_back_to_system_preference_then_light() {
        let mut store = Store::new(Backend::Unavailable, Backend::Unavailable, Some(Theme::Dark));
        store.hydrate();
        assert_eq!(store.state().theme, Theme::Dark);

        let mut store = Store::in_memory();
        store.hydrate();
        assert_eq!(store.state().theme, Theme::Light);
    }

    #[test]
    fn malformed_values_are_treated_as_absent() {
        let values: StoredValues = [
            (StorageKey::Tasks, json!({"not": "an array"})),
            (StorageKey::Theme, json!("sepia")),
            (StorageKey::Minimized, json!("yes")),
        ]
        .into_iter()
        .collect();
        let local = MemoryStore::with_values(StorageArea::Local, values);

        let mut store = Store::new(Backend::available(local), Backend::Unavailable, Some(Theme::Dark));
        store.hydrate();

        assert!(store.state().tasks.is_empty());
        assert_eq!(store.state().theme, Theme::Dark);
        assert!(!store.state().minimized);
    }

    #[test]
    fn unreadable_backend_is_treated_as_empty() {
        let mut store = Store::new(Backend::available(Unreadable), Backend::Unavailable, None);
        store.hydrate();
        assert!(store.is_hydrated());
        assert!(store.state().tasks.is_empty());
    }

    #[test]
    fn works_in_memory_without_backends() {
        let mut store = Store::in_memory();
        store.hydrate();
        assert!(store.apply(Mutation::AddTask(task("a", "x", 1))));
        assert!(!store.flush());
        assert!(!store.poll_changes());
        assert_eq!(store.state().tasks.len(), 1);
    }

    #[test]
    fn no_write_before_hydration_and_journal_replays() {
        let local = Recording::new(MemoryStore::with_values(
            StorageArea::Local,
            stored_tasks(&[task("A", "stored", 1)]),
        ));
        let sync = Recording::new(MemoryStore::new(StorageArea::Sync));
        let mut store = Store::new(
            Backend::available(local.clone()),
            Backend::available(sync.clone()),
            None,
        );

        assert!(store.apply(Mutation::AddTask(task("N", "early", 5))));
        assert_eq!(store.state().tasks, vec![task("N", "early", 5)]);
        assert!(!store.flush());
        assert_eq!(local.writes.get(), 0);
        assert_eq!(sync.writes.get(), 0);

        store.hydrate();
        assert_eq!(
            store.state().tasks,
            vec![task("N", "early", 5), task("A", "stored", 1)]
        );
        assert_eq!(local.writes.get(), 0);

        assert!(store.flush());
        assert_eq!(local.writes.get(), 1);
        assert_eq!(sync.writes.get(), 1);
        assert_eq!(
            stored_task_list(&local.inner),
            Some(vec![task("N", "early", 5), task("A", "stored", 1)])
        );
    }

    #[test]
    fn pre_hydration_toggle_replays_against_hydrated_state() {
        let mut store = Store::in_memory();
        store.apply(Mutation::AddTask(task("N", "early", 5)));
        store.apply(Mutation::ToggleDone("N".into()));
        store.hydrate();
        assert!(store.state().tasks[0].done);
    }

    #[test]
    fn mutation_writes_back_to_both_backends() {
        let local = MemoryStore::new(StorageArea::Local);
        let sync = MemoryStore::new(StorageArea::Sync);
        let mut store = Store::new(
            Backend::available(local.clone()),
            Backend::available(sync.clone()),
            None,
        );
        store.hydrate();

        store.apply(Mutation::AddTask(task("a", "x", 1)));
        store.apply(Mutation::SetTheme(Theme::Dark));
        assert!(store.flush());

        for backend in [&local, &sync] {
            let snapshot = backend.snapshot();
            assert_eq!(stored_task_list(backend), Some(vec![task("a", "x", 1)]));
            assert_eq!(snapshot.get(&StorageKey::Theme), Some(&json!("dark")));
            assert_eq!(snapshot.get(&StorageKey::Minimized), Some(&json!(false)));
        }
        assert!(!store.flush());
    }

    #[test]
    fn settings_and_tasks_are_written_independently() {
        let local = Recording::new(MemoryStore::new(StorageArea::Local));
        let mut store = Store::new(Backend::available(local.clone()), Backend::Unavailable, None);
        store.hydrate();

        store.apply(Mutation::SetMinimized(true));
        store.flush();
        let snapshot = local.inner.snapshot();
        assert_eq!(snapshot.get(&StorageKey::Minimized), Some(&json!(true)));
        assert!(snapshot.get(&StorageKey::Tasks).is_none());
    }

    #[test]
    fn unchanged_mutation_queues_nothing() {
        let local = Recording::new(MemoryStore::new(StorageArea::Local));
        let mut store = Store::new(Backend::available(local.clone()), Backend::Unavailable, None);
        store.hydrate();

        assert!(!store.apply(Mutation::ToggleDone("missing".into())));
        assert!(!store.apply(Mutation::SetMinimized(false)));
        assert!(!store.flush());
        assert_eq!(local.writes.get(), 0);
    }

    #[test]
    fn write_failure_keeps_memory_state() {
        let local = Recording::failing(MemoryStore::new(StorageArea::Local));
        let mut store = Store::new(Backend::available(local.clone()), Backend::Unavailable, None);
        store.hydrate();

        store.apply(Mutation::AddTask(task("a", "x", 1)));
        assert!(store.flush());
        assert_eq!(local.writes.get(), 1);
        assert_eq!(store.state().tasks, vec![task("a", "x", 1)]);

        // one-shot: nothing is retried
        assert!(!store.flush());
        assert_eq!(local.writes.get(), 1);
    }

    #[test]
    fn own_write_echo_is_suppressed() {
        let sync = MemoryStore::new(StorageArea::Sync);
        let mut store = Store::new(Backend::Unavailable, Backend::available(sync), None);
        store.hydrate();

        store.apply(Mutation::AddTask(task("a", "x", 1)));
        store.flush();
        assert!(!store.poll_changes());
        assert!(!store.flush());
    }

    #[test]
    fn late_echo_does_not_undo_unflushed_change() {
        let sync = MemoryStore::new(StorageArea::Sync);
        let mut store = Store::new(Backend::Unavailable, Backend::available(sync.clone()), None);
        store.hydrate();

        store.apply(Mutation::AddTask(task("1", "first", 1)));
        store.flush();
        store.apply(Mutation::AddTask(task("2", "second", 2)));

        assert!(!store.poll_changes());
        assert!(store.flush());
        let expected = vec![task("2", "second", 2), task("1", "first", 1)];
        assert_eq!(store.state().tasks, expected);
        assert_eq!(stored_task_list(&sync), Some(expected));
    }

    #[test]
    fn echoes_of_superseded_writes_are_ignored() {
        let local = MemoryStore::new(StorageArea::Local);
        let sync = MemoryStore::new(StorageArea::Sync);
        let mut store = Store::new(
            Backend::available(local.clone()),
            Backend::available(sync.clone()),
            None,
        );
        store.hydrate();

        store.apply(Mutation::AddTask(task("1", "first", 1)));
        store.flush();
        store.apply(Mutation::AddTask(task("2", "second", 2)));
        store.flush();

        // both writes come back from both backends, oldest first
        assert!(!store.poll_changes());
        assert_eq!(store.state().tasks.len(), 2);
        assert!(!store.flush());
        assert_eq!(stored_task_list(&local), stored_task_list(&sync));
    }

    #[test]
    fn unflushed_key_is_kept_over_remote_value() {
        let sync = MemoryStore::new(StorageArea::Sync);
        let mut store = Store::new(Backend::Unavailable, Backend::available(sync.clone()), None);
        store.hydrate();
        store.apply(Mutation::AddTask(task("mine", "local edit", 1)));

        let mut remote = stored_tasks(&[task("theirs", "remote edit", 2)]);
        remote.insert(StorageKey::Theme, json!("dark"));
        sync.set(&remote).unwrap();

        // the theme has no pending change, so it merges
        assert!(store.poll_changes());
        assert_eq!(store.state().theme, Theme::Dark);
        assert_eq!(store.state().tasks, vec![task("mine", "local edit", 1)]);

        store.flush();
        assert_eq!(
            stored_task_list(&sync),
            Some(vec![task("mine", "local edit", 1)])
        );
    }

    #[test]
    fn deep_equal_notification_is_no_transition() {
        let mut store = Store::in_memory();
        store.hydrate();
        store.apply(Mutation::AddTask(task("a", "x", 1)));
        let before = store.state().clone();

        let event = ChangeEvent {
            area: StorageArea::Sync,
            changes: vec![
                (StorageKey::Tasks, Some(codec::encode_tasks(&before.tasks).unwrap())),
                (StorageKey::Theme, Some(json!("light"))),
                (StorageKey::Minimized, Some(json!(false))),
            ],
        };
        assert!(!store.merge(event));
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn remote_change_replaces_tasks_and_refreshes_other_backend() {
        let local = MemoryStore::new(StorageArea::Local);
        let sync = Recording::new(MemoryStore::new(StorageArea::Sync));
        let mut store = Store::new(
            Backend::available(local.clone()),
            Backend::available(sync.clone()),
            None,
        );
        store.hydrate();

        // another instance writes to the synchronized store
        sync.inner
            .set(&stored_tasks(&[task("r", "remote", 3)]))
            .unwrap();
        assert!(store.poll_changes());
        assert_eq!(store.state().tasks, vec![task("r", "remote", 3)]);

        store.flush();
        assert_eq!(stored_task_list(&local), Some(vec![task("r", "remote", 3)]));
        assert_eq!(sync.writes.get(), 0);
    }

    #[test]
    fn remote_priority_defaults_are_normalized_before_compare() {
        let mut store = Store::in_memory();
        store.hydrate();
        store.apply(Mutation::AddTask(task("a", "x", 1)));

        let event = ChangeEvent {
            area: StorageArea::Sync,
            changes: vec![(
                StorageKey::Tasks,
                Some(json!([{ "id": "a", "text": "x", "done": false, "createdAt": 1 }])),
            )],
        };
        assert!(!store.merge(event));
    }

    #[test]
    fn remote_change_clears_edit_when_text_changes() {
        let mut store = Store::in_memory();
        store.hydrate();
        store.apply(Mutation::AddTask(task("a", "original", 1)));
        assert!(store.begin_edit("a"));
        store.update_draft("my draft");

        let event = ChangeEvent {
            area: StorageArea::Sync,
            changes: vec![(
                StorageKey::Tasks,
                Some(codec::encode_tasks(&[task("a", "changed elsewhere", 1)]).unwrap()),
            )],
        };
        assert!(store.merge(event));
        assert!(store.state().editing.is_none());
    }

    #[test]
    fn remote_change_clears_edit_when_task_removed() {
        let mut store = Store::in_memory();
        store.hydrate();
        store.apply(Mutation::AddTask(task("a", "x", 1)));
        store.apply(Mutation::AddTask(task("b", "y", 2)));
        store.begin_edit("a");

        let event = ChangeEvent {
            area: StorageArea::Sync,
            changes: vec![(
                StorageKey::Tasks,
                Some(codec::encode_tasks(&[task("b", "y", 2)]).unwrap()),
            )],
        };
        assert!(store.merge(event));
        assert!(store.state().editing.is_none());
    }

    #[test]
    fn remote_change_to_other_task_keeps_edit() {
        let mut store = Store::in_memory();
        store.hydrate();
        store.apply(Mutation::AddTask(task("a", "x", 1)));
        store.apply(Mutation::AddTask(task("b", "y", 2)));
        store.begin_edit("a");
        store.update_draft("x, edited");

        let mut remote = store.state().tasks.clone();
        remote[0].done = true; // "b"
        let event = ChangeEvent {
            area: StorageArea::Local,
            changes: vec![(StorageKey::Tasks, Some(codec::encode_tasks(&remote).unwrap()))],
        };
        assert!(store.merge(event));
        assert_eq!(
            store.state().editing,
            Some(EditState {
                task_id: "a".into(),
                draft: "x, edited".into()
            })
        );
    }

    #[test]
    fn remote_settings_merge() {
        let mut store = Store::in_memory();
        store.hydrate();
        let event = ChangeEvent {
            area: StorageArea::Sync,
            changes: vec![
                (StorageKey::Theme, Some(json!("dark"))),
                (StorageKey::Minimized, Some(json!(true))),
                (StorageKey::Tasks, None),
            ],
        };
        assert!(store.merge(event));
        assert_eq!(store.state().theme, Theme::Dark);
        assert!(store.state().minimized);
    }

    #[test]
    fn notifications_wait_for_hydration() {
        let sync = MemoryStore::new(StorageArea::Sync);
        let mut store = Store::new(Backend::Unavailable, Backend::available(sync.clone()), None);

        sync.set(&stored_tasks(&[task("r", "remote", 3)])).unwrap();
        assert!(!store.poll_changes());

        // hydration reads the same value, so the queued event is an echo
        store.hydrate();
        assert_eq!(store.state().tasks, vec![task("r", "remote", 3)]);
        assert!(!store.poll_changes());
    }

    #[test]
    fn local_removal_of_edit_target_clears_edit() {
        let mut store = Store::in_memory();
        store.hydrate();
        store.apply(Mutation::AddTask(task("a", "x", 1)));
        store.begin_edit("a");
        store.apply(Mutation::RemoveTask("a".into()));
        assert!(store.state().editing.is_none());
    }

    #[test]
    fn hydrate_runs_once() {
        let local = MemoryStore::new(StorageArea::Local);
        let mut store = Store::new(Backend::available(local.clone()), Backend::Unavailable, None);
        store.hydrate();
        store.apply(Mutation::AddTask(task("a", "x", 1)));

        local.set(&stored_tasks(&[])).unwrap();
        store.hydrate();
        assert_eq!(store.state().tasks.len(), 1);
    }
}
