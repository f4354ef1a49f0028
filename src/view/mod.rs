//! The view model: derived projections of canonical state, and the mutation
//! operations a UI triggers. Projections are recomputed on every call and
//! never cached. Mutations go through the [`Store`].

pub mod derive;

use std::collections::HashSet;

pub use derive::TaskGroup;

use crate::model::{AppState, Category, Task, Theme, ViewOptions};
use crate::store::{Mutation, Store};

#[derive(Debug, Clone, Default)]
pub struct ViewModel {
    options: ViewOptions,
    /// Category groups folded shut. Session-only.
    collapsed: HashSet<Category>,
}

impl ViewModel {
    pub fn new(options: ViewOptions) -> Self {
        ViewModel {
            options,
            collapsed: HashSet::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Derived views
    // -----------------------------------------------------------------------

    pub fn groups<'s>(&self, state: &'s AppState) -> Vec<TaskGroup<'s>> {
        derive::group_tasks(&state.tasks, self.options)
    }

    /// Every task in display order, ignoring grouping
    pub fn sorted<'s>(&self, state: &'s AppState) -> Vec<&'s Task> {
        let mut tasks: Vec<&Task> = state.tasks.iter().collect();
        derive::sort_tasks(&mut tasks, self.options.sort_by_priority);
        tasks
    }

    pub fn filter<'s>(&self, state: &'s AppState, query: &str) -> Vec<&'s Task> {
        derive::filter_tasks(&state.tasks, query, self.options.sort_by_priority)
    }

    /// Number of open tasks
    pub fn remaining(&self, state: &AppState) -> usize {
        state.tasks.iter().filter(|t| !t.done).count()
    }

    pub fn is_empty(&self, state: &AppState) -> bool {
        state.tasks.is_empty()
    }

    pub fn is_collapsed(&self, category: Category) -> bool {
        self.collapsed.contains(&category)
    }

    pub fn toggle_collapsed(&mut self, category: Category) {
        if !self.collapsed.remove(&category) {
            self.collapsed.insert(category);
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Add a task with the trimmed text. Returns its id, or `None` when the
    /// text is blank.
    pub fn add_task(&self, store: &mut Store, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let task = Task::new(text);
        let id = task.id.clone();
        store.apply(Mutation::AddTask(task));
        Some(id)
    }

    pub fn toggle_done(&self, store: &mut Store, id: &str) -> bool {
        store.apply(Mutation::ToggleDone(id.to_string()))
    }

    pub fn cycle_priority(&self, store: &mut Store, id: &str) -> bool {
        store.apply(Mutation::CyclePriority(id.to_string()))
    }

    /// Start editing `id`. One edit at a time.
    pub fn begin_edit(&self, store: &mut Store, id: &str) -> bool {
        store.begin_edit(id)
    }

    pub fn update_draft(&self, store: &mut Store, text: &str) -> bool {
        store.update_draft(text)
    }

    /// Save the draft. A blank draft deletes the task. Returns false when
    /// no edit was in progress.
    pub fn commit_edit(&self, store: &mut Store) -> bool {
        let Some(edit) = store.take_edit() else {
            return false;
        };
        let draft = edit.draft.trim();
        if draft.is_empty() {
            store.apply(Mutation::RemoveTask(edit.task_id));
        } else {
            store.apply(Mutation::SetText {
                id: edit.task_id,
                text: draft.to_string(),
            });
        }
        true
    }

    pub fn cancel_edit(&self, store: &mut Store) -> bool {
        store.take_edit().is_some()
    }

    pub fn remove_task(&self, store: &mut Store, id: &str) -> bool {
        store.apply(Mutation::RemoveTask(id.to_string()))
    }

    pub fn clear_completed(&self, store: &mut Store) -> bool {
        store.apply(Mutation::ClearCompleted)
    }

    pub fn set_theme(&self, store: &mut Store, theme: Theme) -> bool {
        store.apply(Mutation::SetTheme(theme))
    }

    pub fn toggle_theme(&self, store: &mut Store) -> bool {
        let theme = store.state().theme.toggled();
        self.set_theme(store, theme)
    }

    pub fn set_minimized(&self, store: &mut Store, minimized: bool) -> bool {
        store.apply(Mutation::SetMinimized(minimized))
    }

    pub fn toggle_minimized(&self, store: &mut Store) -> bool {
        let minimized = !store.state().minimized;
        self.set_minimized(store, minimized)
    }
}
