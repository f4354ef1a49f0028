use std::fmt::Write;

use serde::Serialize;

use crate::model::{AppState, Category, Task, Theme};
use crate::view::{TaskGroup, ViewModel};

/// Characters of the id shown in text output
const SHORT_ID_LEN: usize = 8;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct GroupJson<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub collapsed: bool,
    pub tasks: Vec<&'a Task>,
}

#[derive(Serialize)]
pub struct ListJson<'a> {
    pub theme: Theme,
    pub minimized: bool,
    pub remaining: usize,
    pub groups: Vec<GroupJson<'a>>,
}

#[derive(Serialize)]
pub struct SearchJson<'a> {
    pub query: &'a str,
    pub tasks: Vec<&'a Task>,
}

pub fn list_json<'a>(state: &'a AppState, view: &ViewModel) -> ListJson<'a> {
    ListJson {
        theme: state.theme,
        minimized: state.minimized,
        remaining: view.remaining(state),
        groups: view
            .groups(state)
            .into_iter()
            .map(|g| GroupJson {
                collapsed: g.category.is_some_and(|c| view.is_collapsed(c)),
                category: g.category,
                tasks: g.tasks,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Text output
// ---------------------------------------------------------------------------

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

fn task_line(out: &mut String, task: &Task) {
    let check = if task.done { "[x]" } else { "[ ]" };
    let _ = writeln!(
        out,
        "  {} {:<8}  {:<6}  {}",
        check,
        short_id(&task.id),
        task.priority.as_str(),
        task.text
    );
}

fn header(state: &AppState, view: &ViewModel) -> String {
    format!("Tasks ({} remaining)", view.remaining(state))
}

/// Render the whole list the way the widget shows it
pub fn render_list(state: &AppState, view: &ViewModel) -> String {
    let mut out = String::new();
    if state.minimized {
        let _ = writeln!(out, "[minimized] {}", header(state, view));
        return out;
    }

    let _ = writeln!(out, "{}", header(state, view));
    if view.is_empty(state) {
        out.push_str("  No tasks yet\n");
        return out;
    }
    for group in view.groups(state) {
        render_group(&mut out, &group, view);
    }
    out
}

fn render_group(out: &mut String, group: &TaskGroup<'_>, view: &ViewModel) {
    if let Some(category) = group.category {
        let collapsed = view.is_collapsed(category);
        let chevron = if collapsed { "▸" } else { "▾" };
        let _ = writeln!(out, "{} {} ({})", chevron, category.label(), group.tasks.len());
        if collapsed {
            return;
        }
    }
    for task in &group.tasks {
        task_line(out, task);
    }
}

/// Render search results as one flat list
pub fn render_matches(query: &str, tasks: &[&Task]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} match(es) for '{}'", tasks.len(), query);
    for task in tasks {
        task_line(&mut out, task);
    }
    out
}
