use std::fmt;

use serde::{Deserialize, Serialize};

use super::task::Task;

/// Color theme selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse_theme(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-progress text edit of a single task. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditState {
    pub task_id: String,
    pub draft: String,
}

/// The whole state of one list instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    /// Canonical order: newest-created first on insert. Not the display order.
    pub tasks: Vec<Task>,
    pub theme: Theme,
    pub minimized: bool,
    pub editing: Option<EditState>,
}

impl AppState {
    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}
