use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Cycle: low → medium → high → low
    pub fn next(self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }

    /// Sort rank; high sorts first
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse_priority(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display category, derived from the task text prefix. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bug,
    Feature,
    Design,
    Other,
}

impl Category {
    /// Display order of category groups
    pub const ORDER: [Category; 4] = [
        Category::Bug,
        Category::Feature,
        Category::Design,
        Category::Other,
    ];

    /// Classify by case-insensitive prefix: `bug:`/`bug `, `feature:`/`feature `,
    /// `design:`/`design `. Anything else is `Other`.
    pub fn of(text: &str) -> Category {
        let t = text.trim().to_lowercase();
        let has_prefix = |word: &str| {
            t.strip_prefix(word)
                .is_some_and(|rest| rest.starts_with(':') || rest.starts_with(' '))
        };
        if has_prefix("bug") {
            Category::Bug
        } else if has_prefix("feature") {
            Category::Feature
        } else if has_prefix("design") {
            Category::Design
        } else {
            Category::Other
        }
    }

    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "bug" => Some(Category::Bug),
            "feature" => Some(Category::Feature),
            "design" => Some(Category::Design),
            "other" => Some(Category::Other),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Bug => "Bug",
            Category::Feature => "Feature",
            Category::Design => "Design",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single task as held in canonical state and persisted to storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque unique id, never reused
    pub id: String,
    /// Display text, non-empty after trimming
    pub text: String,
    pub done: bool,
    pub priority: Priority,
    /// Creation time in milliseconds since the Unix epoch
    pub created_at: i64,
}

impl Task {
    /// Create a fresh task: new id, medium priority, not done, stamped now.
    pub fn new(text: impl Into<String>) -> Self {
        Task {
            id: new_task_id(),
            text: text.into(),
            done: false,
            priority: Priority::Medium,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn category(&self) -> Category {
        Category::of(&self.text)
    }
}

/// Generate a fresh task id
pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
