use std::cmp::Ordering;

use regex::Regex;
use serde::Serialize;

use crate::model::{Category, GroupBy, Task, ViewOptions};

/// One displayed group. `category` is `None` for the flat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskGroup<'a> {
    pub category: Option<Category>,
    pub tasks: Vec<&'a Task>,
}

/// Display order: open before done, then (if enabled) high → medium → low,
/// then newest first.
pub fn display_order(a: &Task, b: &Task, by_priority: bool) -> Ordering {
    a.done
        .cmp(&b.done)
        .then_with(|| {
            if by_priority {
                a.priority.rank().cmp(&b.priority.rank())
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| b.created_at.cmp(&a.created_at))
}

pub fn sort_tasks(tasks: &mut [&Task], by_priority: bool) {
    tasks.sort_by(|a, b| display_order(a, b, by_priority));
}

/// Group and sort tasks for display. Empty groups are omitted; category
/// groups come in bug, feature, design, other order.
pub fn group_tasks(tasks: &[Task], options: ViewOptions) -> Vec<TaskGroup<'_>> {
    match options.group_by {
        GroupBy::None => {
            if tasks.is_empty() {
                return Vec::new();
            }
            let mut all: Vec<&Task> = tasks.iter().collect();
            sort_tasks(&mut all, options.sort_by_priority);
            vec![TaskGroup {
                category: None,
                tasks: all,
            }]
        }
        GroupBy::Category => Category::ORDER
            .into_iter()
            .filter_map(|category| {
                let mut members: Vec<&Task> =
                    tasks.iter().filter(|t| t.category() == category).collect();
                if members.is_empty() {
                    return None;
                }
                sort_tasks(&mut members, options.sort_by_priority);
                Some(TaskGroup {
                    category: Some(category),
                    tasks: members,
                })
            })
            .collect(),
    }
}

/// Compile a case-insensitive search pattern, falling back to a literal
/// match when `pattern` is not a valid regex.
pub fn search_regex(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("(?i){}", pattern))
        .or_else(|_| Regex::new(&format!("(?i){}", regex::escape(pattern))))
        .ok()
}

/// Tasks whose text matches `pattern`, in display order
pub fn filter_tasks<'a>(tasks: &'a [Task], pattern: &str, by_priority: bool) -> Vec<&'a Task> {
    let Some(re) = search_regex(pattern) else {
        return Vec::new();
    };
    let mut matched: Vec<&Task> = tasks.iter().filter(|t| re.is_match(&t.text)).collect();
    sort_tasks(&mut matched, by_priority);
    matched
}
