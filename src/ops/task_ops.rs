use crate::model::task::Task;

// Pure mutations of a task collection. Each returns whether anything
// changed, so callers know when a write-back is due.

/// Insert at the head of canonical order. A task whose id is already
/// present is not inserted again.
pub fn add_task(tasks: &mut Vec<Task>, task: Task) -> bool {
    if tasks.iter().any(|t| t.id == task.id) {
        return false;
    }
    tasks.insert(0, task);
    true
}

pub fn toggle_done(tasks: &mut [Task], id: &str) -> bool {
    match find_task_mut(tasks, id) {
        Some(task) => {
            task.done = !task.done;
            true
        }
        None => false,
    }
}

/// Advance priority: low → medium → high → low
pub fn cycle_priority(tasks: &mut [Task], id: &str) -> bool {
    match find_task_mut(tasks, id) {
        Some(task) => {
            task.priority = task.priority.next();
            true
        }
        None => false,
    }
}

/// Replace a task's text with the trimmed `text`. Empty text deletes the task.
pub fn set_text(tasks: &mut Vec<Task>, id: &str, text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return remove_task(tasks, id);
    }
    match find_task_mut(tasks, id) {
        Some(task) if task.text != text => {
            task.text = text.to_string();
            true
        }
        _ => false,
    }
}

pub fn remove_task(tasks: &mut Vec<Task>, id: &str) -> bool {
    let before = tasks.len();
    tasks.retain(|t| t.id != id);
    tasks.len() != before
}

/// Remove every completed task. Returns how many were removed.
pub fn clear_completed(tasks: &mut Vec<Task>) -> usize {
    let before = tasks.len();
    tasks.retain(|t| !t.done);
    before - tasks.len()
}

pub fn find_task_mut<'a>(tasks: &'a mut [Task], id: &str) -> Option<&'a mut Task> {
    tasks.iter_mut().find(|t| t.id == id)
}
