// Encoding and defensive decoding of the persisted documents

use crate::models::{DEFAULT_PALETTE, Task, TaskList, is_hex_color};
use crate::storage::KeyValueStorage;
use eyre::{Context, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Storage key of the task list array
pub const TASK_LISTS_KEY: &str = "taskLists";

/// Storage key of the tasks-by-list object
pub const TASKS_KEY: &str = "tasks";

/// Tasks grouped by owning list id
pub type TasksByList = BTreeMap<String, Vec<Task>>;

/// Both collections as loaded from storage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub task_lists: Vec<TaskList>,
    pub tasks: TasksByList,
}

/// Write both documents
pub fn save<S: KeyValueStorage + ?Sized>(storage: &mut S, task_lists: &[TaskList], tasks: &TasksByList) -> Result<()> {
    let lists_json = serde_json::to_string(task_lists).context("Failed to serialize task lists")?;
    let tasks_json = serde_json::to_string(tasks).context("Failed to serialize tasks")?;

    storage
        .set_item(TASK_LISTS_KEY, &lists_json)
        .wrap_err("Failed to save task lists")?;
    storage.set_item(TASKS_KEY, &tasks_json).wrap_err("Failed to save tasks")?;

    debug!(lists = task_lists.len(), "Saved snapshot");
    Ok(())
}

/// Read both documents and repair them into a consistent snapshot
///
/// Only storage read errors are returned. Malformed content is logged and
/// dropped: a document of the wrong shape loads as empty, a bad entry is
/// skipped, orphaned task arrays are discarded, a missing list color falls
/// back to the first default color and every list's counters are recomputed
/// from its tasks.
pub fn load<S: KeyValueStorage + ?Sized>(storage: &S) -> Result<Snapshot> {
    let task_lists = match storage.get_item(TASK_LISTS_KEY).wrap_err("Failed to read task lists")? {
        Some(raw) => decode_task_lists(&raw),
        None => Vec::new(),
    };
    let tasks = match storage.get_item(TASKS_KEY).wrap_err("Failed to read tasks")? {
        Some(raw) => decode_tasks(&raw),
        None => TasksByList::new(),
    };

    let snapshot = reconcile(task_lists, tasks);

    info!(
        lists = snapshot.task_lists.len(),
        tasks = snapshot.tasks.values().map(Vec::len).sum::<usize>(),
        "Loaded snapshot"
    );

    Ok(snapshot)
}

fn parse_document(key: &str, raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = ?e, "Stored document is not valid JSON, ignoring it");
            None
        }
    }
}

fn decode_task_lists(raw: &str) -> Vec<TaskList> {
    let Some(value) = parse_document(TASK_LISTS_KEY, raw) else {
        return Vec::new();
    };
    let Value::Array(entries) = value else {
        warn!(key = TASK_LISTS_KEY, "Stored document is not an array, ignoring it");
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut lists = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let list: TaskList = match serde_json::from_value(entry) {
            Ok(l) => l,
            Err(e) => {
                warn!(key = TASK_LISTS_KEY, index, error = ?e, "Failed to parse task list, skipping");
                continue;
            }
        };

        if list.id.trim().is_empty() {
            warn!(key = TASK_LISTS_KEY, index, "Task list without an id, skipping");
            continue;
        }
        if !seen.insert(list.id.clone()) {
            warn!(key = TASK_LISTS_KEY, index, id = %list.id, "Duplicate task list id, skipping");
            continue;
        }

        lists.push(list);
    }

    lists
}

fn decode_tasks(raw: &str) -> TasksByList {
    let Some(value) = parse_document(TASKS_KEY, raw) else {
        return TasksByList::new();
    };
    let Value::Object(groups) = value else {
        warn!(key = TASKS_KEY, "Stored document is not an object, ignoring it");
        return TasksByList::new();
    };

    let mut tasks = TasksByList::new();

    for (list_id, group) in groups {
        let Value::Array(entries) = group else {
            warn!(key = TASKS_KEY, list_id = %list_id, "Task group is not an array, skipping");
            continue;
        };

        let mut seen = HashSet::new();
        let mut list_tasks = Vec::with_capacity(entries.len());

        for (index, entry) in entries.into_iter().enumerate() {
            let mut task: Task = match serde_json::from_value(entry) {
                Ok(t) => t,
                Err(e) => {
                    warn!(key = TASKS_KEY, list_id = %list_id, index, error = ?e, "Failed to parse task, skipping");
                    continue;
                }
            };

            if !seen.insert(task.id.clone()) {
                warn!(key = TASKS_KEY, list_id = %list_id, id = %task.id, "Duplicate task id, skipping");
                continue;
            }

            // The group key is authoritative for ownership
            if task.list_id != list_id {
                debug!(id = %task.id, stored = %task.list_id, list_id = %list_id, "Reassigning task to its group");
                task.list_id = list_id.clone();
            }

            list_tasks.push(task);
        }

        tasks.insert(list_id, list_tasks);
    }

    tasks
}

fn reconcile(mut task_lists: Vec<TaskList>, mut tasks: TasksByList) -> Snapshot {
    let known: HashSet<&str> = task_lists.iter().map(|l| l.id.as_str()).collect();
    tasks.retain(|list_id, group| {
        let keep = known.contains(list_id.as_str());
        if !keep {
            warn!(list_id = %list_id, count = group.len(), "Dropping tasks of unknown list");
        }
        keep
    });

    for list in &mut task_lists {
        if !is_hex_color(&list.color) {
            warn!(id = %list.id, color = %list.color, "Missing or malformed list color, using default");
            list.color = DEFAULT_PALETTE[0].to_string();
        }

        let group = tasks.entry(list.id.clone()).or_default();
        let (total, completed) = (list.total_tasks, list.completed_tasks);
        list.recount(group);
        if (total, completed) != (list.total_tasks, list.completed_tasks) {
            debug!(id = %list.id, total, completed, "Corrected stale list counters");
        }
    }

    Snapshot { task_lists, tasks }
}
