// Task store: in-memory collections mirrored to key-value storage

use crate::models::{DEFAULT_PALETTE, NewTask, Progress, Task, TaskList};
use crate::snapshot::{self, TasksByList};
use crate::storage::{FileStorage, KeyValueStorage};
use eyre::{Context, Result};
use rand::seq::SliceRandom;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Owns the task lists and their tasks, and persists both after every mutation
///
/// Every mutator returns `Err` when the storage write fails. The in-memory
/// change is kept in that case, so memory runs ahead of storage until the
/// next successful write.
pub struct TaskStore<S: KeyValueStorage> {
    storage: S,
    palette: Vec<String>,
    task_lists: Vec<TaskList>,
    tasks: TasksByList,
}

impl TaskStore<FileStorage> {
    /// Open a file-backed store in the `.taskly` subdirectory of `path`
    pub fn open_dir<P: AsRef<Path>>(path: P) -> Result<Self> {
        let storage = FileStorage::open(path)?;
        Self::open(storage)
    }
}

impl<S: KeyValueStorage> TaskStore<S> {
    /// Load the persisted state once and take ownership of the storage
    pub fn open(storage: S) -> Result<Self> {
        let snapshot = snapshot::load(&storage).context("Failed to load task store")?;

        info!(lists = snapshot.task_lists.len(), "Task store opened");

        Ok(Self {
            storage,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            task_lists: snapshot.task_lists,
            tasks: snapshot.tasks,
        })
    }

    /// Replace the colors used for new lists; an empty palette is ignored
    pub fn with_palette(mut self, palette: Vec<String>) -> Self {
        if palette.is_empty() {
            warn!("Empty palette, keeping the default colors");
        } else {
            self.palette = palette;
        }
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// All lists in creation order
    pub fn task_lists(&self) -> &[TaskList] {
        &self.task_lists
    }

    pub fn task_list(&self, id: &str) -> Option<&TaskList> {
        self.task_lists.iter().find(|l| l.id == id)
    }

    /// Tasks of one list in creation order; empty for unknown lists
    pub fn tasks(&self, list_id: &str) -> &[Task] {
        self.tasks.get(list_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn task(&self, list_id: &str, task_id: &str) -> Option<&Task> {
        self.tasks(list_id).iter().find(|t| t.id == task_id)
    }

    /// Completion across every list
    pub fn overall_progress(&self) -> Progress {
        Progress::from_tasks(self.tasks.values().flatten())
    }

    /// Completion of one list, derived from its tasks rather than its counters
    pub fn list_progress(&self, list_id: &str) -> Progress {
        Progress::from_tasks(self.tasks(list_id))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a list with a random palette color
    ///
    /// Returns `Ok(None)` without touching storage when the title is blank.
    pub fn add_task_list(&mut self, title: &str) -> Result<Option<TaskList>> {
        let title = title.trim();
        if title.is_empty() {
            debug!("add_task_list: blank title, ignoring");
            return Ok(None);
        }

        let list = TaskList {
            id: Self::next_id(),
            title: title.to_string(),
            total_tasks: 0,
            completed_tasks: 0,
            color: self.pick_color(),
        };
        debug!(id = %list.id, title, color = %list.color, "add_task_list");

        self.task_lists.push(list.clone());
        self.tasks.insert(list.id.clone(), Vec::new());
        self.persist()?;

        Ok(Some(list))
    }

    /// Remove a list and all of its tasks
    ///
    /// Returns `Ok(false)` without touching storage when the list is unknown.
    pub fn delete_task_list(&mut self, id: &str) -> Result<bool> {
        let before = self.task_lists.len();
        self.task_lists.retain(|l| l.id != id);
        let removed_tasks = self.tasks.remove(id);

        if self.task_lists.len() == before && removed_tasks.is_none() {
            debug!(id, "delete_task_list: unknown list");
            return Ok(false);
        }

        debug!(
            id,
            tasks = removed_tasks.map(|t| t.len()).unwrap_or(0),
            "delete_task_list"
        );
        self.persist()?;

        Ok(true)
    }

    /// Append a task to a list
    ///
    /// Returns `Ok(None)` without touching storage when the list is unknown or
    /// the title is blank.
    pub fn add_task(&mut self, list_id: &str, new_task: NewTask) -> Result<Option<Task>> {
        let title = new_task.title.trim();
        if title.is_empty() {
            debug!(list_id, "add_task: blank title, ignoring");
            return Ok(None);
        }
        if self.task_list(list_id).is_none() {
            debug!(list_id, "add_task: unknown list");
            return Ok(None);
        }

        let task = Task {
            id: Self::next_id(),
            title: title.to_string(),
            completed: false,
            category: new_task.category,
            list_id: list_id.to_string(),
        };
        debug!(list_id, id = %task.id, category = task.category.id(), "add_task");

        self.tasks.entry(list_id.to_string()).or_default().push(task.clone());
        self.recount(list_id);
        self.persist()?;

        Ok(Some(task))
    }

    /// Flip one task's completed flag
    ///
    /// Returns the new flag, or `Ok(None)` without touching storage when the
    /// list or task is unknown.
    pub fn toggle_task(&mut self, list_id: &str, task_id: &str) -> Result<Option<bool>> {
        let Some(task) = self
            .tasks
            .get_mut(list_id)
            .and_then(|tasks| tasks.iter_mut().find(|t| t.id == task_id))
        else {
            debug!(list_id, task_id, "toggle_task: unknown task");
            return Ok(None);
        };

        task.completed = !task.completed;
        let completed = task.completed;
        debug!(list_id, task_id, completed, "toggle_task");

        self.recount(list_id);
        self.persist()?;

        Ok(Some(completed))
    }

    /// Remove one task
    ///
    /// Returns `Ok(false)` without touching storage when the list or task is
    /// unknown.
    pub fn delete_task(&mut self, list_id: &str, task_id: &str) -> Result<bool> {
        let Some(tasks) = self.tasks.get_mut(list_id) else {
            debug!(list_id, task_id, "delete_task: unknown list");
            return Ok(false);
        };

        let before = tasks.len();
        tasks.retain(|t| t.id != task_id);
        if tasks.len() == before {
            debug!(list_id, task_id, "delete_task: unknown task");
            return Ok(false);
        }

        debug!(list_id, task_id, "delete_task");
        self.recount(list_id);
        self.persist()?;

        Ok(true)
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    /// Time-ordered unique id (UUIDv7 embeds the creation millisecond)
    fn next_id() -> String {
        Uuid::now_v7().to_string()
    }

    fn pick_color(&self) -> String {
        self.palette
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_PALETTE[0].to_string())
    }

    fn recount(&mut self, list_id: &str) {
        let tasks = self.tasks.get(list_id).map(Vec::as_slice).unwrap_or(&[]);
        if let Some(list) = self.task_lists.iter_mut().find(|l| l.id == list_id) {
            list.recount(tasks);
        }
    }

    fn persist(&mut self) -> Result<()> {
        snapshot::save(&mut self.storage, &self.task_lists, &self.tasks).wrap_err("Failed to persist task store")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::storage::MemoryStorage;
    use tempfile::TempDir;

    fn memory_store() -> TaskStore<MemoryStorage> {
        TaskStore::open(MemoryStorage::new()).unwrap()
    }

    fn add(store: &mut TaskStore<MemoryStorage>, list_id: &str, title: &str) -> Task {
        store
            .add_task(list_id, NewTask::new(title, Category::Shopping))
            .unwrap()
            .unwrap()
    }

    /// Counters on every list match a live count of its tasks
    fn assert_counters_consistent<S: KeyValueStorage>(store: &TaskStore<S>) {
        for list in store.task_lists() {
            let tasks = store.tasks(&list.id);
            assert_eq!(list.total_tasks, tasks.len(), "total for {}", list.id);
            assert_eq!(
                list.completed_tasks,
                tasks.iter().filter(|t| t.completed).count(),
                "completed for {}",
                list.id
            );
            assert!(list.completed_tasks <= list.total_tasks);
        }
    }

    #[test]
    fn test_add_task_list() {
        let mut store = memory_store();

        let list = store.add_task_list("Groceries").unwrap().unwrap();
        assert_eq!(store.task_lists().len(), 1);
        assert_eq!(list.title, "Groceries");
        assert_eq!(list.total_tasks, 0);
        assert_eq!(list.completed_tasks, 0);
        assert!(DEFAULT_PALETTE.contains(&list.color.as_str()));
        assert!(store.tasks.contains_key(&list.id));
        assert!(store.tasks(&list.id).is_empty());

        // Persisted right away
        assert!(store.storage().items().contains_key(snapshot::TASK_LISTS_KEY));
        assert!(store.storage().items().contains_key(snapshot::TASKS_KEY));
    }

    #[test]
    fn test_add_task_list_grows_by_one_each_time() {
        let mut store = memory_store();
        for (i, title) in ["A", "B", "C", "D"].iter().enumerate() {
            let list = store.add_task_list(title).unwrap().unwrap();
            assert_eq!(store.task_lists().len(), i + 1);
            assert_eq!(store.tasks.len(), i + 1);
            assert_eq!(store.task_list(&list.id), Some(&list));
        }

        // Ids are unique even when created within the same millisecond
        let mut ids: Vec<&str> = store.task_lists().iter().map(|l| l.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_add_task_list_blank_title_is_noop() {
        let mut store = memory_store();

        assert_eq!(store.add_task_list("").unwrap(), None);
        assert_eq!(store.add_task_list("   ").unwrap(), None);
        assert!(store.task_lists().is_empty());
        assert!(store.storage().items().is_empty());
    }

    #[test]
    fn test_add_task_list_trims_title() {
        let mut store = memory_store();
        let list = store.add_task_list("  Errands \n").unwrap().unwrap();
        assert_eq!(list.title, "Errands");
    }

    #[test]
    fn test_custom_palette() {
        let mut store = memory_store().with_palette(vec!["#123456".to_string()]);
        let list = store.add_task_list("Colored").unwrap().unwrap();
        assert_eq!(list.color, "#123456");

        let mut store = memory_store().with_palette(Vec::new());
        let list = store.add_task_list("Default").unwrap().unwrap();
        assert!(DEFAULT_PALETTE.contains(&list.color.as_str()));
    }

    #[test]
    fn test_groceries_scenario() {
        let mut store = memory_store();
        let list = store.add_task_list("Groceries").unwrap().unwrap();
        let milk = add(&mut store, &list.id, "Milk");
        let eggs = add(&mut store, &list.id, "Eggs");

        assert_eq!(store.toggle_task(&list.id, &milk.id).unwrap(), Some(true));
        let progress = store.list_progress(&list.id);
        assert_eq!(progress, Progress::new(2, 1));
        assert_eq!(progress.percentage, 50.0);
        assert_counters_consistent(&store);

        assert!(store.delete_task(&list.id, &eggs.id).unwrap());
        let progress = store.list_progress(&list.id);
        assert_eq!((progress.total_tasks, progress.completed_tasks), (1, 1));
        assert_eq!(progress.percentage, 100.0);
        assert!(progress.is_complete());
        assert_eq!(store.task_list(&list.id).unwrap().progress(), progress);
        assert_counters_consistent(&store);
    }

    #[test]
    fn test_add_task() {
        let mut store = memory_store();
        let list = store.add_task_list("Home").unwrap().unwrap();

        let task = store
            .add_task(&list.id, NewTask::new("  Fix sink ", Category::Home))
            .unwrap()
            .unwrap();
        assert_eq!(task.title, "Fix sink");
        assert!(!task.completed);
        assert_eq!(task.category, Category::Home);
        assert_eq!(task.list_id, list.id);
        assert_eq!(store.task(&list.id, &task.id), Some(&task));
        assert_eq!(store.task_list(&list.id).unwrap().total_tasks, 1);
    }

    #[test]
    fn test_add_task_noops() {
        let mut store = memory_store();
        let list = store.add_task_list("Home").unwrap().unwrap();
        let writes_before = store.storage().items().clone();

        assert_eq!(store.add_task(&list.id, NewTask::new("  ", Category::Home)).unwrap(), None);
        assert_eq!(store.add_task("missing", NewTask::new("Orphan", Category::Home)).unwrap(), None);

        assert!(store.tasks(&list.id).is_empty());
        assert!(!store.tasks.contains_key("missing"));
        assert_eq!(store.storage().items(), &writes_before);
    }

    #[test]
    fn test_toggle_task_twice_restores() {
        let mut store = memory_store();
        let list = store.add_task_list("Work").unwrap().unwrap();
        let task = add(&mut store, &list.id, "Report");

        assert_eq!(store.toggle_task(&list.id, &task.id).unwrap(), Some(true));
        assert_eq!(store.task_list(&list.id).unwrap().completed_tasks, 1);
        assert_eq!(store.toggle_task(&list.id, &task.id).unwrap(), Some(false));
        assert_eq!(store.task_list(&list.id).unwrap().completed_tasks, 0);
        assert_counters_consistent(&store);
    }

    #[test]
    fn test_toggle_only_touches_one_task() {
        let mut store = memory_store();
        let list = store.add_task_list("Work").unwrap().unwrap();
        let a = add(&mut store, &list.id, "A");
        let b = add(&mut store, &list.id, "B");

        store.toggle_task(&list.id, &a.id).unwrap();
        assert!(store.task(&list.id, &a.id).unwrap().completed);
        assert!(!store.task(&list.id, &b.id).unwrap().completed);
    }

    #[test]
    fn test_toggle_and_delete_unknown_are_noops() {
        let mut store = memory_store();
        let list = store.add_task_list("Work").unwrap().unwrap();
        add(&mut store, &list.id, "A");

        assert_eq!(store.toggle_task(&list.id, "missing").unwrap(), None);
        assert_eq!(store.toggle_task("missing", "missing").unwrap(), None);
        assert!(!store.delete_task(&list.id, "missing").unwrap());
        assert!(!store.delete_task("missing", "missing").unwrap());
        assert!(!store.delete_task_list("missing").unwrap());

        assert_eq!(store.tasks(&list.id).len(), 1);
        assert_counters_consistent(&store);
    }

    #[test]
    fn test_delete_task_list_cascades() {
        let mut store = memory_store();
        let keep = store.add_task_list("Keep").unwrap().unwrap();
        let doomed = store.add_task_list("Drop").unwrap().unwrap();
        let kept = add(&mut store, &keep.id, "Stay");
        store.toggle_task(&keep.id, &kept.id).unwrap();
        let gone = add(&mut store, &doomed.id, "Go");
        add(&mut store, &doomed.id, "Go too");

        assert_eq!(store.overall_progress(), Progress::new(3, 1));

        assert!(store.delete_task_list(&doomed.id).unwrap());
        assert!(store.task_list(&doomed.id).is_none());
        assert!(!store.tasks.contains_key(&doomed.id));
        assert!(store.task(&doomed.id, &gone.id).is_none());
        assert_eq!(store.overall_progress(), Progress::new(1, 1));
        assert_eq!(store.overall_progress().percentage, 100.0);
    }

    #[test]
    fn test_progress_on_empty_store() {
        let store = memory_store();
        assert_eq!(store.overall_progress(), Progress::new(0, 0));
        assert_eq!(store.overall_progress().percentage, 0.0);
        assert_eq!(store.list_progress("missing"), Progress::new(0, 0));
    }

    #[test]
    fn test_counters_consistent_through_mixed_operations() {
        let mut store = memory_store();
        let a = store.add_task_list("A").unwrap().unwrap();
        let b = store.add_task_list("B").unwrap().unwrap();

        let mut created = Vec::new();
        for i in 0..6 {
            let list_id = if i % 2 == 0 { &a.id } else { &b.id };
            created.push(add(&mut store, list_id, &format!("Task {}", i)));
            assert_counters_consistent(&store);
        }
        for task in created.iter().step_by(2) {
            store.toggle_task(&task.list_id, &task.id).unwrap();
            assert_counters_consistent(&store);
        }
        for task in created.iter().take(3) {
            store.delete_task(&task.list_id, &task.id).unwrap();
            assert_counters_consistent(&store);
        }
        store.delete_task_list(&b.id).unwrap();
        assert_counters_consistent(&store);
    }

    #[test]
    fn test_every_mutation_surfaces_write_failure() {
        let mut store = memory_store();
        let list = store.add_task_list("Fragile").unwrap().unwrap();
        let first = add(&mut store, &list.id, "First");
        let second = add(&mut store, &list.id, "Second");

        store.storage_mut().set_fail_writes(true);

        assert!(store.add_task_list("Another").is_err());
        assert!(store.add_task(&list.id, NewTask::new("Third", Category::Work)).is_err());
        assert!(store.toggle_task(&list.id, &first.id).is_err());
        assert!(store.delete_task(&list.id, &second.id).is_err());
        assert!(store.delete_task_list(&list.id).is_err());

        // Memory keeps the changes; counters stay consistent regardless
        assert_eq!(store.task_lists().len(), 1);
        assert_counters_consistent(&store);

        // Next successful write catches storage up
        store.storage_mut().set_fail_writes(false);
        store.add_task_list("Recovered").unwrap().unwrap();
        let reloaded = TaskStore::open(store.storage().clone()).unwrap();
        assert_eq!(reloaded.task_lists(), store.task_lists());
    }

    #[test]
    fn test_reload_round_trip_memory() {
        let mut store = memory_store();
        let list = store.add_task_list("Groceries").unwrap().unwrap();
        let milk = add(&mut store, &list.id, "Milk");
        add(&mut store, &list.id, "Eggs");
        store.toggle_task(&list.id, &milk.id).unwrap();
        store.add_task_list("Empty").unwrap().unwrap();

        let reloaded = TaskStore::open(store.storage().clone()).unwrap();
        assert_eq!(reloaded.task_lists(), store.task_lists());
        assert_eq!(reloaded.tasks, store.tasks);
        assert_eq!(reloaded.overall_progress(), store.overall_progress());
    }

    #[test]
    fn test_reload_round_trip_file() {
        let temp = TempDir::new().unwrap();

        let (lists, tasks) = {
            let mut store = TaskStore::open_dir(temp.path()).unwrap();
            let list = store.add_task_list("Groceries").unwrap().unwrap();
            let milk = store
                .add_task(&list.id, NewTask::new("Milk", Category::Shopping))
                .unwrap()
                .unwrap();
            store
                .add_task(&list.id, NewTask::new("Run", Category::Health))
                .unwrap()
                .unwrap();
            store.toggle_task(&list.id, &milk.id).unwrap();
            (store.task_lists().to_vec(), store.tasks.clone())
        };

        assert!(temp.path().join(".taskly/taskLists.json").exists());
        assert!(temp.path().join(".taskly/tasks.json").exists());

        let store = TaskStore::open_dir(temp.path()).unwrap();
        assert_eq!(store.task_lists(), lists.as_slice());
        assert_eq!(store.tasks, tasks);
    }
}
