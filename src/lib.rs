// Taskly - Task lists with progress tracking, persisted as JSON documents

pub mod config;
pub mod models;
pub mod snapshot;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use config::Config;
pub use models::{Category, DEFAULT_PALETTE, NewTask, Progress, Task, TaskList};
pub use snapshot::{Snapshot, TASK_LISTS_KEY, TASKS_KEY};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::TaskStore;
