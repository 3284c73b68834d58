// Data models for Taskly

use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Colors handed out to new task lists unless configuration overrides them
pub const DEFAULT_PALETTE: [&str; 5] = ["#4158D0", "#C850C0", "#FF6B6B", "#4CAF50", "#FF9800"];

/// `#RRGGBB`
pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7 && color.starts_with('#') && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// A named, colored grouping of tasks
///
/// `total_tasks` and `completed_tasks` are caches of the list's task array.
/// The store recomputes them on every mutation and on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub total_tasks: usize,
    #[serde(default)]
    pub completed_tasks: usize,
    #[serde(default)]
    pub color: String,
}

impl TaskList {
    /// Recompute the cached counters from the list's tasks
    pub(crate) fn recount(&mut self, tasks: &[Task]) {
        self.total_tasks = tasks.len();
        self.completed_tasks = tasks.iter().filter(|t| t.completed).count();
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.total_tasks, self.completed_tasks)
    }
}

/// A single completable unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    pub category: Category,
    #[serde(default)]
    pub list_id: String,
}

/// Input for `TaskStore::add_task`; the store assigns id and owning list
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub category: Category,
}

impl NewTask {
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            category,
        }
    }
}

/// Fixed task classification
///
/// Stored by value inside each task as `{id, name, icon, color}`. Only the
/// id is read back; the other fields always come from this table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "CategoryRecord", try_from = "CategoryRecord")]
pub enum Category {
    #[default]
    Personal,
    Work,
    Shopping,
    Home,
    Health,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Personal,
        Category::Work,
        Category::Shopping,
        Category::Home,
        Category::Health,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::Work => "work",
            Category::Shopping => "shopping",
            Category::Home => "home",
            Category::Health => "health",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Personal => "Personal",
            Category::Work => "Work",
            Category::Shopping => "Shopping",
            Category::Home => "Home",
            Category::Health => "Health",
        }
    }

    /// Icon token understood by the front end
    pub fn icon(self) -> &'static str {
        match self {
            Category::Personal => "person-outline",
            Category::Work => "briefcase-outline",
            Category::Shopping => "cart-outline",
            Category::Home => "home-outline",
            Category::Health => "fitness-outline",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Category::Personal => "#4158D0",
            Category::Work => "#C850C0",
            Category::Shopping => "#FF6B6B",
            Category::Home => "#4CAF50",
            Category::Health => "#FF9800",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Category {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| eyre!("Unknown category: {} (expected one of personal, work, shopping, home, health)", s))
    }
}

/// On-disk shape of a category
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoryRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    color: String,
}

impl From<Category> for CategoryRecord {
    fn from(category: Category) -> Self {
        Self {
            id: category.id().to_string(),
            name: category.name().to_string(),
            icon: category.icon().to_string(),
            color: category.color().to_string(),
        }
    }
}

impl TryFrom<CategoryRecord> for Category {
    type Error = eyre::Report;

    fn try_from(record: CategoryRecord) -> Result<Self> {
        record.id.parse()
    }
}

/// Completion statistics, computed on demand
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// 0.0 to 100.0; 0.0 when there are no tasks
    pub percentage: f64,
}

impl Progress {
    pub fn new(total_tasks: usize, completed_tasks: usize) -> Self {
        let percentage = if total_tasks > 0 {
            completed_tasks as f64 / total_tasks as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_tasks,
            completed_tasks,
            percentage,
        }
    }

    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let (total, completed) = tasks
            .into_iter()
            .fold((0, 0), |(total, completed), task| (total + 1, completed + usize::from(task.completed)));
        Self::new(total, completed)
    }

    /// True when there is at least one task and all of them are done
    pub fn is_complete(&self) -> bool {
        self.total_tasks > 0 && self.completed_tasks == self.total_tasks
    }
}
