use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use eyre::{Result, eyre};
use std::path::PathBuf;
use taskly::config::{self, Config};
use taskly::models::is_hex_color;
use taskly::{Category, FileStorage, NewTask, Progress, TaskStore};

#[derive(Parser)]
#[command(name = "taskly")]
#[command(about = "Taskly - task lists with per-list progress")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Directory holding the .taskly storage (default: from config, then the platform data dir)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Config file (default: <config dir>/taskly/config.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show all task lists
    Lists,

    /// Create a task list
    AddList {
        /// List title
        title: String,
    },

    /// Delete a task list and all of its tasks
    DeleteList {
        list_id: String,
    },

    /// Show the tasks of one list
    Tasks {
        list_id: String,
    },

    /// Add a task to a list
    AddTask {
        list_id: String,

        /// Task title
        title: String,

        /// personal, work, shopping, home or health
        #[arg(long, default_value = "personal")]
        category: String,
    },

    /// Mark a task done, or not done again
    Toggle {
        list_id: String,
        task_id: String,
    },

    /// Delete one task
    DeleteTask {
        list_id: String,
        task_id: String,
    },

    /// Show overall progress, or one list's progress
    Progress {
        list_id: Option<String>,
    },

    /// Show the task categories
    Categories,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let level = match &cli.log_level {
        Some(level) => config::parse_level(level)?,
        None => config.log_level()?,
    };

    // Setup tracing; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let store_path = cli.store_path.clone().unwrap_or_else(|| config.data_dir());
    let storage = FileStorage::open(&store_path)?;
    let mut store = TaskStore::open(storage)?.with_palette(config.palette());

    match cli.command {
        Commands::Lists => {
            if store.task_lists().is_empty() {
                println!("No task lists yet");
            }
            for list in store.task_lists() {
                println!(
                    "{} {}  {}  {}",
                    swatch(&list.color),
                    list.title.bold(),
                    format_progress(&list.progress()),
                    list.id.dimmed()
                );
            }
        }
        Commands::AddList { title } => match store.add_task_list(&title)? {
            Some(list) => println!("Created list {} {}", swatch(&list.color), list.id),
            None => println!("List title cannot be empty"),
        },
        Commands::DeleteList { list_id } => {
            let title = store.task_list(&list_id).map(|l| l.title.clone());
            if store.delete_task_list(&list_id)? {
                println!("Deleted list \"{}\" and all its tasks", title.unwrap_or_default());
            } else {
                return Err(eyre!("No task list with id {}", list_id));
            }
        }
        Commands::Tasks { list_id } => {
            let list = store
                .task_list(&list_id)
                .ok_or_else(|| eyre!("No task list with id {}", list_id))?;
            println!("{} {}  {}", swatch(&list.color), list.title.bold(), format_progress(&list.progress()));
            for task in store.tasks(&list_id) {
                let checkbox = if task.completed { "[x]".green() } else { "[ ]".normal() };
                let title = if task.completed { task.title.strikethrough() } else { task.title.normal() };
                println!(
                    "  {} {}  {}  {}",
                    checkbox,
                    title,
                    paint(task.category.name(), task.category.color()),
                    task.id.dimmed()
                );
            }
        }
        Commands::AddTask {
            list_id,
            title,
            category,
        } => {
            let category: Category = category.parse()?;
            if store.task_list(&list_id).is_none() {
                return Err(eyre!("No task list with id {}", list_id));
            }
            match store.add_task(&list_id, NewTask::new(title, category))? {
                Some(task) => println!("Added task {}", task.id),
                None => println!("Task title cannot be empty"),
            }
        }
        Commands::Toggle { list_id, task_id } => match store.toggle_task(&list_id, &task_id)? {
            Some(true) => {
                println!("{} done", "✓".green());
                if store.list_progress(&list_id).is_complete() {
                    println!("{}", "All tasks in this list are complete!".green().bold());
                }
            }
            Some(false) => println!("Marked not done"),
            None => return Err(eyre!("No task {} in list {}", task_id, list_id)),
        },
        Commands::DeleteTask { list_id, task_id } => {
            if store.delete_task(&list_id, &task_id)? {
                println!("Deleted task {}", task_id);
            } else {
                return Err(eyre!("No task {} in list {}", task_id, list_id));
            }
        }
        Commands::Progress { list_id } => {
            let progress = match &list_id {
                Some(id) => {
                    if store.task_list(id).is_none() {
                        return Err(eyre!("No task list with id {}", id));
                    }
                    store.list_progress(id)
                }
                None => store.overall_progress(),
            };
            println!("{}", format_progress(&progress));
            if progress.is_complete() {
                println!("{}", "All tasks completed!".green().bold());
            }
        }
        Commands::Categories => {
            for category in Category::ALL {
                println!(
                    "{:<10} {}  {}",
                    category.id(),
                    paint(category.name(), category.color()),
                    category.icon().dimmed()
                );
            }
        }
    }

    Ok(())
}

fn format_progress(progress: &Progress) -> String {
    format!(
        "{} of {} tasks completed ({:.0}%)",
        progress.completed_tasks, progress.total_tasks, progress.percentage
    )
}

/// A colored dot for a list color
fn swatch(color: &str) -> ColoredString {
    paint("●", color)
}

fn paint(text: &str, color: &str) -> ColoredString {
    match parse_hex(color) {
        Some((r, g, b)) => text.truecolor(r, g, b),
        None => text.normal(),
    }
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    if !is_hex_color(color) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&color[range], 16).ok();
    Some((channel(1..3)?, channel(3..5)?, channel(5..7)?))
}
