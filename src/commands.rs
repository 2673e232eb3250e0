//! Command handlers behind the `taskflow` binary.

use crate::analytics::{self, ActivityKind};
use crate::category_manager::CategoryManager;
use crate::cli::{
    self, AnalyticsCommands, BulkCommands, CategoryCommands, Cli, Commands, ConfigCommands, SortArg, StatusArg,
};
use crate::config::{ConfigError, ConfigManager};
use crate::interchange::{self, ImportError};
use crate::models::{CategoryError, StorageData, StorageError, Task, TaskDraft, TaskError, TaskId, TaskUpdate};
use crate::query::{CategoryFilter, DateRange, FilterOptions, PriorityFilter, SortOptions, TaskStats};
use crate::reminders::{Notifier, Reminder, ReminderRegistry};
use crate::storage::Storage;
use crate::task_manager::TaskManager;
use crate::timestamp;
use chrono::{DateTime, Local, Utc};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error("Import failed: {0}")]
    Import(#[from] ImportError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid date '{0}'. Use YYYY-MM-DD, \"YYYY-MM-DD HH:MM\" or RFC 3339.")]
    InvalidDate(String),
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Task id '{0}' is ambiguous; give more characters")]
    AmbiguousId(String),
}

/// Prints reminders to stdout as they fire.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, reminder: &Reminder) {
        log::info!("Delivering reminder for task {}", reminder.task_id);
        println!(
            "Reminder: {} (task {}, set for {})",
            reminder.title,
            short_id(&reminder.task_id),
            local_time(&reminder.fire_at)
        );
    }
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ConfigManager::new(cli.config.as_deref())?;

    // Config commands must work even when the storage settings are broken.
    let command = match cli.command {
        Commands::Config { command } => return run_config(&mut config, command),
        command => command,
    };

    let opened = config.create_storage()?;
    let storage = &*opened;

    match command {
        Commands::Add {
            title,
            description,
            priority,
            due,
            category,
            tags,
            progress,
            remind,
            estimate,
        } => {
            let mut draft = TaskDraft::new(title);
            draft.description = description;
            draft.priority = priority.unwrap_or_else(|| config.default_priority());
            draft.due_date = due.as_deref().map(parse_date).transpose()?;
            draft.category = Some(category.unwrap_or_else(|| config.default_category()));
            draft.tags = tags;
            draft.progress = progress;
            draft.reminder_date = remind.as_deref().map(parse_date).transpose()?;
            draft.reminder = draft.reminder_date.is_some();
            draft.estimated_time = estimate;

            let task = TaskManager::new(storage).add_task(draft)?;
            println!("Task added (id = {})", short_id(&task.id));
        }
        Commands::List {
            status,
            category,
            priority,
            from,
            to,
            search,
            sort,
            desc,
            json,
        } => cmd_list(storage, status, category, priority, from, to, &search, sort, desc, json)?,
        Commands::Show { id } => {
            let id = resolve_id(storage, &id)?;
            let manager = TaskManager::new(storage);
            let task = manager.get_task(&id)?.ok_or_else(|| CliError::TaskNotFound(id.clone()))?;
            print_task_details(&task);
        }
        Commands::Update {
            id,
            title,
            description,
            priority,
            due,
            clear_due,
            category,
            progress,
            tags,
            remind,
            no_remind,
            estimate,
            actual,
        } => {
            let id = resolve_id(storage, &id)?;
            let mut update = TaskUpdate {
                title,
                description,
                priority,
                category,
                progress,
                tags,
                estimated_time: estimate.map(Some),
                actual_time: actual.map(Some),
                ..Default::default()
            };
            if clear_due {
                update.due_date = Some(None);
            } else if let Some(due) = due {
                update.due_date = Some(Some(parse_date(&due)?));
            }
            if no_remind {
                update.reminder = Some(false);
                update.reminder_date = Some(None);
            } else if let Some(remind) = remind {
                update.reminder = Some(true);
                update.reminder_date = Some(Some(parse_date(&remind)?));
            }

            TaskManager::new(storage)
                .update_task(&id, update)?
                .ok_or_else(|| CliError::TaskNotFound(id.clone()))?;
            println!("Task {} updated.", short_id(&id));
        }
        Commands::Done { id } => {
            let id = resolve_id(storage, &id)?;
            let task = TaskManager::new(storage)
                .toggle_task(&id)?
                .ok_or_else(|| CliError::TaskNotFound(id.clone()))?;
            if task.completed {
                println!("Task {} marked as completed.", short_id(&id));
            } else {
                println!("Task {} reopened.", short_id(&id));
            }
        }
        Commands::Delete { id } => {
            let id = resolve_id(storage, &id)?;
            let task = TaskManager::new(storage)
                .delete_task(&id)?
                .ok_or_else(|| CliError::TaskNotFound(id.clone()))?;
            println!("Task {} deleted ({}).", short_id(&id), task.title);
        }
        Commands::Duplicate { id } => {
            let id = resolve_id(storage, &id)?;
            let copy = TaskManager::new(storage)
                .duplicate_task(&id)?
                .ok_or_else(|| CliError::TaskNotFound(id.clone()))?;
            println!("Task duplicated (id = {})", short_id(&copy.id));
        }
        Commands::Bulk { command } => cmd_bulk(storage, command)?,
        Commands::Stats { json } => {
            let result = TaskManager::new(storage).query(
                &FilterOptions::default(),
                &SortOptions::default(),
                "",
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result.stats)?);
            } else {
                print_stats(&result.stats);
            }
        }
        Commands::Analytics { command } => cmd_analytics(storage, command)?,
        Commands::Category { command } => cmd_category(storage, command)?,
        Commands::Export { output, stdout } => {
            let data = storage.load()?;
            let document = interchange::export_document(&data, timestamp::now());
            let json = interchange::to_json(&document)?;
            if stdout {
                println!("{}", json);
            } else {
                let path = output.unwrap_or_else(|| PathBuf::from(interchange::backup_file_name(Utc::now())));
                write_file(&path, &json)?;
                println!(
                    "Exported {} tasks and {} categories to {}",
                    document.tasks.len(),
                    document.categories.len(),
                    path.display()
                );
            }
        }
        Commands::Import { file } => {
            let text = std::fs::read_to_string(&file)?;
            let document = interchange::import_document(&text)?;
            let (tasks, categories) = (document.tasks.len(), document.categories.len());
            TaskManager::new(storage).import(document)?;
            println!("Imported {} tasks and {} categories", tasks, categories);
        }
        Commands::Remind { watch } => cmd_remind(storage, &config, watch)?,
        Commands::Reset { yes } => cmd_reset(storage, yes)?,
        Commands::Config { command } => run_config(&mut config, command)?,
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_list(
    storage: &dyn Storage,
    status: StatusArg,
    category: String,
    priority: String,
    from: Option<String>,
    to: Option<String>,
    search: &str,
    sort: SortArg,
    desc: bool,
    json: bool,
) -> Result<(), CliError> {
    let filter = FilterOptions {
        status: status.into(),
        category: CategoryFilter::from(category),
        priority: PriorityFilter::from(priority),
        date_range: DateRange {
            start: from.as_deref().map(parse_date).transpose()?,
            end: to.as_deref().map(parse_date).transpose()?,
        },
    };
    let sort = SortOptions {
        field: sort.into(),
        direction: cli::sort_direction(desc),
    };

    let manager = TaskManager::new(storage);
    let result = manager.query(&filter, &sort, search)?;

    if json {
        let body = serde_json::json!({ "tasks": result.view, "stats": result.stats });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if result.view.is_empty() {
        println!("No tasks found.");
    }
    for task in &result.view {
        print_task_line(task);
    }
    println!();
    println!("{} of {} tasks shown", result.view.len(), result.stats.total);
    Ok(())
}

fn cmd_bulk(storage: &dyn Storage, command: BulkCommands) -> Result<(), CliError> {
    let mut manager = TaskManager::new(storage);
    let (verb, count) = match command {
        BulkCommands::Delete { ids } => ("Deleted", manager.bulk_delete(&resolve_ids(storage, &ids)?)?),
        BulkCommands::Toggle { ids } => ("Toggled", manager.bulk_toggle(&resolve_ids(storage, &ids)?)?),
        BulkCommands::Priority { priority, ids } => (
            "Updated",
            manager.bulk_update_priority(&resolve_ids(storage, &ids)?, priority)?,
        ),
        BulkCommands::Category { category, ids } => (
            "Updated",
            manager.bulk_update_category(&resolve_ids(storage, &ids)?, &category)?,
        ),
    };
    println!("{} {} tasks.", verb, count);
    Ok(())
}

fn cmd_analytics(storage: &dyn Storage, command: AnalyticsCommands) -> Result<(), CliError> {
    let data = storage.load()?;
    match command {
        AnalyticsCommands::Categories => {
            let stats = analytics::category_breakdown(&data.tasks, &data.categories);
            if stats.is_empty() {
                println!("No tasks yet.");
            }
            for s in stats {
                println!(
                    "{} {:<12} {:>3} tasks  {:>3} done  {:>3} active  {:>3}% complete  {:>3}% of all",
                    s.icon, s.name, s.total, s.completed, s.active, s.completion_rate, s.share
                );
            }
        }
        AnalyticsCommands::Priorities => {
            for s in analytics::priority_analysis(&data.tasks, Utc::now()) {
                println!(
                    "{:<6} {:>3} tasks  {:>3} done  {:>3} active  {:>3} overdue  {:>3}% complete  avg {} days",
                    s.priority.as_str(),
                    s.total,
                    s.completed,
                    s.active,
                    s.overdue,
                    s.completion_rate,
                    s.average_completion_days
                );
            }
        }
        AnalyticsCommands::Week => {
            for day in analytics::productivity_week(&data.tasks, Local::now().date_naive()) {
                println!(
                    "{}  created {:>3}  completed {:>3}  {:>3}%",
                    day.date.format("%a %Y-%m-%d"),
                    day.created,
                    day.completed,
                    day.productivity
                );
            }
        }
        AnalyticsCommands::Summary => {
            let summary = analytics::daily_summary(&data.tasks, Local::now());
            print_section("Due today", &summary.due_today);
            print_section("Due tomorrow", &summary.due_tomorrow);
            print_section("Due this week", &summary.due_this_week);
            print_section("Overdue", &summary.overdue);
            print_section("Completed today", &summary.completed_today);
            println!("Overall progress: {}%", summary.overall_progress);
        }
        AnalyticsCommands::Activity { limit } => {
            let activity = analytics::recent_activity(&data.tasks, Utc::now(), limit);
            if activity.is_empty() {
                println!("No recent activity.");
            }
            for entry in activity {
                let kind = match entry.kind {
                    ActivityKind::Created => "created",
                    ActivityKind::Completed => "completed",
                };
                println!("{}  {:<9}  {}", local_time(&entry.at), kind, entry.title);
            }
        }
    }
    Ok(())
}

fn cmd_category(storage: &dyn Storage, command: CategoryCommands) -> Result<(), CliError> {
    let mut manager = CategoryManager::new(storage);
    match command {
        CategoryCommands::List => {
            for category in manager.list_categories()? {
                println!("{} {} ({})", category.icon, category.name, category.color);
            }
        }
        CategoryCommands::Add { name, color, icon } => {
            let category = manager.add_category(&name, &color, &icon)?;
            println!("Category added: {}", category.name);
        }
        CategoryCommands::Rename { old_name, new_name } => {
            let moved = manager.rename_category(&old_name, &new_name)?;
            println!("Category renamed to {} ({} tasks updated)", new_name.trim(), moved);
        }
        CategoryCommands::Delete { name, move_to } => {
            let moved = manager.delete_category(&name, move_to.as_deref())?;
            println!("Category deleted ({} tasks moved)", moved);
        }
        CategoryCommands::Reset => {
            manager.reset_to_defaults()?;
            println!("Categories restored to defaults");
        }
    }
    Ok(())
}

fn run_config(config: &mut ConfigManager, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => println!("{}", config.effective(&key)?),
        ConfigCommands::Set { key, value } => {
            config.set(&key, &value)?;
            println!("Set {} = {}", key, config.effective(&key)?);
        }
        ConfigCommands::Unset { key } => {
            config.unset(&key)?;
            println!("Unset {}", key);
        }
        ConfigCommands::List => {
            for (key, value, is_default) in config.list()? {
                if is_default {
                    println!("{} = {} (default)", key, value);
                } else {
                    println!("{} = {}", key, value);
                }
            }
        }
    }
    Ok(())
}

fn cmd_remind(storage: &dyn Storage, config: &ConfigManager, watch: bool) -> Result<(), CliError> {
    let mut notifier = ConsoleNotifier;
    let now = timestamp::now();
    let tasks = storage.load()?.tasks;
    let mut registry = ReminderRegistry::restore(&tasks, now, config.missed_reminder_policy(), &mut notifier);
    registry.fire_due(now, &mut notifier);

    if !watch {
        match registry.next_fire_time() {
            Some(next) => println!(
                "{} reminders pending, next at {}",
                registry.len(),
                local_time(&next)
            ),
            None => println!("No pending reminders."),
        }
        return Ok(());
    }

    let poll = config.poll_interval();
    println!("Watching for reminders (every {}s). Press Ctrl-C to stop.", poll.as_secs());
    let mut last_poll = now;
    loop {
        let wait = registry
            .next_fire_time()
            .and_then(|next| (next - Utc::now()).to_std().ok())
            .map_or(poll, |until_next| until_next.min(poll));
        std::thread::sleep(wait);

        let now = timestamp::now();
        // Pick up edits made by other invocations while we slept.
        registry.sync(&storage.load()?.tasks, last_poll, now);
        registry.fire_due(now, &mut notifier);
        last_poll = now;
    }
}

fn cmd_reset(storage: &dyn Storage, yes: bool) -> Result<(), CliError> {
    println!("Warning: This will delete all tasks and categories");
    if !yes {
        print!("Are you sure you want to continue? [y/N] ");
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Operation cancelled");
            return Ok(());
        }
    }

    storage.save(&StorageData::new())?;
    log::info!("Storage reset to defaults");
    println!("Database has been reset to initial state with default categories");
    Ok(())
}

fn parse_date(input: &str) -> Result<DateTime<Utc>, CliError> {
    timestamp::parse(input).ok_or_else(|| CliError::InvalidDate(input.to_string()))
}

/// Accepts a full task id or any unambiguous prefix of one.
fn resolve_id(storage: &dyn Storage, input: &str) -> Result<TaskId, CliError> {
    let tasks = storage.load()?.tasks;
    find_id(&tasks, input)
}

fn resolve_ids(storage: &dyn Storage, inputs: &[String]) -> Result<Vec<TaskId>, CliError> {
    let tasks = storage.load()?.tasks;
    inputs.iter().map(|input| find_id(&tasks, input)).collect()
}

fn find_id(tasks: &[Task], input: &str) -> Result<TaskId, CliError> {
    let input = input.trim();
    if let Some(task) = tasks.iter().find(|t| t.id == input) {
        return Ok(task.id.clone());
    }
    if input.is_empty() {
        return Err(CliError::TaskNotFound(input.to_string()));
    }

    let mut matches = tasks.iter().filter(|t| t.id.starts_with(input));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task.id.clone()),
        (Some(_), Some(_)) => Err(CliError::AmbiguousId(input.to_string())),
        (None, _) => Err(CliError::TaskNotFound(input.to_string())),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn local_time(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn print_task_line(task: &Task) {
    let mark = if task.completed { "x" } else { " " };
    let due = task
        .due_date
        .map(|d| format!(", due {}", local_time(&d)))
        .unwrap_or_default();
    println!(
        "[{}] {}  {}  ({}, {}{}, {}%)",
        mark,
        short_id(&task.id),
        task.title,
        task.priority,
        task.category,
        due,
        task.progress
    );
}

fn print_section(heading: &str, tasks: &[Task]) {
    println!("{} ({}):", heading, tasks.len());
    for task in tasks {
        print!("  ");
        print_task_line(task);
    }
}

fn print_task_details(task: &Task) {
    println!("{}", task.title);
    println!("  id:          {}", task.id);
    if !task.description.is_empty() {
        println!("  description: {}", task.description);
    }
    println!("  status:      {}", if task.completed { "completed" } else { "active" });
    println!("  priority:    {}", task.priority);
    println!("  category:    {}", task.category);
    println!("  progress:    {}%", task.progress);
    if let Some(due) = task.due_date {
        println!("  due:         {}", local_time(&due));
    }
    if !task.tags.is_empty() {
        println!("  tags:        {}", task.tags.join(", "));
    }
    if let Some(at) = task.reminder_date.filter(|_| task.reminder) {
        println!("  reminder:    {}", local_time(&at));
    }
    if let Some(hours) = task.estimated_time {
        println!("  estimate:    {}h", hours);
    }
    if let Some(hours) = task.actual_time {
        println!("  actual:      {}h", hours);
    }
    for subtask in &task.subtasks {
        println!("  [{}] {}", if subtask.completed { "x" } else { " " }, subtask.title);
    }
    println!("  created:     {}", local_time(&task.created_at));
    println!("  updated:     {}", local_time(&task.updated_at));
}

fn print_stats(stats: &TaskStats) {
    println!("Total:           {}", stats.total);
    println!("Completed:       {} ({}%)", stats.completed, stats.completion_rate);
    println!("Overdue:         {}", stats.overdue);
    println!("Due today:       {}", stats.due_today);
    println!("Upcoming:        {}", stats.upcoming);
    println!("High priority:   {}", stats.high_priority);
    println!("Avg completion:  {:.1}h", stats.average_completion_time);
}

fn write_file(path: &Path, json: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
}
