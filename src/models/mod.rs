use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub type TaskId = String;

/// Name given to tasks created without a category.
pub const DEFAULT_CATEGORY_NAME: &str = "Other";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default = "new_id")]
    pub id: TaskId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, with = "timestamp::optional")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default = "timestamp::now", with = "timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "timestamp::now", with = "timestamp::required")]
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_category_name")]
    pub category: String,
    #[serde(default, deserialize_with = "progress_from_number")]
    pub progress: u8,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub reminder: bool,
    #[serde(default, with = "timestamp::optional")]
    pub reminder_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<f64>,
    #[serde(default)]
    pub subtasks: Vec<SubTask>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SubTask {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// Everything the caller supplies when creating a task.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub progress: u8,
    pub tags: Vec<String>,
    pub reminder: bool,
    pub reminder_date: Option<DateTime<Utc>>,
    pub estimated_time: Option<f64>,
    pub actual_time: Option<f64>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Partial update merged into an existing task.
///
/// `None` leaves a field untouched. Clearable fields use a nested option:
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub category: Option<String>,
    pub progress: Option<u8>,
    pub tags: Option<Vec<String>>,
    pub reminder: Option<bool>,
    pub reminder_date: Option<Option<DateTime<Utc>>>,
    pub estimated_time: Option<Option<f64>>,
    pub actual_time: Option<Option<f64>>,
    pub subtasks: Option<Vec<SubTask>>,
}

impl TaskUpdate {
    pub fn touches_reminder(&self) -> bool {
        self.reminder.is_some() || self.reminder_date.is_some()
    }
}

impl Task {
    pub fn new(draft: TaskDraft) -> Result<Self, TaskError> {
        Self::from_draft(draft, timestamp::now())
    }

    pub fn from_draft(draft: TaskDraft, now: DateTime<Utc>) -> Result<Self, TaskError> {
        if draft.title.trim().is_empty() {
            return Err(TaskError::EmptyTitle);
        }

        Ok(Self {
            id: new_id(),
            title: draft.title,
            description: draft.description,
            completed: draft.completed,
            priority: draft.priority,
            due_date: draft.due_date,
            created_at: now,
            updated_at: now,
            category: draft
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(default_category_name),
            progress: clamp_progress(draft.progress),
            tags: draft.tags,
            reminder: draft.reminder,
            reminder_date: draft.reminder_date,
            estimated_time: draft.estimated_time.map(non_negative),
            actual_time: draft.actual_time.map(non_negative),
            subtasks: Vec::new(),
        })
    }

    /// Merges `update` into the task. Nothing changes when the update is
    /// rejected.
    pub fn apply(&mut self, update: TaskUpdate, now: DateTime<Utc>) -> Result<(), TaskError> {
        if let Some(ref title) = update.title {
            if title.trim().is_empty() {
                return Err(TaskError::EmptyTitle);
            }
        }

        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(due_date) = update.due_date {
            self.due_date = due_date;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(progress) = update.progress {
            self.progress = clamp_progress(progress);
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(reminder) = update.reminder {
            self.reminder = reminder;
        }
        if let Some(reminder_date) = update.reminder_date {
            self.reminder_date = reminder_date;
        }
        if let Some(estimated_time) = update.estimated_time {
            self.estimated_time = estimated_time.map(non_negative);
        }
        if let Some(actual_time) = update.actual_time {
            self.actual_time = actual_time.map(non_negative);
        }
        if let Some(subtasks) = update.subtasks {
            self.subtasks = subtasks;
        }
        self.touch(now);
        Ok(())
    }

    /// Flips completion. Completing forces progress to 100; reopening
    /// keeps whatever progress the task had.
    pub fn toggle(&mut self, now: DateTime<Utc>) {
        self.completed = !self.completed;
        if self.completed {
            self.progress = 100;
        }
        self.touch(now);
    }

    /// Copies the task under a fresh identity with its state reset.
    pub fn duplicate(&self, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            title: format!("{} (Copy)", self.title),
            completed: false,
            progress: 0,
            reminder: false,
            reminder_date: None,
            created_at: now,
            updated_at: now,
            subtasks: Vec::new(),
            ..self.clone()
        }
    }

    /// The reminder time, when the task has an armed reminder.
    pub fn pending_reminder(&self) -> Option<DateTime<Utc>> {
        if self.reminder && !self.completed {
            self.reminder_date
        } else {
            None
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task title cannot be empty")]
    EmptyTitle,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Category {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
}

impl Category {
    pub fn new(name: String, color: String, icon: String) -> Result<Self, CategoryError> {
        if name.trim().is_empty() {
            return Err(CategoryError::EmptyName);
        }

        Ok(Self {
            id: slug(&name),
            name,
            color,
            icon,
        })
    }

    fn builtin(id: &str, name: &str, color: &str, icon: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// Whether two category names refer to the same category. Names are
/// unique without regard to case.
pub fn same_category_name(a: &str, b: &str) -> bool {
    category_key(a) == category_key(b)
}

fn category_key(name: &str) -> String {
    name.to_lowercase()
}

/// Categories available before the user defines any.
pub fn default_categories() -> Vec<Category> {
    vec![
        Category::builtin("work", "Work", "#3b82f6", "💼"),
        Category::builtin("personal", "Personal", "#10b981", "🏠"),
        Category::builtin("study", "Study", "#f59e0b", "📚"),
        Category::builtin("health", "Health", "#ef4444", "💪"),
        Category::builtin("finance", "Finance", "#8b5cf6", "💰"),
        Category::builtin("hobby", "Hobby", "#ec4899", "🎨"),
        Category::builtin("travel", "Travel", "#06b6d4", "✈️"),
        Category::builtin("other", "Other", "#6b7280", "📝"),
    ]
}

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("Category name cannot be empty")]
    EmptyName,
    #[error("Category name already exists: {0}")]
    DuplicateName(String),
    #[error("Category not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Ordinal used when sorting: high=3, medium=2, low=1.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl FromStr for Priority {
    type Err = PriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(PriorityError::InvalidPriority(s.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PriorityError {
    #[error("Invalid priority value: {0}")]
    InvalidPriority(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StorageData {
    pub version: u32, // Schema version for future migrations
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    #[serde(default = "Utc::now", with = "timestamp::required")]
    pub last_sync: DateTime<Utc>,
}

impl StorageData {
    pub fn new() -> Self {
        Self {
            version: 1,
            tasks: Vec::new(),
            categories: default_categories(),
            last_sync: Utc::now(),
        }
    }

    pub fn find_task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        let mut ids = HashSet::new();
        for task in &self.tasks {
            if !ids.insert(task.id.as_str()) {
                return Err(StorageError::DuplicateTask(task.id.clone()));
            }
        }

        let mut names = HashSet::new();
        for category in &self.categories {
            if !names.insert(category_key(&category.name)) {
                return Err(StorageError::DuplicateCategory(category.name.clone()));
            }
        }

        Ok(())
    }

    /// Gives every category an id no earlier category uses. Blank ids are
    /// derived from the name; clashes get a numeric suffix.
    pub fn assign_category_ids(&mut self) {
        let mut taken: HashSet<String> = HashSet::new();
        for category in &mut self.categories {
            let base = match category.id.trim() {
                "" => slug(&category.name),
                id => id.to_string(),
            };
            let mut id = base.clone();
            let mut n = 2;
            while taken.contains(&id) {
                id = format!("{base}-{n}");
                n += 1;
            }
            taken.insert(id.clone());
            category.id = id;
        }
    }
}

impl Default for StorageData {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),
    #[error("Duplicate category name: {0}")]
    DuplicateCategory(String),
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_category_name() -> String {
    DEFAULT_CATEGORY_NAME.to_string()
}

fn clamp_progress(progress: u8) -> u8 {
    progress.min(100)
}

fn non_negative(hours: f64) -> f64 {
    if hours.is_finite() {
        hours.max(0.0)
    } else {
        0.0
    }
}

fn slug(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

// Progress arrives as a JSON number that may be fractional or out of range.
fn progress_from_number<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    if raw.is_nan() {
        return Ok(0);
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}
