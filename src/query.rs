//! The task query engine: filter, sort and summarise a task snapshot.
//!
//! Everything here is a pure function of its inputs. The current time is
//! passed in explicitly by [`query_at`]; [`query`] reads the local clock.

use crate::models::{Priority, Task};
use crate::timestamp;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Active,
    Completed,
    /// Unknown values mean `"all"`.
    #[default]
    #[serde(other)]
    All,
}

/// `"all"` or an exact category name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CategoryFilter {
    #[default]
    All,
    Named(String),
}

impl From<String> for CategoryFilter {
    fn from(value: String) -> Self {
        if value.is_empty() || value == "all" {
            CategoryFilter::All
        } else {
            CategoryFilter::Named(value)
        }
    }
}

impl From<CategoryFilter> for String {
    fn from(filter: CategoryFilter) -> Self {
        match filter {
            CategoryFilter::All => "all".to_string(),
            CategoryFilter::Named(name) => name,
        }
    }
}

/// `"all"` or a single priority. Unrecognised values mean `"all"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

impl From<String> for PriorityFilter {
    fn from(value: String) -> Self {
        value
            .parse::<Priority>()
            .map(PriorityFilter::Only)
            .unwrap_or(PriorityFilter::All)
    }
}

impl From<PriorityFilter> for String {
    fn from(filter: PriorityFilter) -> Self {
        match filter {
            PriorityFilter::All => "all".to_string(),
            PriorityFilter::Only(priority) => priority.as_str().to_string(),
        }
    }
}

/// Bounds on the due date. Tasks without a due date always pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, with = "timestamp::optional", skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::optional", skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub category: CategoryFilter,
    #[serde(default)]
    pub priority: PriorityFilter,
    #[serde(default)]
    pub date_range: DateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Title,
    #[default]
    DueDate,
    Priority,
    CreatedAt,
    Progress,
    /// Keeps input order. Unknown field names land here.
    #[serde(other)]
    Unsorted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Desc,
    #[default]
    #[serde(other)]
    Asc,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortOptions {
    #[serde(default)]
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub overdue: usize,
    pub upcoming: usize,
    pub due_today: usize,
    pub high_priority: usize,
    pub completion_rate: u32,
    /// Mean hours between creation and last update over completed tasks.
    pub average_completion_time: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub view: Vec<Task>,
    pub stats: TaskStats,
}

pub fn query(tasks: &[Task], filter: &FilterOptions, sort: &SortOptions, search: &str) -> QueryResult {
    query_at(tasks, filter, sort, search, Local::now())
}

pub fn query_at(
    tasks: &[Task],
    filter: &FilterOptions,
    sort: &SortOptions,
    search: &str,
    now: DateTime<Local>,
) -> QueryResult {
    let needle = search.to_lowercase();
    let mut view: Vec<Task> = tasks
        .iter()
        .filter(|task| matches_filter(task, filter) && matches_search(task, &needle))
        .cloned()
        .collect();

    // Vec::sort_by is stable.
    view.sort_by(|a, b| compare(a, b, sort));

    log::debug!("Query kept {} of {} tasks", view.len(), tasks.len());

    QueryResult {
        view,
        stats: compute_stats(tasks, now),
    }
}

pub fn matches_filter(task: &Task, filter: &FilterOptions) -> bool {
    let status_ok = match filter.status {
        StatusFilter::All => true,
        StatusFilter::Active => !task.completed,
        StatusFilter::Completed => task.completed,
    };
    if !status_ok {
        return false;
    }

    if let CategoryFilter::Named(ref name) = filter.category {
        if task.category != *name {
            return false;
        }
    }

    if let PriorityFilter::Only(priority) = filter.priority {
        if task.priority != priority {
            return false;
        }
    }

    if let Some(due) = task.due_date {
        if filter.date_range.start.is_some_and(|start| due < start) {
            return false;
        }
        if filter.date_range.end.is_some_and(|end| due > end) {
            return false;
        }
    }

    true
}

/// `needle` must already be lower-cased. An empty needle matches everything.
pub fn matches_search(task: &Task, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    task.title.to_lowercase().contains(needle)
        || task.description.to_lowercase().contains(needle)
        || task.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
}

pub fn compare(a: &Task, b: &Task, sort: &SortOptions) -> Ordering {
    let ordering = match sort.field {
        SortField::Title => compare_titles(&a.title, &b.title),
        SortField::DueDate => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            // Missing due dates go last in either direction.
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (None, None) => return Ordering::Equal,
        },
        SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Progress => a.progress.cmp(&b.progress),
        SortField::Unsorted => Ordering::Equal,
    };
    sort.direction.apply(ordering)
}

// Case-insensitive first; on a case-only difference lower case sorts first.
fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

pub fn compute_stats(tasks: &[Task], now: DateTime<Local>) -> TaskStats {
    let now_utc = now.with_timezone(&Utc);
    let today = now.date_naive();
    let is_today = |due: DateTime<Utc>| due.with_timezone(&Local).date_naive() == today;

    let mut stats = TaskStats {
        total: tasks.len(),
        ..Default::default()
    };
    let mut completion_hours = 0.0;

    for task in tasks {
        if task.completed {
            stats.completed += 1;
            completion_hours += (task.updated_at - task.created_at).num_seconds() as f64 / 3600.0;
            continue;
        }

        if task.priority == Priority::High {
            stats.high_priority += 1;
        }

        if let Some(due) = task.due_date {
            if due < now_utc && !is_today(due) {
                stats.overdue += 1;
            }
            if due > now_utc {
                stats.upcoming += 1;
            }
            if is_today(due) {
                stats.due_today += 1;
            }
        }
    }

    if stats.total > 0 {
        stats.completion_rate = percentage(stats.completed, stats.total);
    }
    if stats.completed > 0 {
        stats.average_completion_time = completion_hours / stats.completed as f64;
    }

    stats
}

pub(crate) fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}
