//! Dashboard figures derived from the full task collection.

use crate::models::{Category, Priority, Task, TaskId};
use crate::query::percentage;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub name: String,
    pub icon: String,
    pub color: String,
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub completion_rate: u32,
    /// Share of all tasks, in percent.
    pub share: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityStats {
    pub priority: Priority,
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub overdue: usize,
    pub completion_rate: u32,
    pub average_completion_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayActivity {
    pub date: NaiveDate,
    pub created: usize,
    pub completed: usize,
    pub productivity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub due_today: Vec<Task>,
    pub due_tomorrow: Vec<Task>,
    pub due_this_week: Vec<Task>,
    pub overdue: Vec<Task>,
    pub completed_today: Vec<Task>,
    pub overall_progress: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Created,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub kind: ActivityKind,
    pub task_id: TaskId,
    pub title: String,
    pub at: DateTime<Utc>,
}

pub const DEFAULT_ACTIVITY_LIMIT: usize = 5;

fn local_date(dt: DateTime<Utc>) -> NaiveDate {
    dt.with_timezone(&Local).date_naive()
}

/// Per-category counts for every category that has at least one task,
/// largest first.
pub fn category_breakdown(tasks: &[Task], categories: &[Category]) -> Vec<CategoryStats> {
    let mut stats: Vec<CategoryStats> = categories
        .iter()
        .map(|category| {
            let in_category: Vec<&Task> = tasks.iter().filter(|t| t.category == category.name).collect();
            let completed = in_category.iter().filter(|t| t.completed).count();
            CategoryStats {
                name: category.name.clone(),
                icon: category.icon.clone(),
                color: category.color.clone(),
                total: in_category.len(),
                completed,
                active: in_category.len() - completed,
                completion_rate: percentage(completed, in_category.len()),
                share: percentage(in_category.len(), tasks.len()),
            }
        })
        .filter(|s| s.total > 0)
        .collect();
    stats.sort_by(|a, b| b.total.cmp(&a.total));
    stats
}

/// Counts for high, medium and low priority, in that order.
pub fn priority_analysis(tasks: &[Task], now: DateTime<Utc>) -> Vec<PriorityStats> {
    Priority::ALL
        .iter()
        .map(|&priority| {
            let group: Vec<&Task> = tasks.iter().filter(|t| t.priority == priority).collect();
            let done: Vec<&&Task> = group.iter().filter(|t| t.completed).collect();
            let overdue = group
                .iter()
                .filter(|t| !t.completed && t.due_date.is_some_and(|due| due < now))
                .count();

            let average_completion_days = if done.is_empty() {
                0
            } else {
                let total_secs: i64 = done
                    .iter()
                    .map(|t| (t.updated_at - t.created_at).num_seconds())
                    .sum();
                (total_secs as f64 / done.len() as f64 / 86_400.0).round() as i64
            };

            PriorityStats {
                priority,
                total: group.len(),
                completed: done.len(),
                active: group.len() - done.len(),
                overdue,
                completion_rate: percentage(done.len(), group.len()),
                average_completion_days,
            }
        })
        .collect()
}

/// Created and completed counts for the seven days ending `today`,
/// oldest first. Completion is dated by the task's last update.
pub fn productivity_week(tasks: &[Task], today: NaiveDate) -> Vec<DayActivity> {
    (0..7)
        .rev()
        .map(|days_back| {
            let date = today - Duration::days(days_back);
            let created = tasks
                .iter()
                .filter(|t| local_date(t.created_at) == date)
                .count();
            let completed = tasks
                .iter()
                .filter(|t| t.completed && local_date(t.updated_at) == date)
                .count();
            DayActivity {
                date,
                created,
                completed,
                productivity: percentage(completed, created),
            }
        })
        .collect()
}

pub fn daily_summary(tasks: &[Task], now: DateTime<Local>) -> DailySummary {
    let today = now.date_naive();
    let tomorrow = today + Duration::days(1);
    // Weeks run Sunday to Saturday.
    let week_start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
    let week_end = week_start + Duration::days(6);
    let now_utc = now.with_timezone(&Utc);

    let open_due = |pred: &dyn Fn(DateTime<Utc>, NaiveDate) -> bool| -> Vec<Task> {
        tasks
            .iter()
            .filter(|t| !t.completed)
            .filter(|t| t.due_date.is_some_and(|due| pred(due, local_date(due))))
            .cloned()
            .collect()
    };

    DailySummary {
        due_today: open_due(&|_, date| date == today),
        due_tomorrow: open_due(&|_, date| date == tomorrow),
        due_this_week: open_due(&|_, date| date >= week_start && date <= week_end),
        overdue: open_due(&|due, date| due < now_utc && date != today),
        completed_today: tasks
            .iter()
            .filter(|t| t.completed && local_date(t.updated_at) == today)
            .cloned()
            .collect(),
        overall_progress: percentage(tasks.iter().filter(|t| t.completed).count(), tasks.len()),
    }
}

/// Recently created (last 24 hours, newest three) and recently completed
/// (newest three) tasks, merged newest first.
pub fn recent_activity(tasks: &[Task], now: DateTime<Utc>, limit: usize) -> Vec<Activity> {
    let mut created: Vec<&Task> = tasks
        .iter()
        .filter(|t| now - t.created_at <= Duration::hours(24))
        .collect();
    created.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut completed: Vec<&Task> = tasks.iter().filter(|t| t.completed).collect();
    completed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let mut activities: Vec<Activity> = created
        .into_iter()
        .take(3)
        .map(|t| Activity {
            kind: ActivityKind::Created,
            task_id: t.id.clone(),
            title: t.title.clone(),
            at: t.created_at,
        })
        .chain(completed.into_iter().take(3).map(|t| Activity {
            kind: ActivityKind::Completed,
            task_id: t.id.clone(),
            title: t.title.clone(),
            at: t.updated_at,
        }))
        .collect();

    activities.sort_by(|a, b| b.at.cmp(&a.at));
    activities.truncate(limit);
    activities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_categories, TaskDraft};
    use crate::timestamp;

    fn task_at(title: &str, created: DateTime<Utc>) -> Task {
        Task::from_draft(TaskDraft::new(title), created).unwrap()
    }

    #[test]
    fn test_category_breakdown_sorted_and_filtered() {
        let now = timestamp::now();
        let mut tasks = Vec::new();
        for (title, category, done) in [
            ("a", "Work", true),
            ("b", "Work", false),
            ("c", "Work", false),
            ("d", "Health", true),
            ("e", "Unknown", false),
        ] {
            let mut t = task_at(title, now);
            t.category = category.to_string();
            t.completed = done;
            tasks.push(t);
        }

        let stats = category_breakdown(&tasks, &default_categories());
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "Work");
        assert_eq!(stats[0].total, 3);
        assert_eq!(stats[0].active, 2);
        assert_eq!(stats[0].completion_rate, 33);
        assert_eq!(stats[0].share, 60);
        assert_eq!(stats[1].name, "Health");
        assert_eq!(stats[1].completion_rate, 100);
    }

    #[test]
    fn test_priority_analysis() {
        let now = timestamp::now();
        let created = now - Duration::days(4);

        let mut done = task_at("done", created);
        done.priority = Priority::High;
        done.toggle(created + Duration::days(2));

        let mut late = task_at("late", created);
        late.priority = Priority::High;
        late.due_date = Some(now - Duration::hours(1));

        let low = {
            let mut t = task_at("low", created);
            t.priority = Priority::Low;
            t
        };

        let stats = priority_analysis(&[done, late, low], now);
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].priority, Priority::High);
        assert_eq!(stats[0].total, 2);
        assert_eq!(stats[0].completed, 1);
        assert_eq!(stats[0].overdue, 1);
        assert_eq!(stats[0].completion_rate, 50);
        assert_eq!(stats[0].average_completion_days, 2);
        assert_eq!(stats[1].total, 0);
        assert_eq!(stats[1].completion_rate, 0);
        assert_eq!(stats[2].active, 1);
    }

    #[test]
    fn test_productivity_week_covers_seven_days() {
        let now = Local::now();
        let today = now.date_naive();
        let now_utc = now.with_timezone(&Utc);

        let mut finished = task_at("finished", now_utc - Duration::days(2));
        finished.toggle(now_utc);
        let fresh = task_at("fresh", now_utc);
        let ancient = task_at("ancient", now_utc - Duration::days(30));

        let week = productivity_week(&[finished, fresh, ancient], today);
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, today - Duration::days(6));
        assert_eq!(week[6].date, today);
        assert_eq!(week[6].created, 1);
        assert_eq!(week[6].completed, 1);
        assert_eq!(week[6].productivity, 100);
        assert_eq!(week[4].created, 1);
        assert_eq!(week[4].productivity, 0);
        assert_eq!(week.iter().map(|d| d.created).sum::<usize>(), 2);
    }

    #[test]
    fn test_daily_summary_buckets() {
        let now = Local::now();
        let now_utc = now.with_timezone(&Utc);
        let created = now_utc - Duration::days(10);

        let mut today = task_at("today", created);
        today.due_date = Some(now_utc);
        let mut tomorrow = task_at("tomorrow", created);
        tomorrow.due_date = Some(now_utc + Duration::days(1));
        let mut overdue = task_at("overdue", created);
        overdue.due_date = Some(now_utc - Duration::days(3));
        let mut finished = task_at("finished", created);
        finished.toggle(now_utc);

        let summary = daily_summary(&[today, tomorrow, overdue, finished], now);
        assert_eq!(summary.due_today.len(), 1);
        assert_eq!(summary.due_tomorrow.len(), 1);
        assert_eq!(summary.overdue.len(), 1);
        assert_eq!(summary.overdue[0].title, "overdue");
        assert_eq!(summary.completed_today.len(), 1);
        assert_eq!(summary.overall_progress, 25);
        assert!(summary.due_this_week.iter().any(|t| t.title == "today"));
    }

    #[test]
    fn test_recent_activity_merges_newest_first() {
        let now = timestamp::now();
        let old = task_at("old", now - Duration::days(3));
        let new = task_at("new", now - Duration::hours(1));
        let mut done = task_at("done", now - Duration::days(5));
        done.toggle(now - Duration::minutes(10));

        let activity = recent_activity(&[old, new, done], now, DEFAULT_ACTIVITY_LIMIT);
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].kind, ActivityKind::Completed);
        assert_eq!(activity[0].title, "done");
        assert_eq!(activity[1].kind, ActivityKind::Created);
        assert_eq!(activity[1].title, "new");

        assert_eq!(recent_activity(&[], now, DEFAULT_ACTIVITY_LIMIT).len(), 0);
    }
}
