//! Cancelable one-shot reminders keyed by task id.
//!
//! The registry only records what should fire and when; delivery goes
//! through a [`Notifier`]. Whoever drives the clock (the `remind` command,
//! or a test) calls [`ReminderRegistry::fire_due`].

use crate::models::{Task, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task_id: TaskId,
    pub title: String,
    pub fire_at: DateTime<Utc>,
}

/// Delivers reminders once they are due.
pub trait Notifier {
    fn notify(&mut self, reminder: &Reminder);
}

impl<F> Notifier for F
where
    F: FnMut(&Reminder),
{
    fn notify(&mut self, reminder: &Reminder) {
        self(reminder)
    }
}

/// Writes reminders to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, reminder: &Reminder) {
        log::info!("Reminder: time to work on \"{}\"", reminder.title);
    }
}

/// What to do with a reminder whose time passed while nothing was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissedReminderPolicy {
    #[default]
    Drop,
    Fire,
}

impl MissedReminderPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            MissedReminderPolicy::Drop => "drop",
            MissedReminderPolicy::Fire => "fire",
        }
    }
}

impl FromStr for MissedReminderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(MissedReminderPolicy::Drop),
            "fire" => Ok(MissedReminderPolicy::Fire),
            other => Err(format!("unknown missed-reminder policy: {other}")),
        }
    }
}

impl fmt::Display for MissedReminderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct ReminderRegistry {
    pending: HashMap<TaskId, Reminder>,
}

impl ReminderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry from stored tasks after a restart.
    ///
    /// Reminders still in the future are armed. Reminders already past are
    /// handed to `notifier` or discarded, depending on `policy`.
    pub fn restore(
        tasks: &[Task],
        now: DateTime<Utc>,
        policy: MissedReminderPolicy,
        notifier: &mut dyn Notifier,
    ) -> Self {
        let mut registry = Self::new();
        for task in tasks {
            let Some(fire_at) = task.pending_reminder() else {
                continue;
            };
            let reminder = Reminder {
                task_id: task.id.clone(),
                title: task.title.clone(),
                fire_at,
            };
            if fire_at > now {
                registry.pending.insert(task.id.clone(), reminder);
                continue;
            }
            match policy {
                MissedReminderPolicy::Fire => notifier.notify(&reminder),
                MissedReminderPolicy::Drop => {
                    log::warn!("Dropping missed reminder for task {} ({})", task.id, task.title)
                }
            }
        }
        registry
    }

    /// Arms a reminder, replacing any earlier one for the same task.
    /// A fire time that is not in the future is ignored.
    pub fn schedule(&mut self, task_id: &str, title: &str, fire_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if fire_at <= now {
            log::debug!("Not scheduling reminder for task {task_id}: {fire_at} has passed");
            self.pending.remove(task_id);
            return false;
        }
        self.pending.insert(
            task_id.to_string(),
            Reminder {
                task_id: task_id.to_string(),
                title: title.to_string(),
                fire_at,
            },
        );
        true
    }

    /// Arms the task's reminder if it has one.
    pub fn schedule_task(&mut self, task: &Task, now: DateTime<Utc>) -> bool {
        match task.pending_reminder() {
            Some(fire_at) => self.schedule(&task.id, &task.title, fire_at, now),
            None => false,
        }
    }

    /// Brings the registry in line with `tasks` as they are now stored.
    ///
    /// `since` is the previous sync. A reminder that came due in
    /// `(since, now]` is kept armed so the next [`fire_due`] delivers it;
    /// anything older was already handled. Reminders whose task is gone,
    /// completed or disarmed are cancelled, and a renamed task is re-armed
    /// under its new title.
    ///
    /// [`fire_due`]: ReminderRegistry::fire_due
    pub fn sync(&mut self, tasks: &[Task], since: DateTime<Utc>, now: DateTime<Utc>) {
        self.pending.retain(|id, _| {
            tasks
                .iter()
                .any(|t| &t.id == id && t.pending_reminder().is_some())
        });
        for task in tasks {
            let Some(fire_at) = task.pending_reminder() else {
                continue;
            };
            let unchanged = self
                .pending
                .get(&task.id)
                .is_some_and(|r| r.fire_at == fire_at && r.title == task.title);
            if unchanged {
                continue;
            }
            if fire_at > since {
                self.pending.insert(
                    task.id.clone(),
                    Reminder {
                        task_id: task.id.clone(),
                        title: task.title.clone(),
                        fire_at,
                    },
                );
            } else {
                log::debug!("Reminder for task {} at {fire_at} predates {since}", task.id);
                self.pending.remove(&task.id);
            }
        }
        log::debug!("Synced reminders at {now}: {} pending", self.pending.len());
    }

    pub fn cancel(&mut self, task_id: &str) -> Option<Reminder> {
        let removed = self.pending.remove(task_id);
        if removed.is_some() {
            log::debug!("Cancelled reminder for task {task_id}");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn get(&self, task_id: &str) -> Option<&Reminder> {
        self.pending.get(task_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.pending.values().map(|r| r.fire_at).min()
    }

    /// Delivers every reminder due at `now`, earliest first, and forgets
    /// them. Returns how many fired.
    pub fn fire_due(&mut self, now: DateTime<Utc>, notifier: &mut dyn Notifier) -> usize {
        let mut due: Vec<Reminder> = self
            .pending
            .values()
            .filter(|r| r.fire_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.task_id.cmp(&b.task_id)));

        for reminder in &due {
            self.pending.remove(&reminder.task_id);
            notifier.notify(reminder);
        }
        due.len()
    }
}
