use crate::interchange::ExportDocument;
use crate::models::{Priority, StorageData, StorageError, Task, TaskDraft, TaskError, TaskId, TaskUpdate};
use crate::query::{self, FilterOptions, QueryResult, SortOptions};
use crate::reminders::ReminderRegistry;
use crate::storage::Storage;
use crate::timestamp;
use chrono::{DateTime, Local, Utc};

/// Task mutations over a [`Storage`].
///
/// Every operation loads the current snapshot, changes it, and saves the
/// whole collection back. Operations on an unknown id do nothing.
pub struct TaskManager<'a> {
    storage: &'a dyn Storage,
    reminders: ReminderRegistry,
}

impl<'a> TaskManager<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self::with_reminders(storage, ReminderRegistry::new())
    }

    pub fn with_reminders(storage: &'a dyn Storage, reminders: ReminderRegistry) -> Self {
        Self { storage, reminders }
    }

    pub fn reminders(&self) -> &ReminderRegistry {
        &self.reminders
    }

    pub fn reminders_mut(&mut self) -> &mut ReminderRegistry {
        &mut self.reminders
    }

    pub fn tasks(&self) -> Result<Vec<Task>, StorageError> {
        Ok(self.storage.load()?.tasks)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>, StorageError> {
        Ok(self.storage.load()?.tasks.into_iter().find(|t| t.id == id))
    }

    pub fn query(
        &self,
        filter: &FilterOptions,
        sort: &SortOptions,
        search: &str,
    ) -> Result<QueryResult, StorageError> {
        self.query_at(filter, sort, search, Local::now())
    }

    pub fn query_at(
        &self,
        filter: &FilterOptions,
        sort: &SortOptions,
        search: &str,
        now: DateTime<Local>,
    ) -> Result<QueryResult, StorageError> {
        let data = self.storage.load()?;
        Ok(query::query_at(&data.tasks, filter, sort, search, now))
    }

    pub fn add_task(&mut self, draft: TaskDraft) -> Result<Task, TaskError> {
        let now = timestamp::now();
        let task = Task::from_draft(draft, now)?;
        let mut data = self.storage.load()?;
        data.tasks.push(task.clone());
        self.save(&data)?;

        self.reminders.schedule_task(&task, now);
        log::info!("Added task {} ({})", task.id, task.title);
        Ok(task)
    }

    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> Result<Option<Task>, TaskError> {
        let now = timestamp::now();
        let mut data = self.storage.load()?;
        let Some(task) = data.find_task_mut(id) else {
            log::debug!("Update ignored, no task {id}");
            return Ok(None);
        };

        let touches_reminder = update.touches_reminder();
        task.apply(update, now)?;
        let updated = task.clone();
        self.save(&data)?;

        if touches_reminder {
            self.reminders.cancel(id);
            self.reminders.schedule_task(&updated, now);
        }
        log::info!("Updated task {}", id);
        Ok(Some(updated))
    }

    pub fn delete_task(&mut self, id: &str) -> Result<Option<Task>, StorageError> {
        let mut data = self.storage.load()?;
        let Some(index) = data.tasks.iter().position(|t| t.id == id) else {
            log::debug!("Delete ignored, no task {id}");
            return Ok(None);
        };

        let removed = data.tasks.remove(index);
        self.save(&data)?;
        self.reminders.cancel(id);
        log::info!("Deleted task {} ({})", removed.id, removed.title);
        Ok(Some(removed))
    }

    pub fn toggle_task(&mut self, id: &str) -> Result<Option<Task>, StorageError> {
        let now = timestamp::now();
        let mut data = self.storage.load()?;
        let Some(task) = data.find_task_mut(id) else {
            log::debug!("Toggle ignored, no task {id}");
            return Ok(None);
        };

        task.toggle(now);
        let toggled = task.clone();
        self.save(&data)?;
        self.sync_reminder(&toggled, now);
        Ok(Some(toggled))
    }

    pub fn duplicate_task(&mut self, id: &str) -> Result<Option<Task>, StorageError> {
        let now = timestamp::now();
        let mut data = self.storage.load()?;
        let Some(original) = data.tasks.iter().find(|t| t.id == id) else {
            log::debug!("Duplicate ignored, no task {id}");
            return Ok(None);
        };

        let copy = original.duplicate(now);
        data.tasks.push(copy.clone());
        self.save(&data)?;
        log::info!("Duplicated task {} as {}", id, copy.id);
        Ok(Some(copy))
    }

    /// Deletes every listed task. Returns how many existed.
    pub fn bulk_delete(&mut self, ids: &[TaskId]) -> Result<usize, StorageError> {
        let mut data = self.storage.load()?;
        let before = data.tasks.len();
        data.tasks.retain(|t| !ids.contains(&t.id));
        let removed = before - data.tasks.len();
        if removed == 0 {
            return Ok(0);
        }

        self.save(&data)?;
        for id in ids {
            self.reminders.cancel(id);
        }
        log::info!("Bulk deleted {} tasks", removed);
        Ok(removed)
    }

    /// Toggles every listed task individually.
    pub fn bulk_toggle(&mut self, ids: &[TaskId]) -> Result<usize, StorageError> {
        let now = timestamp::now();
        let changed = self.bulk_apply(ids, |task| task.toggle(now))?;
        for task in changed.iter() {
            self.sync_reminder(task, now);
        }
        Ok(changed.len())
    }

    pub fn bulk_update_priority(&mut self, ids: &[TaskId], priority: Priority) -> Result<usize, StorageError> {
        let now = timestamp::now();
        let changed = self.bulk_apply(ids, |task| {
            task.priority = priority;
            task.updated_at = now.max(task.created_at);
        })?;
        Ok(changed.len())
    }

    pub fn bulk_update_category(&mut self, ids: &[TaskId], category: &str) -> Result<usize, StorageError> {
        let now = timestamp::now();
        let changed = self.bulk_apply(ids, |task| {
            task.category = category.to_string();
            task.updated_at = now.max(task.created_at);
        })?;
        Ok(changed.len())
    }

    /// Replaces the stored tasks and categories with an imported document
    /// and re-arms reminders for the new tasks.
    pub fn import(&mut self, document: ExportDocument) -> Result<(), StorageError> {
        let now = timestamp::now();
        let mut data = self.storage.load()?;
        data.tasks = document.tasks;
        data.categories = document.categories;
        data.assign_category_ids();
        self.save(&data)?;

        self.reminders.clear();
        for task in &data.tasks {
            self.reminders.schedule_task(task, now);
        }
        log::info!(
            "Imported {} tasks and {} categories",
            data.tasks.len(),
            data.categories.len()
        );
        Ok(())
    }

    fn bulk_apply<F>(&mut self, ids: &[TaskId], mut change: F) -> Result<Vec<Task>, StorageError>
    where
        F: FnMut(&mut Task),
    {
        let mut data = self.storage.load()?;
        let mut changed = Vec::new();
        for task in data.tasks.iter_mut().filter(|t| ids.contains(&t.id)) {
            change(task);
            changed.push(task.clone());
        }
        if !changed.is_empty() {
            self.save(&data)?;
            log::info!("Bulk updated {} tasks", changed.len());
        }
        Ok(changed)
    }

    // Completed tasks lose their reminder; reopened ones get it back.
    fn sync_reminder(&mut self, task: &Task, now: DateTime<Utc>) {
        if task.completed {
            self.reminders.cancel(&task.id);
        } else {
            self.reminders.schedule_task(task, now);
        }
    }

    fn save(&self, data: &StorageData) -> Result<(), StorageError> {
        let mut data = data.clone();
        data.last_sync = timestamp::now();
        self.storage.save(&data)
    }
}
