use crate::models::{StorageData, Task, TaskDraft};
use crate::storage::json::JsonStorage;
use crate::storage::Storage;
use std::path::PathBuf;
use tempfile::TempDir;

/// JSON storage in a temporary directory that lives as long as the value.
pub struct TestStorage {
    temp_dir: TempDir,
    storage: JsonStorage,
}

impl TestStorage {
    pub fn new() -> Self {
        let temp_dir = tempfile::Builder::new()
            .prefix("taskflow_test")
            .tempdir()
            .expect("Failed to create temporary directory");

        let storage = JsonStorage::new(temp_dir.path().join("test_storage.json"));
        storage
            .save(&StorageData::new())
            .expect("Failed to initialize test storage");

        Self { temp_dir, storage }
    }

    /// Seeds the storage with one task per title, in order.
    pub fn with_tasks(titles: &[&str]) -> Self {
        let test_storage = Self::new();
        let mut data = test_storage.storage.load().expect("Failed to load storage");
        for title in titles {
            data.tasks
                .push(Task::new(TaskDraft::new(*title)).expect("Failed to create task"));
        }
        test_storage
            .storage
            .save(&data)
            .expect("Failed to seed test storage");
        test_storage
    }

    pub fn storage(&self) -> &dyn Storage {
        &self.storage
    }

    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    pub fn task_id(&self, title: &str) -> String {
        self.storage
            .load()
            .expect("Failed to load storage")
            .tasks
            .into_iter()
            .find(|t| t.title == title)
            .map(|t| t.id)
            .unwrap_or_else(|| panic!("no task titled {title}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_initialization() {
        let test_storage = TestStorage::new();
        let data = test_storage
            .storage()
            .load()
            .expect("Failed to load storage");
        assert!(data.tasks.is_empty());
        assert!(!data.categories.is_empty());
        assert!(test_storage.path().join("test_storage.json").exists());
    }

    #[test]
    fn test_seeded_tasks_keep_order() {
        let test_storage = TestStorage::with_tasks(&["one", "two"]);
        let data = test_storage.storage().load().unwrap();
        assert_eq!(data.tasks[0].title, "one");
        assert_eq!(data.tasks[1].title, "two");
        assert_eq!(test_storage.task_id("two"), data.tasks[1].id);
    }
}
