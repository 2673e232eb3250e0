use crate::models::StorageData;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use crate::models::StorageError;

pub mod json;
mod migrations;
pub mod sqlite;
#[cfg(test)]
pub(crate) mod test_utils;

pub use json::JsonStorage;
pub use sqlite::SqliteStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    #[default]
    Json,
    Sqlite,
}

impl StorageType {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::Json => "json",
            StorageType::Sqlite => "sqlite",
        }
    }
}

impl FromStr for StorageType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(StorageType::Json),
            "sqlite" => Ok(StorageType::Sqlite),
            other => Err(StorageError::InvalidData(format!("Unknown storage type: {}", other))),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-collection persistence. `save` replaces everything previously
/// stored; the last write wins.
pub trait Storage: Send + Sync {
    fn save(&self, data: &StorageData) -> Result<(), StorageError>;
    fn load(&self) -> Result<StorageData, StorageError>;
}

pub fn create_storage(
    storage_type: StorageType,
    path: &Path,
) -> Result<Box<dyn Storage>, StorageError> {
    log::debug!("Opening {} storage at {}", storage_type, path.display());
    let storage: Box<dyn Storage> = match storage_type {
        StorageType::Json => Box::new(JsonStorage::new(path)),
        StorageType::Sqlite => Box::new(SqliteStorage::new(path)?),
    };
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Priority, SubTask, Task, TaskDraft};

    fn sample_data() -> StorageData {
        let mut data = StorageData::new();
        let mut draft = TaskDraft::new("Test Task");
        draft.priority = Priority::High;
        draft.category = Some("Work".to_string());
        draft.tags = vec!["report".to_string(), "q1".to_string()];
        draft.due_date = crate::timestamp::parse("2024-01-10");
        draft.estimated_time = Some(1.5);
        let mut task = Task::new(draft).unwrap();
        task.subtasks.push(SubTask {
            id: "s1".to_string(),
            title: "outline".to_string(),
            completed: true,
        });
        data.tasks.push(task);
        data.tasks.push(Task::new(TaskDraft::new("Second")).unwrap());
        data.categories.push(
            Category::new("Side Projects".to_string(), "#111111".to_string(), "🛠".to_string()).unwrap(),
        );
        data
    }

    fn assert_round_trip(storage: &dyn Storage) {
        let data = sample_data();
        storage.save(&data).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.tasks, data.tasks);
        assert_eq!(loaded.categories, data.categories);
    }

    #[test]
    fn test_json_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = create_storage(StorageType::Json, &temp_dir.path().join("data.json")).unwrap();
        assert_round_trip(storage.as_ref());
    }

    #[test]
    fn test_sqlite_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = create_storage(StorageType::Sqlite, &temp_dir.path().join("data.db")).unwrap();
        assert_round_trip(storage.as_ref());
    }

    #[test]
    fn test_save_replaces_previous_collection() {
        let temp_dir = tempfile::tempdir().unwrap();
        for storage_type in [StorageType::Json, StorageType::Sqlite] {
            let path = temp_dir.path().join(format!("replace.{}", storage_type));
            let storage = create_storage(storage_type, &path).unwrap();
            storage.save(&sample_data()).unwrap();

            let mut smaller = storage.load().unwrap();
            smaller.tasks.truncate(1);
            storage.save(&smaller).unwrap();

            assert_eq!(storage.load().unwrap().tasks.len(), 1);
        }
    }

    #[test]
    fn test_storage_type_parsing() {
        assert_eq!("json".parse::<StorageType>().unwrap(), StorageType::Json);
        assert_eq!("sqlite".parse::<StorageType>().unwrap(), StorageType::Sqlite);
        assert!("yaml".parse::<StorageType>().is_err());
    }
}
