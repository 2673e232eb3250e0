//! Backup document exchanged by `export` and `import`.
//!
//! ```json
//! { "tasks": [...], "categories": [...], "exportDate": "2024-01-10T09:30:00.000Z", "version": "1.0" }
//! ```

use crate::models::{Category, StorageData, Task};
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub export_date: String,
    pub version: String,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Import data is empty")]
    Empty,
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid data format: tasks not found")]
    MissingTasks,
    #[error("Invalid data format: categories not found")]
    MissingCategories,
    #[error("Invalid {kind} at index {index}: {source}")]
    InvalidEntry {
        kind: &'static str,
        index: usize,
        source: serde_json::Error,
    },
}

pub fn export_document(data: &StorageData, now: DateTime<Utc>) -> ExportDocument {
    ExportDocument {
        tasks: data.tasks.clone(),
        categories: data.categories.clone(),
        export_date: timestamp::format(&now),
        version: EXPORT_VERSION.to_string(),
    }
}

pub fn to_json(document: &ExportDocument) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(document)
}

/// Suggested file name for a backup taken at `now`, in local time.
pub fn backup_file_name(now: DateTime<Utc>) -> String {
    format!(
        "taskflow-backup-{}.json",
        now.with_timezone(&chrono::Local).format("%Y-%m-%d-%H%M")
    )
}

/// Parses a backup document.
///
/// Only the presence of the `tasks` and `categories` arrays is checked;
/// individual entries decode leniently, with missing fields defaulted. An
/// entry that cannot be decoded at all rejects the whole document.
pub fn import_document(text: &str) -> Result<ExportDocument, ImportError> {
    if text.trim().is_empty() {
        return Err(ImportError::Empty);
    }

    let value: Value = serde_json::from_str(text)?;
    let Some(Value::Array(raw_tasks)) = value.get("tasks") else {
        return Err(ImportError::MissingTasks);
    };
    let Some(Value::Array(raw_categories)) = value.get("categories") else {
        return Err(ImportError::MissingCategories);
    };

    let tasks = decode_entries::<Task>(raw_tasks, "task")?;
    let categories = decode_entries::<Category>(raw_categories, "category")?;

    Ok(ExportDocument {
        tasks,
        categories,
        export_date: value
            .get("exportDate")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        version: value
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or(EXPORT_VERSION)
            .to_string(),
    })
}

fn decode_entries<T>(entries: &[Value], kind: &'static str) -> Result<Vec<T>, ImportError>
where
    T: serde::de::DeserializeOwned,
{
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value(entry.clone())
                .map_err(|source| ImportError::InvalidEntry { kind, index, source })
        })
        .collect()
}
