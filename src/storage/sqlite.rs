use super::migrations;
use super::{Storage, StorageError};
use crate::models::{Category, Priority, StorageData, SubTask, Task};
use crate::timestamp;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const TASK_COLUMNS: &str = "id, title, description, completed, priority, due_date, created_at, updated_at, \
     category, progress, tags, reminder, reminder_date, estimated_time, actual_time, subtasks";

/// SQLite backend. Rows carry a `position` column so a load returns
/// tasks and categories in the order they were saved.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let raw = path.as_ref().to_string_lossy();
        let db_path = PathBuf::from(shellexpand::tilde(&raw).into_owned());
        if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let mut conn = Connection::open(&db_path).map_err(|e| {
            StorageError::Storage(format!("cannot open {}: {e}", db_path.display()))
        })?;
        migrations::init_schema(&conn)?;
        migrations::apply_migrations(&mut conn)?;
        log::debug!("opened SQLite store at {}", db_path.display());

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Storage("SQLite connection poisoned".to_string()))
    }
}

fn last_sync(conn: &Connection) -> Result<Option<DateTime<Utc>>, StorageError> {
    Ok(conn
        .query_row("SELECT last_sync FROM sync_state WHERE id = 1", [], |row| parse_timestamp(row, 0))
        .optional()?)
}

fn select_all<T>(
    conn: &Connection,
    sql: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StorageError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map)?;
    Ok(rows.collect::<rusqlite::Result<Vec<T>>>()?)
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let priority: String = row.get(4)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        completed: row.get(3)?,
        priority: priority.parse::<Priority>().map_err(|e| conversion_error(4, e))?,
        due_date: parse_optional_timestamp(row, 5)?,
        created_at: parse_timestamp(row, 6)?,
        updated_at: parse_timestamp(row, 7)?,
        category: row.get(8)?,
        progress: row.get(9)?,
        tags: parse_json(row, 10)?,
        reminder: row.get(11)?,
        reminder_date: parse_optional_timestamp(row, 12)?,
        estimated_time: row.get(13)?,
        actual_time: row.get(14)?,
        subtasks: parse_json::<Vec<SubTask>>(row, 15)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get("id")?,
        name: row.get("name")?,
        color: row.get("color")?,
        icon: row.get("icon")?,
    })
}

impl Storage for SqliteStorage {
    fn save(&self, data: &StorageData) -> Result<(), StorageError> {
        data.validate()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute_batch("DELETE FROM tasks; DELETE FROM categories;")?;

        for (position, category) in data.categories.iter().enumerate() {
            tx.execute(
                "INSERT INTO categories (id, name, color, icon, position) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    category.id,
                    category.name,
                    category.color,
                    category.icon,
                    position as i64,
                ],
            )?;
        }

        for (position, task) in data.tasks.iter().enumerate() {
            tx.execute(
                &format!(
                    "INSERT INTO tasks ({}, position) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                    TASK_COLUMNS
                ),
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.completed,
                    task.priority.as_str(),
                    task.due_date.as_ref().map(timestamp::format),
                    timestamp::format(&task.created_at),
                    timestamp::format(&task.updated_at),
                    task.category,
                    task.progress,
                    serde_json::to_string(&task.tags)?,
                    task.reminder,
                    task.reminder_date.as_ref().map(timestamp::format),
                    task.estimated_time,
                    task.actual_time,
                    serde_json::to_string(&task.subtasks)?,
                    position as i64,
                ],
            )?;
        }

        tx.execute(
            "INSERT INTO sync_state (id, last_sync) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET last_sync = excluded.last_sync",
            params![timestamp::format(&data.last_sync)],
        )?;

        tx.commit()?;
        log::debug!("replaced SQLite contents with {} tasks", data.tasks.len());
        Ok(())
    }

    fn load(&self) -> Result<StorageData, StorageError> {
        let conn = self.lock()?;

        // No sync row means nothing was ever saved here.
        let Some(last_sync) = last_sync(&conn)? else {
            return Ok(StorageData::new());
        };

        let tasks = select_all(
            &conn,
            &format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY position"),
            task_from_row,
        )?;
        let categories = select_all(
            &conn,
            "SELECT id, name, color, icon FROM categories ORDER BY position",
            category_from_row,
        )?;

        Ok(StorageData {
            version: migrations::get_current_version(&conn)? as u32,
            tasks,
            categories,
            last_sync,
        })
    }
}

fn conversion_error<E>(idx: usize, error: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => parse_timestamp(row, idx).map(Some),
        None => Ok(None),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}
