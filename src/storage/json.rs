use super::{Storage, StorageError};
use crate::models::StorageData;
use std::path::{Path, PathBuf};

pub struct JsonStorage {
    path: PathBuf,
}

impl JsonStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_string_lossy();
        Self {
            path: PathBuf::from(shellexpand::tilde(&path).to_string()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl JsonStorage {
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read_snapshot(path: &Path) -> Result<Option<StorageData>, StorageError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&contents)?))
    }
}

impl Storage for JsonStorage {
    /// Writes the snapshot beside the target, checks it parses back with
    /// the same task ids, then renames it over the previous file.
    fn save(&self, data: &StorageData) -> Result<(), StorageError> {
        data.validate()?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let staging = self.staging_path();
        std::fs::write(&staging, serde_json::to_vec_pretty(data)?)?;

        let written = Self::read_snapshot(&staging)?.unwrap_or_default();
        let same_tasks = written.tasks.iter().map(|t| &t.id).eq(data.tasks.iter().map(|t| &t.id));
        if !same_tasks || written.categories.len() != data.categories.len() {
            let _ = std::fs::remove_file(&staging);
            return Err(StorageError::Storage(format!(
                "{} did not read back as written",
                staging.display()
            )));
        }
        std::fs::rename(&staging, &self.path)?;

        log::debug!(
            "wrote {} tasks, {} categories -> {}",
            data.tasks.len(),
            data.categories.len(),
            self.path.display()
        );
        Ok(())
    }

    fn load(&self) -> Result<StorageData, StorageError> {
        match Self::read_snapshot(&self.path)? {
            Some(data) => {
                data.validate()?;
                Ok(data)
            }
            None => Ok(StorageData::new()),
        }
    }
}
