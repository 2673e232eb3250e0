use crate::models::{
    default_categories, same_category_name, Category, CategoryError, StorageData, StorageError, DEFAULT_CATEGORY_NAME,
};
use crate::storage::Storage;
use crate::timestamp;

/// Category mutations over a [`Storage`].
///
/// Tasks refer to categories by name, so renames and deletions rewrite the
/// affected tasks in the same save.
pub struct CategoryManager<'a> {
    storage: &'a dyn Storage,
}

impl<'a> CategoryManager<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    pub fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        Ok(self.storage.load()?.categories)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Category>, StorageError> {
        Ok(self
            .storage
            .load()?
            .categories
            .into_iter()
            .find(|c| same_category_name(&c.name, name)))
    }

    pub fn add_category(&mut self, name: &str, color: &str, icon: &str) -> Result<Category, CategoryError> {
        let name = name.trim();
        let category = Category::new(name.to_string(), color.to_string(), icon.to_string())?;
        let mut data = self.storage.load()?;

        if data.categories.iter().any(|c| same_category_name(&c.name, name)) {
            return Err(CategoryError::DuplicateName(name.to_string()));
        }

        data.categories.push(category);
        data.assign_category_ids();
        let category = data.categories[data.categories.len() - 1].clone();
        self.save(&mut data)?;
        log::info!("Added category {} ({})", category.name, category.id);
        Ok(category)
    }

    /// Renames a category and every task filed under it. Returns the number
    /// of tasks moved.
    pub fn rename_category(&mut self, old_name: &str, new_name: &str) -> Result<usize, CategoryError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(CategoryError::EmptyName);
        }

        let mut data = self.storage.load()?;
        let position = data
            .categories
            .iter()
            .position(|c| same_category_name(&c.name, old_name))
            .ok_or_else(|| CategoryError::NotFound(old_name.to_string()))?;

        let current = data.categories[position].name.clone();
        if data
            .categories
            .iter()
            .enumerate()
            .any(|(i, c)| i != position && same_category_name(&c.name, new_name))
        {
            return Err(CategoryError::DuplicateName(new_name.to_string()));
        }

        data.categories[position].name = new_name.to_string();
        let moved = reassign(&mut data, &current, new_name);
        self.save(&mut data)?;
        log::info!("Renamed category {} to {} ({} tasks)", current, new_name, moved);
        Ok(moved)
    }

    /// Deletes a category. Its tasks move to `reassign_to`, or to the
    /// fallback category when none is given. Returns the number of tasks moved.
    pub fn delete_category(&mut self, name: &str, reassign_to: Option<&str>) -> Result<usize, CategoryError> {
        let mut data = self.storage.load()?;
        let position = data
            .categories
            .iter()
            .position(|c| same_category_name(&c.name, name))
            .ok_or_else(|| CategoryError::NotFound(name.to_string()))?;

        let target = match reassign_to {
            Some(target) => data
                .categories
                .iter()
                .enumerate()
                .find(|(i, c)| *i != position && same_category_name(&c.name, target))
                .map(|(_, c)| c.name.clone())
                .ok_or_else(|| CategoryError::NotFound(target.to_string()))?,
            None => DEFAULT_CATEGORY_NAME.to_string(),
        };

        let removed = data.categories.remove(position);
        let moved = reassign(&mut data, &removed.name, &target);
        self.save(&mut data)?;
        log::info!("Deleted category {} ({} tasks moved to {})", removed.name, moved, target);
        Ok(moved)
    }

    /// Restores the built-in categories. Tasks are left as they are.
    pub fn reset_to_defaults(&mut self) -> Result<(), StorageError> {
        let mut data = self.storage.load()?;
        data.categories = default_categories();
        self.save(&mut data)
    }

    fn save(&self, data: &mut StorageData) -> Result<(), StorageError> {
        data.last_sync = timestamp::now();
        self.storage.save(data)
    }
}

fn reassign(data: &mut StorageData, from: &str, to: &str) -> usize {
    let now = timestamp::now();
    let mut moved = 0;
    for task in data.tasks.iter_mut().filter(|t| t.category == from) {
        task.category = to.to_string();
        task.updated_at = now.max(task.created_at);
        moved += 1;
    }
    moved
}
