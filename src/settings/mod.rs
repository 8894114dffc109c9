//! Persisted user settings: display name, categories, preferences and
//! credentials entered through the settings surface.
//!
//! The category list is never empty: an empty or unreadable list reads
//! back as [`DEFAULT_CATEGORIES`]. Preferences are created lazily with
//! defaults the first time a category is asked for, one set per category.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::storage::{
    load_typed, save_typed, KeyValueStore, StorageError, CATEGORIES_KEY, CREDENTIALS_KEY,
    DISPLAY_NAME_KEY, PREFERENCES_KEY,
};
use crate::types::{InteractionCategory, PreferenceSet, DEFAULT_CATEGORIES};

/// Errors from settings operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Underlying storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Category label is blank.
    #[error("category name must not be empty")]
    EmptyCategory,
    /// Category already exists (case-insensitive).
    #[error("category '{0}' already exists")]
    DuplicateCategory(String),
    /// Category is not in the list.
    #[error("category '{0}' does not exist")]
    UnknownCategory(String),
    /// Deleting would leave the list empty.
    #[error("cannot delete the last remaining category")]
    LastCategory,
}

/// Settings facade over a key-value store.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore").finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Wrap a store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Saved display name, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Storage`] on read failure.
    pub fn display_name(&self) -> Result<Option<String>, SettingsError> {
        let name: Option<String> = load_typed(self.store.as_ref(), DISPLAY_NAME_KEY)?;
        Ok(name.filter(|n| !n.trim().is_empty()))
    }

    /// Save the display name.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Storage`] on write failure.
    pub fn set_display_name(&self, name: &str) -> Result<(), SettingsError> {
        save_typed(self.store.as_ref(), DISPLAY_NAME_KEY, &name.trim())?;
        Ok(())
    }

    /// Ordered category list, falling back to defaults when empty or corrupt.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Storage`] only on I/O failure; shape errors
    /// fall back to defaults.
    pub fn categories(&self) -> Result<Vec<InteractionCategory>, SettingsError> {
        let stored: Option<Vec<String>> =
            match load_typed(self.store.as_ref(), CATEGORIES_KEY) {
                Ok(v) => v,
                Err(StorageError::Shape { reason, .. }) => {
                    warn!(reason, "stored category list is corrupt, using defaults");
                    None
                }
                Err(e) => return Err(e.into()),
            };

        let categories: Vec<InteractionCategory> = stored
            .unwrap_or_default()
            .iter()
            .map(InteractionCategory::new)
            .filter(|c| !c.as_str().is_empty())
            .collect();

        if categories.is_empty() {
            return Ok(default_categories());
        }
        Ok(categories)
    }

    /// Append a category.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::EmptyCategory`] when the label has no
    /// letters or digits, or [`SettingsError::DuplicateCategory`] when its
    /// normalized key matches an existing category.
    pub fn add_category(&self, label: &str) -> Result<InteractionCategory, SettingsError> {
        let category = InteractionCategory::new(label);
        let key = category.key();
        if key.is_empty() {
            return Err(SettingsError::EmptyCategory);
        }
        let mut categories = self.categories()?;
        // Preferences are stored by key, so labels that normalize alike collide.
        if categories.iter().any(|c| c.key() == key) {
            return Err(SettingsError::DuplicateCategory(category.to_string()));
        }
        categories.push(category.clone());
        self.save_categories(&categories)?;
        info!(category = %category, "category added");
        Ok(category)
    }

    /// Remove a category and its preferences.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownCategory`] or
    /// [`SettingsError::LastCategory`].
    pub fn delete_category(&self, label: &str) -> Result<(), SettingsError> {
        let mut categories = self.categories()?;
        let position = categories
            .iter()
            .position(|c| c.as_str().eq_ignore_ascii_case(label.trim()))
            .ok_or_else(|| SettingsError::UnknownCategory(label.trim().to_owned()))?;
        if categories.len() == 1 {
            return Err(SettingsError::LastCategory);
        }
        let removed = categories.remove(position);
        self.save_categories(&categories)?;

        let mut prefs = self.preference_map()?;
        if prefs.remove(&removed.key()).is_some() {
            save_typed(self.store.as_ref(), PREFERENCES_KEY, &prefs)?;
        }
        info!(category = %removed, "category deleted");
        Ok(())
    }

    /// Preferences for a category, created and persisted with defaults on
    /// first access.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Storage`] on I/O failure.
    pub fn preferences_for(
        &self,
        category: &InteractionCategory,
    ) -> Result<PreferenceSet, SettingsError> {
        let mut prefs = self.preference_map()?;
        let key = category.key();
        if let Some(existing) = prefs.get(&key) {
            return Ok(existing.clone());
        }
        let created = PreferenceSet::default();
        prefs.insert(key.clone(), created.clone());
        save_typed(self.store.as_ref(), PREFERENCES_KEY, &prefs)?;
        debug!(key, "created default preferences");
        Ok(created)
    }

    /// Replace the preferences for a category.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Storage`] on I/O failure.
    pub fn set_preferences(
        &self,
        category: &InteractionCategory,
        preferences: PreferenceSet,
    ) -> Result<(), SettingsError> {
        let mut prefs = self.preference_map()?;
        prefs.insert(category.key(), preferences);
        save_typed(self.store.as_ref(), PREFERENCES_KEY, &prefs)?;
        Ok(())
    }

    /// Every stored preference set, keyed by normalized category key.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Storage`] on I/O failure. A corrupt map
    /// reads as empty.
    pub fn preference_map(&self) -> Result<BTreeMap<String, PreferenceSet>, SettingsError> {
        match load_typed(self.store.as_ref(), PREFERENCES_KEY) {
            Ok(map) => Ok(map.unwrap_or_default()),
            Err(StorageError::Shape { reason, .. }) => {
                warn!(reason, "stored preferences are corrupt, ignoring");
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Credentials saved through the settings surface.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Storage`] on I/O failure.
    pub fn stored_credentials(&self) -> Result<BTreeMap<String, String>, SettingsError> {
        let creds: Option<BTreeMap<String, String>> =
            load_typed(self.store.as_ref(), CREDENTIALS_KEY)?;
        Ok(creds.unwrap_or_default())
    }

    /// Save one credential value.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Storage`] on I/O failure.
    pub fn store_credential(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut creds = self.stored_credentials()?;
        creds.insert(key.to_owned(), value.to_owned());
        save_typed(self.store.as_ref(), CREDENTIALS_KEY, &creds)?;
        Ok(())
    }

    fn save_categories(&self, categories: &[InteractionCategory]) -> Result<(), SettingsError> {
        let labels: Vec<&str> = categories.iter().map(InteractionCategory::as_str).collect();
        save_typed(self.store.as_ref(), CATEGORIES_KEY, &labels)?;
        Ok(())
    }
}

/// Default category list.
pub fn default_categories() -> Vec<InteractionCategory> {
    DEFAULT_CATEGORIES
        .iter()
        .map(InteractionCategory::new)
        .collect()
}
