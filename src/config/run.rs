//! Per-run configuration resolved through a single provider interface.
//!
//! Each pipeline run asks its [`ConfigProvider`] once for a [`RunConfig`]
//! and passes it down explicitly. [`LayeredConfigProvider`] resolves every
//! value from the hand-provisioned local override first and the settings
//! store second.

use std::collections::BTreeMap;

use tracing::debug;

use crate::credentials::Credentials;
use crate::settings::{default_categories, SettingsError, SettingsStore};
use crate::types::{InteractionCategory, PreferenceSet};

/// Configuration snapshot for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Local user's display name (may be empty).
    pub display_name: String,
    /// Ordered, never-empty category list.
    pub categories: Vec<InteractionCategory>,
    /// Preferences keyed by normalized category key.
    pub preferences: BTreeMap<String, PreferenceSet>,
    /// Merged credentials.
    pub credentials: Credentials,
}

impl RunConfig {
    /// Defaults used when stored settings cannot be read: no display name,
    /// the default categories, default preferences and no credentials.
    pub fn fallback() -> Self {
        Self {
            display_name: String::new(),
            categories: default_categories(),
            preferences: BTreeMap::new(),
            credentials: Credentials::default(),
        }
    }

    /// Preferences for `category`, defaults when none are stored.
    pub fn preferences_for(&self, category: &InteractionCategory) -> PreferenceSet {
        self.preferences
            .get(&category.key())
            .cloned()
            .unwrap_or_default()
    }
}

/// Source of [`RunConfig`] snapshots.
pub trait ConfigProvider: Send + Sync {
    /// Resolve the configuration for a new run.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when stored settings cannot be read.
    fn resolve(&self) -> Result<RunConfig, SettingsError>;
}

/// Local override first, settings store second.
#[derive(Debug, Clone)]
pub struct LayeredConfigProvider {
    local_credentials: Credentials,
    local_display_name: Option<String>,
    settings: SettingsStore,
}

impl LayeredConfigProvider {
    /// Combine the local override with the settings store.
    pub fn new(
        local_credentials: Credentials,
        local_display_name: Option<String>,
        settings: SettingsStore,
    ) -> Self {
        Self {
            local_credentials,
            local_display_name: local_display_name.filter(|n| !n.trim().is_empty()),
            settings,
        }
    }
}

impl ConfigProvider for LayeredConfigProvider {
    fn resolve(&self) -> Result<RunConfig, SettingsError> {
        let display_name = match &self.local_display_name {
            Some(name) => name.trim().to_owned(),
            None => self.settings.display_name()?.unwrap_or_default(),
        };

        let categories = self.settings.categories()?;
        for category in &categories {
            // Creates and persists defaults for categories seen for the first time.
            self.settings.preferences_for(category)?;
        }
        let preferences = self.settings.preference_map()?;

        let stored = Credentials::from_map(self.settings.stored_credentials()?);
        let credentials = self.local_credentials.clone().or_else(&stored);

        debug!(
            categories = categories.len(),
            completion = credentials.completion_key().is_some(),
            search = credentials.search_pair().is_some(),
            cache = credentials.cache_pair().is_some(),
            "run config resolved"
        );

        Ok(RunConfig {
            display_name,
            categories,
            preferences,
            credentials,
        })
    }
}

/// Fixed configuration, for tests and one-shot tools.
#[derive(Debug, Clone)]
pub struct StaticConfigProvider(pub RunConfig);

impl ConfigProvider for StaticConfigProvider {
    fn resolve(&self) -> Result<RunConfig, SettingsError> {
        Ok(self.0.clone())
    }
}
