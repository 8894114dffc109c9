//! Capped, most-recent-first log of generated drafts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::storage::{load_typed, save_typed, KeyValueStore, StorageError, HISTORY_KEY};
use crate::types::RecipientInfo;

/// Maximum number of history entries kept.
pub const MAX_HISTORY_ENTRIES: usize = 100;

/// Snapshot of the context a draft was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryContext {
    /// Recipient at generation time.
    pub recipient: RecipientInfo,
    /// Category label used.
    pub category: String,
    /// Thread summary, when one was produced.
    #[serde(default)]
    pub chat_summary: Option<String>,
    /// Page URL the draft was generated on.
    #[serde(default)]
    pub page_url: Option<String>,
}

/// One generated draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique id.
    pub id: Uuid,
    /// Generation time.
    pub timestamp: DateTime<Utc>,
    /// Draft text.
    pub message: String,
    /// Context snapshot.
    pub context: HistoryContext,
}

impl HistoryEntry {
    /// Build an entry stamped now.
    pub fn new(message: String, context: HistoryContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            message,
            context,
        }
    }
}

/// History list stored under [`HISTORY_KEY`].
#[derive(Clone)]
pub struct HistoryLog {
    store: Arc<dyn KeyValueStore>,
    capacity: usize,
}

impl std::fmt::Debug for HistoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLog")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl HistoryLog {
    /// History with the default cap.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_capacity(store, MAX_HISTORY_ENTRIES)
    }

    /// History with a custom cap.
    pub fn with_capacity(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self { store, capacity }
    }

    /// All entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on read or shape failure.
    pub fn entries(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        let entries: Option<Vec<HistoryEntry>> = load_typed(self.store.as_ref(), HISTORY_KEY)?;
        Ok(entries.unwrap_or_default())
    }

    /// Record an entry and trim the list to capacity, dropping the oldest.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on read or write failure.
    pub fn append(&self, entry: HistoryEntry) -> Result<(), StorageError> {
        let mut entries = self.entries()?;
        entries.insert(0, entry);
        // Stable sort keeps insertion order among equal timestamps.
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(self.capacity);
        debug!(len = entries.len(), "history updated");
        save_typed(self.store.as_ref(), HISTORY_KEY, &entries)
    }

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on write failure.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(HISTORY_KEY)
    }
}
