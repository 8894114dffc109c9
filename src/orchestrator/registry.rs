//! Per-field pipeline state, owned by the orchestrator.
//!
//! Two independent markers guard each field: `in_progress` blocks a second
//! concurrent run, `processed` blocks any further run once a terminal state
//! is reached. Records for fields that left the document are pruned.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::dom::{HostPage, NodeId};

/// Pipeline stage of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    /// Claimed, nothing run yet.
    #[default]
    Idle,
    /// Looking for the recipient.
    Extracting,
    /// Summarizing the thread.
    Summarizing,
    /// Researching the recipient.
    Researching,
    /// Classifying the conversation.
    Classifying,
    /// Generating the draft.
    Generating,
    /// Draft written into the field.
    Inserted,
    /// Draft generated but held for review.
    Held,
    /// Run abandoned.
    Failed,
}

impl FieldState {
    /// Whether the run is over.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Inserted | Self::Held | Self::Failed)
    }
}

/// Registry entry for one field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldRecord {
    /// Current stage.
    pub state: FieldState,
    /// A run finished; never process again.
    pub processed: bool,
    /// A run is in flight.
    pub in_progress: bool,
}

/// Field records keyed by node identity.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    records: Mutex<HashMap<NodeId, FieldRecord>>,
}

impl FieldRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<NodeId, FieldRecord>> {
        // Records stay consistent under poisoning: every update is a single assignment.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `field` for a run. Returns `false` when it is already
    /// processed or in progress.
    pub fn try_begin(&self, field: NodeId) -> bool {
        let mut records = self.records();
        let record = records.entry(field).or_default();
        if record.processed || record.in_progress {
            debug!(?field, state = ?record.state, "field already claimed");
            return false;
        }
        *record = FieldRecord {
            state: FieldState::Idle,
            processed: false,
            in_progress: true,
        };
        true
    }

    /// Move a claimed field to `state`.
    pub fn transition(&self, field: NodeId, state: FieldState) {
        if let Some(record) = self.records().get_mut(&field) {
            debug!(?field, from = ?record.state, to = ?state, "field transition");
            record.state = state;
        }
    }

    /// End the run in a terminal state and mark the field processed.
    pub fn finish(&self, field: NodeId, state: FieldState) {
        let mut records = self.records();
        let record = records.entry(field).or_default();
        record.state = state;
        record.in_progress = false;
        record.processed = true;
    }

    /// Whether a run is in flight or already finished for `field`.
    pub fn is_claimed(&self, field: NodeId) -> bool {
        self.records()
            .get(&field)
            .is_some_and(|r| r.processed || r.in_progress)
    }

    /// Current record for `field`.
    pub fn record(&self, field: NodeId) -> Option<FieldRecord> {
        self.records().get(&field).copied()
    }

    /// Drop records of fields no longer attached to `page`. Returns how
    /// many were removed.
    pub fn prune_detached(&self, page: &dyn HostPage) -> usize {
        let mut records = self.records();
        let before = records.len();
        records.retain(|field, _| page.is_attached(*field));
        let removed = before.saturating_sub(records.len());
        if removed > 0 {
            debug!(removed, "pruned detached fields");
        }
        removed
    }

    /// Number of tracked fields.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether no fields are tracked.
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}
