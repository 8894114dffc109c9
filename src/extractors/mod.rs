//! Read-only extraction of structured facts from the host page.
//!
//! Everything here is a pure read over [`HostPage`](crate::dom::HostPage):
//! recipient identity, the chat thread container and the composer fields
//! eligible for a draft. Lookups return `None` (or an empty list) on no
//! match; retrying is the orchestrator's job.

pub mod fields;
pub mod recipient;

pub use fields::{
    extract_chat_container, find_chat_input_fields, is_field_empty, CHAT_CONTAINER_SELECTORS,
    CHAT_INPUT_SELECTOR,
};
pub use recipient::{extract_recipient_info, RecipientExtractor};

/// Raised when no recipient could be identified after every retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not identify the recipient after {attempts} attempts")]
pub struct ExtractionError {
    /// Attempts made.
    pub attempts: u32,
}
