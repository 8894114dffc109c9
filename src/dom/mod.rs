//! Host page access.
//!
//! The pipeline never touches markup directly; it goes through the
//! [`HostPage`] trait, which exposes read queries over the current document
//! and a narrow editing surface for the composer field. The trait has no
//! way to click, submit or send anything.
//!
//! [`snapshot::SnapshotPage`] implements it over an HTML snapshot.

use tokio::sync::broadcast;

pub mod snapshot;

pub use snapshot::SnapshotPage;

/// Identity of an element in a specific document generation.
///
/// Replacing the document bumps the generation, so ids handed out for the
/// previous document stop resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    /// Document generation the id belongs to.
    pub generation: u64,
    /// Element index in document order.
    pub index: usize,
}

/// Change notifications emitted by the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// Part of the element tree changed.
    Mutated,
    /// The page moved to a new URL without a full reload.
    Navigated(String),
}

/// Errors raised by page access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Selector text could not be parsed.
    #[error("invalid selector '{selector}'")]
    Selector {
        /// Offending selector.
        selector: String,
    },
    /// Node id is from an older document or out of range.
    #[error("node {0:?} is no longer attached")]
    Detached(NodeId),
    /// Node cannot be edited.
    #[error("node {0:?} is not editable")]
    NotEditable(NodeId),
    /// Page state is unusable (e.g. poisoned lock).
    #[error("page unavailable: {0}")]
    Unavailable(String),
}

/// Read and edit access to the host document.
pub trait HostPage: Send + Sync {
    /// Current page URL.
    fn url(&self) -> String;

    /// All elements matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Selector`] when the selector is invalid.
    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError>;

    /// Descendants of `scope` matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`DomError`] for invalid selectors or detached scopes.
    fn query_within(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError>;

    /// Whether `node` matches `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`DomError`] for invalid selectors or detached nodes.
    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, DomError>;

    /// Rendered text of `node` (including any injected content).
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Detached`] for stale ids.
    fn text(&self, node: NodeId) -> Result<String, DomError>;

    /// Inner markup of `node` (including any injected content).
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Detached`] for stale ids.
    fn inner_html(&self, node: NodeId) -> Result<String, DomError>;

    /// Outer markup of `node`.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Detached`] for stale ids.
    fn outer_html(&self, node: NodeId) -> Result<String, DomError>;

    /// Attribute value.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Detached`] for stale ids.
    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, DomError>;

    /// Every attribute as `(name, value)` pairs, in source order.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Detached`] for stale ids.
    fn attributes(&self, node: NodeId) -> Result<Vec<(String, String)>, DomError>;

    /// Parent element, `None` at the root.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Detached`] for stale ids.
    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, DomError>;

    /// Whether `node` is rendered (not hidden by itself or an ancestor).
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Detached`] for stale ids.
    fn is_visible(&self, node: NodeId) -> Result<bool, DomError>;

    /// Whether `node` still belongs to the current document.
    fn is_attached(&self, node: NodeId) -> bool;

    /// Give keyboard focus to `node`.
    ///
    /// # Errors
    ///
    /// Returns [`DomError`] when the node is stale or not editable.
    fn focus(&self, node: NodeId) -> Result<(), DomError>;

    /// Replace the editable content with one paragraph per line.
    ///
    /// # Errors
    ///
    /// Returns [`DomError`] when the node is stale or not editable.
    fn replace_paragraphs(&self, node: NodeId, lines: &[String]) -> Result<(), DomError>;

    /// Append text at the end of the editable content.
    ///
    /// # Errors
    ///
    /// Returns [`DomError`] when the node is stale or not editable.
    fn append_text(&self, node: NodeId, text: &str) -> Result<(), DomError>;

    /// Delete the last `count` characters of the editable content.
    ///
    /// # Errors
    ///
    /// Returns [`DomError`] when the node is stale or not editable.
    fn delete_trailing(&self, node: NodeId, count: usize) -> Result<(), DomError>;

    /// Fire an input-change notification on `node`.
    ///
    /// # Errors
    ///
    /// Returns [`DomError`] when the node is stale.
    fn dispatch_input(&self, node: NodeId) -> Result<(), DomError>;

    /// Subscribe to page change notifications.
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;
}

/// Walk from `node` towards the root, returning the first ancestor (or the
/// node itself) matching `selector`.
///
/// # Errors
///
/// Propagates [`DomError`] from the page.
pub fn closest(
    page: &dyn HostPage,
    node: NodeId,
    selector: &str,
) -> Result<Option<NodeId>, DomError> {
    let mut current = Some(node);
    while let Some(candidate) = current {
        if page.matches(candidate, selector)? {
            return Ok(Some(candidate));
        }
        current = page.parent(candidate)?;
    }
    Ok(None)
}

/// Collapse runs of whitespace and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
