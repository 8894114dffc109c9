//! Recipient identity extraction.
//!
//! Strategies run in a fixed priority order and the first one producing a
//! valid name wins:
//! 1. name selectors, in list order
//! 2. headings inside the conversation container around a composer form
//! 3. visible headings that precede the first composer form in the document
//!
//! Within a strategy, candidates are taken in document order. A later
//! selector is never consulted once an earlier one yields a valid name, even
//! if its match would read as a "better" name.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::fields::{composition_forms, conversation_container};
use crate::dom::{normalize_whitespace, HostPage, NodeId};
use crate::types::RecipientInfo;

/// Name selectors, highest priority first.
pub const NAME_SELECTORS: &[&str] = &[
    ".msg-entity-lockup__entity-title",
    ".msg-overlay-bubble-header__title",
    ".msg-thread__link-to-profile .msg-entity-lockup__entity-title",
    ".profile-card-one-to-one__profile-link",
    ".msg-s-message-group__profile-link",
    ".msg-s-message-group__name",
    ".artdeco-entity-lockup__title",
];

/// Byline selectors, highest priority first.
pub const BYLINE_SELECTORS: &[&str] = &[
    ".msg-entity-lockup__entity-info",
    ".msg-overlay-bubble-header__subtitle",
    ".profile-card-one-to-one__headline",
    ".msg-s-profile-card__headline",
    ".artdeco-entity-lockup__subtitle",
];

/// Headings scanned by the fallback strategies.
pub const HEADING_SELECTOR: &str = "h1, h2, h3, h4";

/// UI strings that are never names (compared case-insensitively).
pub const UI_LABEL_EXACT: &[&str] = &[
    "messaging",
    "messages",
    "new message",
    "inbox",
    "focused",
    "other",
    "unread",
    "archived",
    "my network",
    "home",
    "jobs",
    "notifications",
    "me",
    "linkedin",
    "conversation",
    "compose message",
    "write a message",
    "active now",
    "online",
    "offline",
    "sponsored",
    "premium",
];

/// Fragments that mark a candidate as UI chrome wherever they appear.
pub const UI_LABEL_FRAGMENTS: &[&str] = &[
    "message",
    "conversation",
    "notification",
    "search",
    "settings",
    "view profile",
    "see all",
    "close your",
    "minimize",
    "maximize",
    "attach",
    "emoji",
    "status is",
    "typing",
];

/// Minimum accepted name length in characters.
pub const MIN_NAME_CHARS: usize = 2;
/// Maximum accepted name length in characters.
pub const MAX_NAME_CHARS: usize = 80;

static NAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[\p{L}][\p{L} .'\-]*$").ok());

/// Whether `text` matches a known UI string, exactly or as a fragment.
pub fn looks_like_ui_label(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    UI_LABEL_EXACT.iter().any(|label| lower == *label)
        || UI_LABEL_FRAGMENTS.iter().any(|frag| lower.contains(frag))
}

/// Whether `text` reads like a person's name.
///
/// Letters plus spaces, hyphens, apostrophes and periods, within the length
/// bounds, and not all upper case unless at most three characters long.
pub fn looks_like_name(text: &str) -> bool {
    let len = text.chars().count();
    if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len) {
        return false;
    }
    let Some(pattern) = NAME_PATTERN.as_ref() else {
        return false;
    };
    if !pattern.is_match(text) {
        return false;
    }
    let has_lower = text.chars().any(char::is_lowercase);
    has_lower || len <= 3
}

/// Normalize a candidate and accept it when it is a plausible name.
pub fn validate_name(raw: &str) -> Option<String> {
    let candidate = normalize_whitespace(raw);
    if candidate.is_empty() || looks_like_ui_label(&candidate) {
        return None;
    }
    looks_like_name(&candidate).then_some(candidate)
}

/// Configurable recipient extractor. [`Default`] uses [`NAME_SELECTORS`]
/// and [`BYLINE_SELECTORS`].
#[derive(Debug, Clone)]
pub struct RecipientExtractor {
    name_selectors: Vec<String>,
    byline_selectors: Vec<String>,
}

impl Default for RecipientExtractor {
    fn default() -> Self {
        Self::new(
            NAME_SELECTORS.iter().map(|s| (*s).to_owned()).collect(),
            BYLINE_SELECTORS.iter().map(|s| (*s).to_owned()).collect(),
        )
    }
}

impl RecipientExtractor {
    /// Extractor with explicit selector lists, each in priority order.
    pub fn new(name_selectors: Vec<String>, byline_selectors: Vec<String>) -> Self {
        Self {
            name_selectors,
            byline_selectors,
        }
    }

    /// Recipient for the current page, `None` when no valid name is found.
    /// The byline is optional and never decides the outcome.
    pub fn extract(&self, page: &dyn HostPage) -> Option<RecipientInfo> {
        let name = self.extract_name(page)?;
        let byline = self.extract_byline(page);
        debug!(name, byline = byline.as_deref(), "recipient extracted");
        Some(RecipientInfo { name, byline })
    }

    /// Run the name strategies in order.
    pub fn extract_name(&self, page: &dyn HostPage) -> Option<String> {
        self.name_from_selectors(page)
            .or_else(|| name_from_conversation_container(page))
            .or_else(|| name_from_headings_above_form(page))
    }

    /// First non-empty byline from the byline selectors.
    pub fn extract_byline(&self, page: &dyn HostPage) -> Option<String> {
        self.byline_selectors.iter().find_map(|selector| {
            page.query_all(selector)
                .ok()?
                .into_iter()
                .filter_map(|node| page.text(node).ok())
                .map(|t| normalize_whitespace(&t))
                .find(|t| !t.is_empty())
        })
    }

    fn name_from_selectors(&self, page: &dyn HostPage) -> Option<String> {
        for selector in &self.name_selectors {
            let nodes = match page.query_all(selector) {
                Ok(nodes) => nodes,
                Err(e) => {
                    debug!(selector, error = %e, "skipping name selector");
                    continue;
                }
            };
            if let Some(name) = first_valid_name(page, &nodes) {
                debug!(selector, name, "name selector matched");
                return Some(name);
            }
        }
        None
    }
}

/// Recipient using the default selector lists.
pub fn extract_recipient_info(page: &dyn HostPage) -> Option<RecipientInfo> {
    RecipientExtractor::default().extract(page)
}

fn first_valid_name(page: &dyn HostPage, nodes: &[NodeId]) -> Option<String> {
    nodes
        .iter()
        .filter_map(|&node| page.text(node).ok())
        .find_map(|text| validate_name(&text))
}

fn name_from_conversation_container(page: &dyn HostPage) -> Option<String> {
    composition_forms(page).into_iter().find_map(|form| {
        let container = conversation_container(page, form)?;
        let headings = page.query_within(container, HEADING_SELECTOR).ok()?;
        let name = first_valid_name(page, &headings)?;
        debug!(name, "name found in conversation container");
        Some(name)
    })
}

fn name_from_headings_above_form(page: &dyn HostPage) -> Option<String> {
    let form = composition_forms(page).into_iter().next()?;
    let headings = page.query_all(HEADING_SELECTOR).ok()?;
    let above: Vec<NodeId> = headings
        .into_iter()
        .filter(|h| h.index < form.index)
        .filter(|&h| page.is_visible(h).unwrap_or(false))
        .collect();
    let name = first_valid_name(page, &above)?;
    debug!(name, "name found in heading above composer");
    Some(name)
}
