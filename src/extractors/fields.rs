//! Composer field discovery, chat container lookup and emptiness checks.

use tracing::debug;

use crate::dom::{closest, HostPage, NodeId};

/// Editable composer element.
pub const CHAT_INPUT_SELECTOR: &str = "[contenteditable='true'][role='textbox']";

/// Controls that may act as the send action inside a composer form.
const SEND_CONTROL_SELECTOR: &str = "button, [role='button'], input[type='submit']";

/// Chat thread containers, most current markup first.
pub const CHAT_CONTAINER_SELECTORS: &[&str] = &[
    ".msg-s-message-list",
    ".msg-s-message-list-container",
    ".msg-overlay-conversation-bubble__content-wrapper",
    "[role='log']",
    ".msg-thread",
];

/// How far up from a composer form the conversation container may sit.
pub const MAX_CONTAINER_DEPTH: usize = 10;

/// Attribute keyword that marks a conversation container.
const CONVERSATION_KEYWORD: &str = "conversation";

/// Markup an empty content-editable composer may carry.
const EMPTY_REPRESENTATIONS: &[&str] = &[
    "",
    "<br>",
    "<p></p>",
    "<p><br></p>",
    "<div><br></div>",
    "<p>\u{200b}</p>",
];

/// Composer fields inside a form that also offers a send control, in
/// document order. `exclude` filters fields the caller already handled.
pub fn find_chat_input_fields(
    page: &dyn HostPage,
    exclude: impl Fn(NodeId) -> bool,
) -> Vec<NodeId> {
    let candidates = match page.query_all(CHAT_INPUT_SELECTOR) {
        Ok(found) => found,
        Err(e) => {
            debug!(error = %e, "composer query failed");
            return Vec::new();
        }
    };

    candidates
        .into_iter()
        .filter(|&field| !exclude(field))
        .filter(|&field| match closest(page, field, "form") {
            Ok(Some(form)) => has_send_control(page, form),
            _ => false,
        })
        .collect()
}

/// Forms containing a composer, in document order.
pub fn composition_forms(page: &dyn HostPage) -> Vec<NodeId> {
    let Ok(forms) = page.query_all("form") else {
        return Vec::new();
    };
    forms
        .into_iter()
        .filter(|&form| {
            page.query_within(form, CHAT_INPUT_SELECTOR)
                .is_ok_and(|fields| !fields.is_empty())
        })
        .collect()
}

/// Whether `form` contains something that would send the message.
pub fn has_send_control(page: &dyn HostPage, form: NodeId) -> bool {
    let Ok(controls) = page.query_within(form, SEND_CONTROL_SELECTOR) else {
        return false;
    };
    controls.into_iter().any(|control| {
        let attr = |name: &str| {
            page.attribute(control, name)
                .ok()
                .flatten()
                .unwrap_or_default()
                .to_lowercase()
        };
        attr("type") == "submit"
            || attr("class").contains("send")
            || attr("aria-label").contains("send")
            || page
                .text(control)
                .is_ok_and(|t| t.trim().eq_ignore_ascii_case("send"))
    })
}

/// Nearest ancestor (up to [`MAX_CONTAINER_DEPTH`] levels above `start`)
/// whose attributes mention a conversation.
pub fn conversation_container(page: &dyn HostPage, start: NodeId) -> Option<NodeId> {
    let mut current = page.parent(start).ok().flatten();
    for _ in 0..MAX_CONTAINER_DEPTH {
        let node = current?;
        let mentions_conversation = page.attributes(node).is_ok_and(|attrs| {
            attrs.iter().any(|(name, value)| {
                name.to_lowercase().contains(CONVERSATION_KEYWORD)
                    || value.to_lowercase().contains(CONVERSATION_KEYWORD)
            })
        });
        if mentions_conversation {
            return Some(node);
        }
        current = page.parent(node).ok().flatten();
    }
    None
}

/// Chat thread container for `field` (or for the page when `field` is
/// `None`): the conversation container enclosing the field first, then the
/// document-wide selector list in order.
pub fn extract_chat_container(page: &dyn HostPage, field: Option<NodeId>) -> Option<NodeId> {
    if let Some(scope) = field
        .and_then(|f| closest(page, f, "form").ok().flatten().or(Some(f)))
        .and_then(|start| conversation_container(page, start))
    {
        for selector in CHAT_CONTAINER_SELECTORS {
            if let Some(found) = page
                .query_within(scope, selector)
                .ok()
                .and_then(|nodes| nodes.into_iter().next())
            {
                debug!(selector, "chat container found inside conversation");
                return Some(found);
            }
        }
    }

    for selector in CHAT_CONTAINER_SELECTORS {
        if let Some(found) = page
            .query_all(selector)
            .ok()
            .and_then(|nodes| nodes.into_iter().next())
        {
            debug!(selector, "chat container found");
            return Some(found);
        }
    }
    None
}

/// Whether the composer holds no user content.
pub fn is_field_empty(page: &dyn HostPage, field: NodeId) -> bool {
    let text_empty = page
        .text(field)
        .map(|t| t.chars().all(|c| c.is_whitespace() || c == '\u{200b}'))
        .unwrap_or(false);
    if text_empty {
        return true;
    }
    page.inner_html(field)
        .map(|html| {
            let compact: String = html.split_whitespace().collect();
            EMPTY_REPRESENTATIONS.contains(&compact.as_str())
        })
        .unwrap_or(false)
}
