//! Writes a draft into a composer field.
//!
//! The field content is replaced with one paragraph per line and an input
//! notification is fired. Host editors sometimes ignore a single write, so
//! the write is followed by a perturbation: append one character, notify,
//! delete it, notify again. Nothing here can send the message; the page
//! interface has no such operation.

use tracing::{debug, info, warn};

use crate::dom::{normalize_whitespace, DomError, HostPage, NodeId};

/// Character appended and removed to make the host register the write.
const PERTURBATION: &str = " ";

/// Inline text written in place of a draft that could not be produced.
pub fn inline_error(reason: &str) -> String {
    format!("[Draft unavailable: {}]", reason.trim())
}

/// Split a draft into paragraph lines, normalizing line endings.
pub fn draft_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(|line| line.trim_end().to_owned())
        .collect()
}

/// Write `text` into `field`. Returns `false` if any step fails or the
/// field does not hold the text afterwards.
pub fn insert_message(page: &dyn HostPage, field: NodeId, text: &str) -> bool {
    match write_with_perturbation(page, field, text) {
        Ok(true) => {
            info!(chars = text.chars().count(), "draft inserted");
            true
        }
        Ok(false) => {
            warn!("field content does not match the draft after writing");
            false
        }
        Err(e) => {
            warn!(error = %e, "draft insertion failed");
            false
        }
    }
}

fn write_with_perturbation(page: &dyn HostPage, field: NodeId, text: &str) -> Result<bool, DomError> {
    let lines = draft_lines(text);

    page.focus(field)?;
    page.replace_paragraphs(field, &lines)?;
    page.dispatch_input(field)?;

    page.append_text(field, PERTURBATION)?;
    page.dispatch_input(field)?;
    page.delete_trailing(field, PERTURBATION.chars().count())?;
    page.dispatch_input(field)?;

    let written = page.text(field)?;
    let matches = normalize_whitespace(&written) == normalize_whitespace(text);
    debug!(matches, "verified field content");
    Ok(matches)
}
