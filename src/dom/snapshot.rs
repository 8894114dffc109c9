//! [`HostPage`] over an HTML snapshot.
//!
//! The snapshot source is re-parsed with `scraper` for every query, which
//! keeps the page `Send + Sync` and makes element indices stable for a
//! given generation. Content written through the editing surface lives in
//! an overlay keyed by element index and is discarded when the document
//! is replaced.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use scraper::{ElementRef, Html, Selector};
use tokio::sync::broadcast;
use tracing::debug;

use super::{DomError, HostPage, NodeId, PageEvent};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct PageState {
    url: String,
    source: String,
    generation: u64,
    overlay: HashMap<usize, Vec<String>>,
    focused: Option<usize>,
    input_events: HashMap<usize, usize>,
}

/// Host page backed by an HTML snapshot.
#[derive(Debug)]
pub struct SnapshotPage {
    state: Mutex<PageState>,
    events: broadcast::Sender<PageEvent>,
}

impl SnapshotPage {
    /// Create a page from markup at `url`.
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(PageState {
                url: url.into(),
                source: html.into(),
                ..PageState::default()
            }),
            events,
        }
    }

    /// Swap in new markup (host page re-render) and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Unavailable`] if the page lock is poisoned.
    pub fn replace_document(&self, html: impl Into<String>) -> Result<(), DomError> {
        {
            let mut state = self.lock()?;
            state.source = html.into();
            state.generation = state.generation.saturating_add(1);
            state.overlay.clear();
            state.input_events.clear();
            state.focused = None;
            debug!(generation = state.generation, "snapshot document replaced");
        }
        let _ = self.events.send(PageEvent::Mutated);
        Ok(())
    }

    /// Client-side navigation: new URL plus new markup.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Unavailable`] if the page lock is poisoned.
    pub fn navigate(&self, url: impl Into<String>, html: impl Into<String>) -> Result<(), DomError> {
        let url = url.into();
        {
            let mut state = self.lock()?;
            state.url = url.clone();
            state.source = html.into();
            state.generation = state.generation.saturating_add(1);
            state.overlay.clear();
            state.input_events.clear();
            state.focused = None;
        }
        let _ = self.events.send(PageEvent::Navigated(url));
        Ok(())
    }

    /// Number of input notifications dispatched on `node`.
    pub fn input_event_count(&self, node: NodeId) -> usize {
        self.lock()
            .ok()
            .filter(|s| s.generation == node.generation)
            .and_then(|s| s.input_events.get(&node.index).copied())
            .unwrap_or(0)
    }

    /// Currently focused element.
    pub fn focused(&self) -> Option<NodeId> {
        let state = self.lock().ok()?;
        state.focused.map(|index| NodeId {
            generation: state.generation,
            index,
        })
    }

    /// Current document generation.
    pub fn generation(&self) -> u64 {
        self.lock().map(|s| s.generation).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PageState>, DomError> {
        self.state
            .lock()
            .map_err(|_| DomError::Unavailable("page state lock poisoned".to_owned()))
    }

    /// Run `f` against a freshly parsed view of the current document.
    fn with_view<R>(
        &self,
        f: impl FnOnce(&DocView<'_>) -> Result<R, DomError>,
    ) -> Result<R, DomError> {
        let state = self.lock()?;
        let html = Html::parse_document(&state.source);
        let elements: Vec<ElementRef<'_>> = html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect();
        let view = DocView {
            elements,
            state: &state,
        };
        f(&view)
    }

    fn edit(
        &self,
        node: NodeId,
        f: impl FnOnce(&mut Vec<String>),
    ) -> Result<(), DomError> {
        let (editable, current) = self.with_view(|view| {
            let el = view.element(node)?;
            let current = match view.state.overlay.get(&node.index) {
                Some(lines) => lines.clone(),
                None => initial_lines(el),
            };
            Ok((is_editable(el), current))
        })?;
        if !editable {
            return Err(DomError::NotEditable(node));
        }
        let mut state = self.lock()?;
        if state.generation != node.generation {
            return Err(DomError::Detached(node));
        }
        let mut lines = current;
        f(&mut lines);
        state.overlay.insert(node.index, lines);
        Ok(())
    }
}

struct DocView<'a> {
    elements: Vec<ElementRef<'a>>,
    state: &'a PageState,
}

impl<'a> DocView<'a> {
    fn element(&self, node: NodeId) -> Result<ElementRef<'a>, DomError> {
        if node.generation != self.state.generation {
            return Err(DomError::Detached(node));
        }
        self.elements
            .get(node.index)
            .copied()
            .ok_or(DomError::Detached(node))
    }

    fn id(&self, index: usize) -> NodeId {
        NodeId {
            generation: self.state.generation,
            index,
        }
    }

    fn parent_index(&self, index: usize) -> Option<usize> {
        let el = self.elements.get(index)?;
        let parent = el.parent().and_then(ElementRef::wrap)?;
        (0..index)
            .rev()
            .find(|&j| {
                self.elements
                    .get(j)
                    .is_some_and(|e| std::ptr::eq(e.value(), parent.value()))
            })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DomError> {
    Selector::parse(selector).map_err(|_| DomError::Selector {
        selector: selector.to_owned(),
    })
}

fn is_editable(el: ElementRef<'_>) -> bool {
    let value = el.value();
    if matches!(value.name(), "textarea" | "input") {
        return true;
    }
    matches!(
        value.attr("contenteditable").map(str::to_ascii_lowercase).as_deref(),
        Some("true" | "" | "plaintext-only")
    )
}

fn hides_itself(el: ElementRef<'_>) -> bool {
    let value = el.value();
    if value.attr("hidden").is_some() {
        return true;
    }
    if value
        .attr("aria-hidden")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return true;
    }
    value.attr("style").is_some_and(|style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        compact.contains("display:none") || compact.contains("visibility:hidden")
    })
}

fn initial_lines(el: ElementRef<'_>) -> Vec<String> {
    let text: String = el.text().collect();
    if text.trim().is_empty() {
        Vec::new()
    } else {
        text.lines().map(str::to_owned).collect()
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render_paragraphs(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| {
            if line.is_empty() {
                "<p><br></p>".to_owned()
            } else {
                format!("<p>{}</p>", escape_html(line))
            }
        })
        .collect()
}

impl HostPage for SnapshotPage {
    fn url(&self) -> String {
        self.lock().map(|s| s.url.clone()).unwrap_or_default()
    }

    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let sel = parse_selector(selector)?;
        self.with_view(|view| {
            Ok(view
                .elements
                .iter()
                .enumerate()
                .filter(|(_, el)| sel.matches(el))
                .map(|(i, _)| view.id(i))
                .collect())
        })
    }

    fn query_within(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let sel = parse_selector(selector)?;
        self.with_view(|view| {
            let root = view.element(scope)?;
            // Pre-order traversal: descendants occupy the indices right after the scope.
            Ok(root
                .descendants()
                .filter_map(ElementRef::wrap)
                .enumerate()
                .skip(1)
                .filter(|(_, el)| sel.matches(el))
                .map(|(offset, _)| view.id(scope.index.saturating_add(offset)))
                .collect())
        })
    }

    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, DomError> {
        let sel = parse_selector(selector)?;
        self.with_view(|view| Ok(sel.matches(&view.element(node)?)))
    }

    fn text(&self, node: NodeId) -> Result<String, DomError> {
        self.with_view(|view| {
            let el = view.element(node)?;
            Ok(match view.state.overlay.get(&node.index) {
                Some(lines) => lines.join("\n"),
                None => el.text().collect(),
            })
        })
    }

    fn inner_html(&self, node: NodeId) -> Result<String, DomError> {
        self.with_view(|view| {
            let el = view.element(node)?;
            Ok(match view.state.overlay.get(&node.index) {
                Some(lines) => render_paragraphs(lines),
                None => el.inner_html(),
            })
        })
    }

    fn outer_html(&self, node: NodeId) -> Result<String, DomError> {
        self.with_view(|view| Ok(view.element(node)?.html()))
    }

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, DomError> {
        self.with_view(|view| Ok(view.element(node)?.value().attr(name).map(str::to_owned)))
    }

    fn attributes(&self, node: NodeId) -> Result<Vec<(String, String)>, DomError> {
        self.with_view(|view| {
            Ok(view
                .element(node)?
                .value()
                .attrs()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect())
        })
    }

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, DomError> {
        self.with_view(|view| {
            view.element(node)?;
            Ok(view.parent_index(node.index).map(|i| view.id(i)))
        })
    }

    fn is_visible(&self, node: NodeId) -> Result<bool, DomError> {
        self.with_view(|view| {
            let el = view.element(node)?;
            if hides_itself(el) {
                return Ok(false);
            }
            Ok(!el
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(hides_itself))
        })
    }

    fn is_attached(&self, node: NodeId) -> bool {
        self.with_view(|view| view.element(node).map(|_| ())).is_ok()
    }

    fn focus(&self, node: NodeId) -> Result<(), DomError> {
        let editable = self.with_view(|view| Ok(is_editable(view.element(node)?)))?;
        if !editable {
            return Err(DomError::NotEditable(node));
        }
        let mut state = self.lock()?;
        state.focused = Some(node.index);
        Ok(())
    }

    fn replace_paragraphs(&self, node: NodeId, lines: &[String]) -> Result<(), DomError> {
        self.edit(node, |current| {
            *current = lines.to_vec();
        })
    }

    fn append_text(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        self.edit(node, |current| match current.last_mut() {
            Some(last) => last.push_str(text),
            None => current.push(text.to_owned()),
        })
    }

    fn delete_trailing(&self, node: NodeId, count: usize) -> Result<(), DomError> {
        self.edit(node, |current| {
            let mut remaining = count;
            while remaining > 0 {
                let Some(last) = current.last_mut() else {
                    break;
                };
                if last.pop().is_some() {
                    remaining = remaining.saturating_sub(1);
                } else {
                    current.pop();
                }
            }
        })
    }

    fn dispatch_input(&self, node: NodeId) -> Result<(), DomError> {
        self.with_view(|view| view.element(node).map(|_| ()))?;
        let mut state = self.lock()?;
        let counter = state.input_events.entry(node.index).or_insert(0);
        *counter = counter.saturating_add(1);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }
}
