//! Drives the draft pipeline for every eligible composer field.
//!
//! For one field the stages run strictly in order:
//! extract recipient → summarize thread → research → classify → generate →
//! insert (or hold). Different fields run concurrently and independently.
//!
//! Only two failures reach this layer: no recipient after every retry, and
//! no draft from generation. Both end the run in [`FieldState::Failed`] with
//! a bracketed inline error written into the field. Every other stage
//! absorbs its own failures.

pub mod registry;
pub mod watcher;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{ConfigProvider, RunConfig};
use crate::dom::{HostPage, NodeId};
use crate::extractors::{
    extract_chat_container, find_chat_input_fields, is_field_empty, ExtractionError,
    RecipientExtractor,
};
use crate::history::{HistoryContext, HistoryEntry, HistoryLog};
use crate::injector::{inline_error, insert_message};
use crate::pipeline::{
    categorize_interaction, extract_chat_history_info, generate_message_draft,
    research_recipient, Backends,
};
use crate::types::{GenerationContext, InteractionCategory, RecipientInfo};

pub use registry::{FieldRecord, FieldRegistry, FieldState};
pub use watcher::Watcher;

/// Delays before each recipient extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(&[0, 1000, 2000])
    }
}

impl RetryPolicy {
    /// Policy from per-attempt delays in milliseconds. An empty list still
    /// makes one immediate attempt.
    pub fn from_millis(delays_ms: &[u64]) -> Self {
        let mut delays: Vec<Duration> = delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect();
        if delays.is_empty() {
            delays.push(Duration::ZERO);
        }
        Self { delays }
    }

    /// Delay before each attempt, in order.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Number of attempts.
    pub fn attempts(&self) -> u32 {
        u32::try_from(self.delays.len()).unwrap_or(u32::MAX)
    }
}

/// Outcome of one field run.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldReport {
    /// Field the run targeted.
    pub field: NodeId,
    /// Terminal state.
    pub state: FieldState,
    /// Recipient, when found.
    pub recipient: Option<RecipientInfo>,
    /// Category, when classification ran.
    pub category: Option<InteractionCategory>,
    /// Generated draft, when generation succeeded.
    pub draft: Option<String>,
    /// Draft came from the cache.
    pub cached: bool,
    /// Failure description for failed runs.
    pub error: Option<String>,
}

impl FieldReport {
    fn new(field: NodeId) -> Self {
        Self {
            field,
            state: FieldState::Idle,
            recipient: None,
            category: None,
            draft: None,
            cached: false,
            error: None,
        }
    }
}

/// Pipeline driver bound to one host page.
#[derive(Clone)]
pub struct Orchestrator {
    page: Arc<dyn HostPage>,
    backends: Backends,
    config: Arc<dyn ConfigProvider>,
    history: HistoryLog,
    registry: Arc<FieldRegistry>,
    extractor: Arc<RecipientExtractor>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("url", &self.page.url())
            .field("backends", &self.backends)
            .field("fields", &self.registry.len())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator with the default extractor and retry policy.
    pub fn new(
        page: Arc<dyn HostPage>,
        backends: Backends,
        config: Arc<dyn ConfigProvider>,
        history: HistoryLog,
    ) -> Self {
        Self {
            page,
            backends,
            config,
            history,
            registry: Arc::new(FieldRegistry::new()),
            extractor: Arc::new(RecipientExtractor::default()),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the recipient extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: RecipientExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Host page.
    pub fn page(&self) -> &Arc<dyn HostPage> {
        &self.page
    }

    /// Field registry.
    pub fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    /// Discover eligible fields and run them concurrently. Returns one
    /// report per run started.
    pub async fn scan(&self) -> Vec<FieldReport> {
        let registry = Arc::clone(&self.registry);
        let fields = find_chat_input_fields(self.page.as_ref(), |field| registry.is_claimed(field));
        if fields.is_empty() {
            return Vec::new();
        }
        debug!(count = fields.len(), "composer fields found");

        let mut runs = JoinSet::new();
        for field in fields {
            let this = self.clone();
            runs.spawn(async move { this.process_field(field).await });
        }

        let mut reports = Vec::new();
        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "field run aborted"),
            }
        }
        reports
    }

    /// Run the pipeline for `field` if it is eligible. Returns `None` when
    /// the field is hidden, not empty, detached, or already claimed.
    pub async fn process_field(&self, field: NodeId) -> Option<FieldReport> {
        if !self.is_eligible(field) || !self.registry.try_begin(field) {
            return None;
        }
        let span = info_span!("field", index = field.index, generation = field.generation);
        let report = self.run_pipeline(field).instrument(span).await;
        self.registry.finish(field, report.state);
        Some(report)
    }

    fn is_eligible(&self, field: NodeId) -> bool {
        let page = self.page.as_ref();
        page.is_attached(field) && page.is_visible(field).unwrap_or(false) && is_field_empty(page, field)
    }

    async fn run_pipeline(&self, field: NodeId) -> FieldReport {
        let mut report = FieldReport::new(field);
        let page = self.page.as_ref();

        let run = self.config.resolve().unwrap_or_else(|e| {
            warn!(error = %e, "settings unavailable, using defaults");
            RunConfig::fallback()
        });

        self.registry.transition(field, FieldState::Extracting);
        let recipient = match self.extract_recipient().await {
            Ok(r) => r,
            Err(e) => return self.fail(report, &e.to_string()),
        };
        info!(recipient = %recipient.name, "recipient identified");
        report.recipient = Some(recipient.clone());

        self.registry.transition(field, FieldState::Summarizing);
        let chat_history = match (self.backends.completion(), extract_chat_container(page, Some(field))) {
            (Some(provider), Some(container)) => extract_chat_history_info(provider, page, container).await,
            (_, None) => {
                debug!("no chat container found");
                None
            }
            (None, Some(_)) => None,
        };

        self.registry.transition(field, FieldState::Researching);
        let research = research_recipient(self.backends.completion(), self.backends.search(), &recipient).await;

        self.registry.transition(field, FieldState::Classifying);
        let category = categorize_interaction(
            self.backends.completion(),
            chat_history.as_ref(),
            &recipient,
            &run.categories,
        )
        .await;
        let preferences = run.preferences_for(&category);
        report.category = Some(category.clone());

        let context = GenerationContext::new(run.display_name.clone(), recipient.clone())
            .with_chat_history(chat_history)
            .with_research(research)
            .with_classification(category.clone(), preferences.clone());

        self.registry.transition(field, FieldState::Generating);
        let draft = match generate_message_draft(&self.backends, &context).await {
            Ok(d) => d,
            Err(e) => return self.fail(report, &e.to_string()),
        };
        report.draft = Some(draft.text.clone());
        report.cached = draft.cached;

        let entry = HistoryEntry::new(
            draft.text.clone(),
            HistoryContext {
                recipient,
                category: category.to_string(),
                chat_summary: context
                    .chat_history()
                    .map(|h| h.summary.clone())
                    .filter(|s| !s.trim().is_empty()),
                page_url: Some(page.url()),
            },
        );
        if let Err(e) = self.history.append(entry) {
            warn!(error = %e, "failed to record draft in history");
        }

        if !preferences.inserts_automatically() {
            info!(category = %category, "draft held for review");
            report.state = FieldState::Held;
            return report;
        }

        if insert_message(page, field, &draft.text) {
            report.state = FieldState::Inserted;
        } else {
            report.state = FieldState::Failed;
            report.error = Some("draft could not be written into the field".to_owned());
        }
        report
    }

    async fn extract_recipient(&self) -> Result<RecipientInfo, ExtractionError> {
        for (attempt, delay) in self.retry.delays().iter().enumerate() {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            if let Some(recipient) = self.extractor.extract(self.page.as_ref()) {
                return Ok(recipient);
            }
            debug!(attempt, "recipient not found");
        }
        Err(ExtractionError {
            attempts: self.retry.attempts(),
        })
    }

    fn fail(&self, mut report: FieldReport, reason: &str) -> FieldReport {
        warn!(reason, "pipeline run failed");
        if !insert_message(self.page.as_ref(), report.field, &inline_error(reason)) {
            warn!("inline error could not be written");
        }
        report.state = FieldState::Failed;
        report.error = Some(reason.to_owned());
        report
    }
}
