//! Core domain types shared across the draft pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::providers::search::SearchResults;

// ---------------------------------------------------------------------------
// Recipient and conversation
// ---------------------------------------------------------------------------

/// Identity of the person on the other side of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientInfo {
    /// Display name scraped from the conversation header.
    pub name: String,
    /// Headline / subtitle under the name, when present.
    pub byline: Option<String>,
}

/// Who sent a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The local user.
    User,
    /// The other participant.
    Recipient,
}

/// One message in the visible thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub sender: Sender,
    /// Message body.
    pub text: String,
    /// Timestamp as rendered by the host page, if the model found one.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Structured summary of the visible thread, produced by the summarizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatHistoryInfo {
    /// Messages in chronological order.
    pub messages: Vec<ChatMessage>,
    /// Short prose summary.
    pub summary: String,
    /// True when no prior messages exist.
    pub is_new_conversation: bool,
    /// Topics the model pulled out of the thread.
    pub key_topics: Vec<String>,
}

impl ChatHistoryInfo {
    /// The most recent message sent by the recipient.
    pub fn last_inbound(&self) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Recipient)
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Category used whenever classification cannot run.
pub const DEFAULT_CATEGORY: &str = "Recruiter inbound";

/// Out-of-the-box category list.
pub const DEFAULT_CATEGORIES: [&str; 4] = [
    DEFAULT_CATEGORY,
    "Networking",
    "Job opportunity",
    "Sales outreach",
];

/// A user-configurable interaction label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionCategory(String);

impl InteractionCategory {
    /// Wrap a label. Surrounding whitespace is trimmed.
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(label.as_ref().trim().to_owned())
    }

    /// The fixed fallback category.
    pub fn fallback() -> Self {
        Self::new(DEFAULT_CATEGORY)
    }

    /// Label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalized storage key for this category's preferences.
    pub fn key(&self) -> String {
        normalize_category_key(&self.0)
    }
}

impl fmt::Display for InteractionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase the label and collapse every run of non-alphanumerics to `_`.
pub fn normalize_category_key(label: &str) -> String {
    let mut key = String::with_capacity(label.len());
    let mut pending_sep = false;
    for ch in label.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    key
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// Desired tone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Polished and businesslike.
    #[default]
    Professional,
    /// Warm and approachable.
    Friendly,
    /// Relaxed.
    Casual,
    /// Energetic and positive.
    Enthusiastic,
}

/// Desired message length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLength {
    /// One to two sentences.
    Short,
    /// A short paragraph.
    #[default]
    Medium,
    /// Several paragraphs.
    Long,
}

/// How to open the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GreetingStyle {
    /// "Hello <name>,".
    Formal,
    /// "Hi <name>,".
    #[default]
    Casual,
    /// Start directly with the name.
    Name,
    /// No greeting.
    None,
}

/// How to close the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosingStyle {
    /// "Best regards, <name>".
    Formal,
    /// "Thanks, <name>" / "Cheers".
    #[default]
    Casual,
    /// No sign-off.
    None,
}

/// Register of the language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormalityLevel {
    /// Strictly formal.
    VeryFormal,
    /// Formal.
    Formal,
    /// Neither stiff nor chatty.
    #[default]
    Balanced,
    /// Informal.
    Informal,
}

macro_rules! prompt_label {
    ($ty:ty { $($variant:ident => $label:expr),+ $(,)? }) => {
        impl $ty {
            /// Human-readable label used in prompts.
            pub fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }
    };
}

prompt_label!(Tone {
    Professional => "professional",
    Friendly => "friendly",
    Casual => "casual",
    Enthusiastic => "enthusiastic",
});
prompt_label!(MessageLength {
    Short => "short (1-2 sentences)",
    Medium => "medium (3-5 sentences)",
    Long => "long (2-3 short paragraphs)",
});
prompt_label!(GreetingStyle {
    Formal => "formal greeting (e.g. \"Hello Jane,\")",
    Casual => "casual greeting (e.g. \"Hi Jane,\")",
    Name => "just the recipient's first name",
    None => "no greeting",
});
prompt_label!(ClosingStyle {
    Formal => "formal sign-off (e.g. \"Best regards\")",
    Casual => "casual sign-off (e.g. \"Thanks\" or \"Cheers\")",
    None => "no sign-off",
});
prompt_label!(FormalityLevel {
    VeryFormal => "very formal",
    Formal => "formal",
    Balanced => "balanced",
    Informal => "informal",
});

/// Per-category drafting preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceSet {
    /// Desired tone.
    pub tone: Tone,
    /// Desired length.
    pub length: MessageLength,
    /// Greeting style.
    pub greeting_style: GreetingStyle,
    /// Closing style.
    pub closing_style: ClosingStyle,
    /// Formality level.
    pub formality_level: FormalityLevel,
    /// Write the draft into the field automatically.
    pub auto_insert: bool,
    /// Hold the draft for review instead of inserting it.
    pub preview_before_insert: bool,
    /// Free-text instructions appended to the prompt.
    pub custom_instructions: String,
}

impl Default for PreferenceSet {
    fn default() -> Self {
        Self {
            tone: Tone::default(),
            length: MessageLength::default(),
            greeting_style: GreetingStyle::default(),
            closing_style: ClosingStyle::default(),
            formality_level: FormalityLevel::default(),
            auto_insert: true,
            preview_before_insert: false,
            custom_instructions: String::new(),
        }
    }
}

impl PreferenceSet {
    /// Whether a generated draft should be written into the field.
    pub fn inserts_automatically(&self) -> bool {
        self.auto_insert && !self.preview_before_insert
    }
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

/// Successful research output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchFindings {
    /// Query that was sent to the search engine.
    pub search_term: String,
    /// Results returned for it.
    pub search_results: SearchResults,
}

/// Result of the research stage. Never fatal to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResearchOutcome {
    /// Search ran.
    Found(ResearchFindings),
    /// Search did not run or failed.
    Unavailable {
        /// Reason, for logs and history.
        error: String,
    },
}

impl ResearchOutcome {
    /// Findings when the search ran.
    pub fn findings(&self) -> Option<&ResearchFindings> {
        match self {
            Self::Found(f) => Some(f),
            Self::Unavailable { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Generation context
// ---------------------------------------------------------------------------

/// Everything the draft generator needs, accumulated stage by stage.
///
/// Each stage consumes the context and returns a new, enriched one; nothing
/// mutates a context another stage still holds.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationContext {
    display_name: String,
    recipient: RecipientInfo,
    chat_history: Option<ChatHistoryInfo>,
    research: Option<ResearchOutcome>,
    category: Option<InteractionCategory>,
    preferences: PreferenceSet,
}

impl GenerationContext {
    /// Start a context from the extracted recipient.
    pub fn new(display_name: impl Into<String>, recipient: RecipientInfo) -> Self {
        Self {
            display_name: display_name.into(),
            recipient,
            chat_history: None,
            research: None,
            category: None,
            preferences: PreferenceSet::default(),
        }
    }

    /// Attach the summarized thread (or its absence).
    #[must_use]
    pub fn with_chat_history(self, chat_history: Option<ChatHistoryInfo>) -> Self {
        Self {
            chat_history,
            ..self
        }
    }

    /// Attach research output.
    #[must_use]
    pub fn with_research(self, research: ResearchOutcome) -> Self {
        Self {
            research: Some(research),
            ..self
        }
    }

    /// Attach the classification and the preferences that go with it.
    #[must_use]
    pub fn with_classification(
        self,
        category: InteractionCategory,
        preferences: PreferenceSet,
    ) -> Self {
        Self {
            category: Some(category),
            preferences,
            ..self
        }
    }

    /// Local user's display name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Recipient identity.
    pub fn recipient(&self) -> &RecipientInfo {
        &self.recipient
    }

    /// Summarized thread, if the summarizer produced one.
    pub fn chat_history(&self) -> Option<&ChatHistoryInfo> {
        self.chat_history.as_ref()
    }

    /// Research output, if the stage ran.
    pub fn research(&self) -> Option<&ResearchOutcome> {
        self.research.as_ref()
    }

    /// Classification, once assigned.
    pub fn category(&self) -> Option<&InteractionCategory> {
        self.category.as_ref()
    }

    /// Preferences in effect.
    pub fn preferences(&self) -> &PreferenceSet {
        &self.preferences
    }
}
