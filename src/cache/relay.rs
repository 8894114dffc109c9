//! Message relay to the hosted cache-completion endpoint.
//!
//! Callers never talk to the cache endpoint directly. They hand a
//! [`RelayMessage`] to the relay worker over a channel and await the reply
//! carrying the same correlation id. The worker is the only component that
//! performs the cross-origin HTTP call.
//!
//! The endpoint is a single template with a `{cache_id}` placeholder,
//! validated once by [`RelayEndpoint::parse`]. There is no path guessing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::providers::openai::{build_messages, parse_response, OpenAiMessage};
use crate::providers::{
    sanitize_http_error_body, CompletionRequest, CompletionResponse, LlmProvider, ProviderError,
};

/// Action tag carried by every relay message.
pub const RELAY_ACTION: &str = "callLangCache";

/// Placeholder substituted with the cache instance id.
pub const CACHE_ID_PLACEHOLDER: &str = "{cache_id}";

/// Header carrying the cache instance id.
pub const INSTANCE_ID_HEADER: &str = "x-langcache-id";

/// Default endpoint template.
pub const DEFAULT_ENDPOINT_TEMPLATE: &str =
    "https://api.langcache.com/v1/caches/{cache_id}/chat/completions";

/// How long a caller waits for its reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Depth of the relay's inbound queue.
const QUEUE_DEPTH: usize = 32;

/// Errors from the relay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Endpoint template is unusable.
    #[error("invalid relay endpoint: {0}")]
    Endpoint(String),
    /// The worker has shut down.
    #[error("relay worker is not running")]
    Closed,
    /// No reply arrived in time.
    #[error("relay reply timed out after {0:?}")]
    Timeout(Duration),
    /// The far side reported an error.
    #[error("relay call failed: {0}")]
    Remote(String),
}

impl From<RelayError> for ProviderError {
    fn from(e: RelayError) -> Self {
        ProviderError::Unavailable(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Validated endpoint template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEndpoint {
    template: String,
}

impl RelayEndpoint {
    /// Validate a template: it must contain [`CACHE_ID_PLACEHOLDER`] and
    /// resolve to an absolute http(s) URL.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Endpoint`] describing the first problem found.
    pub fn parse(template: &str) -> Result<Self, RelayError> {
        let template = template.trim();
        if !template.contains(CACHE_ID_PLACEHOLDER) {
            return Err(RelayError::Endpoint(format!(
                "template '{template}' is missing {CACHE_ID_PLACEHOLDER}"
            )));
        }
        let endpoint = Self {
            template: template.to_owned(),
        };
        endpoint.resolve("probe")?;
        Ok(endpoint)
    }

    /// Concrete URL for a cache instance.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Endpoint`] when the id is blank or the result
    /// is not an http(s) URL.
    pub fn resolve(&self, cache_id: &str) -> Result<url::Url, RelayError> {
        let cache_id = cache_id.trim();
        if cache_id.is_empty() {
            return Err(RelayError::Endpoint("cache id is empty".to_owned()));
        }
        let raw = self.template.replace(CACHE_ID_PLACEHOLDER, cache_id);
        let parsed = url::Url::parse(&raw).map_err(|e| RelayError::Endpoint(format!("{raw}: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(RelayError::Endpoint(format!("unsupported scheme '{other}'"))),
        }
    }

    /// Template text.
    pub fn template(&self) -> &str {
        &self.template
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// Request passed across the relay boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage {
    /// Always [`RELAY_ACTION`].
    pub action: String,
    /// Resolved endpoint URL.
    pub url: String,
    /// Cache service key.
    pub api_key: String,
    /// Cache instance id.
    pub id: String,
    /// Completion-provider key forwarded to the cache service.
    pub provider_key: String,
    /// Chat messages, system prompt first.
    pub messages: Vec<OpenAiMessage>,
    /// Model name.
    pub model: String,
    /// Token ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Reply: `{"data": ...}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayReply {
    /// Response body from the cache endpoint.
    Data(Value),
    /// Failure description.
    Error(String),
}

#[derive(Debug, Serialize)]
struct ProviderSpec<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    api_key: &'a str,
}

#[derive(Debug, Serialize)]
struct UpstreamBody<'a> {
    model: &'a str,
    messages: &'a [OpenAiMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    provider: ProviderSpec<'a>,
}

struct Envelope {
    correlation_id: Uuid,
    message: RelayMessage,
}

type Pending = Arc<Mutex<HashMap<Uuid, oneshot::Sender<RelayReply>>>>;

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Caller-side handle to the relay worker.
#[derive(Clone)]
pub struct CacheRelay {
    outbound: mpsc::Sender<Envelope>,
    pending: Pending,
    reply_timeout: Duration,
}

impl std::fmt::Debug for CacheRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let in_flight = self.pending.lock().map(|p| p.len()).unwrap_or(0);
        f.debug_struct("CacheRelay")
            .field("in_flight", &in_flight)
            .field("reply_timeout", &self.reply_timeout)
            .finish()
    }
}

impl CacheRelay {
    /// Start the worker task on the current runtime.
    pub fn spawn(client: reqwest::Client) -> Self {
        Self::spawn_with_timeout(client, DEFAULT_REPLY_TIMEOUT)
    }

    /// Start the worker with a custom reply timeout.
    pub fn spawn_with_timeout(client: reqwest::Client, reply_timeout: Duration) -> Self {
        let (outbound, inbound) = mpsc::channel(QUEUE_DEPTH);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(run_worker(client, inbound, Arc::clone(&pending)));
        Self {
            outbound,
            pending,
            reply_timeout,
        }
    }

    /// Send a message and wait for the matching reply.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Closed`] if the worker is gone,
    /// [`RelayError::Timeout`] if no reply arrives in time, and
    /// [`RelayError::Remote`] when the far side replies with an error.
    pub async fn call(&self, message: RelayMessage) -> Result<Value, RelayError> {
        let correlation_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| RelayError::Closed)?
            .insert(correlation_id, tx);

        let envelope = Envelope {
            correlation_id,
            message,
        };
        if self.outbound.send(envelope).await.is_err() {
            self.forget(correlation_id);
            return Err(RelayError::Closed);
        }

        let reply = match tokio::time::timeout(self.reply_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(RelayError::Closed),
            Err(_) => {
                self.forget(correlation_id);
                return Err(RelayError::Timeout(self.reply_timeout));
            }
        };

        match reply {
            RelayReply::Data(value) => Ok(value),
            RelayReply::Error(e) => Err(RelayError::Remote(e)),
        }
    }

    fn forget(&self, correlation_id: Uuid) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&correlation_id);
        }
    }
}

async fn run_worker(client: reqwest::Client, mut inbound: mpsc::Receiver<Envelope>, pending: Pending) {
    while let Some(envelope) = inbound.recv().await {
        let client = client.clone();
        let pending = Arc::clone(&pending);
        tokio::spawn(async move {
            let Envelope {
                correlation_id,
                message,
            } = envelope;
            let reply = forward(&client, &message).await;
            let waiter = pending
                .lock()
                .ok()
                .and_then(|mut p| p.remove(&correlation_id));
            match waiter {
                Some(tx) => {
                    // Receiver may have timed out in the meantime.
                    let _ = tx.send(reply);
                }
                None => debug!(%correlation_id, "dropping reply with no waiter"),
            }
        });
    }
    debug!("relay worker stopped");
}

async fn forward(client: &reqwest::Client, message: &RelayMessage) -> RelayReply {
    if message.action != RELAY_ACTION {
        return RelayReply::Error(format!("unknown action '{}'", message.action));
    }

    let body = UpstreamBody {
        model: &message.model,
        messages: &message.messages,
        max_tokens: message.max_tokens,
        temperature: message.temperature,
        provider: ProviderSpec {
            kind: "openai",
            api_key: &message.provider_key,
        },
    };

    let sent = client
        .post(&message.url)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", message.api_key))
        .header(INSTANCE_ID_HEADER, &message.id)
        .json(&body)
        .send()
        .await;

    let response = match sent {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "cache relay request failed");
            return RelayReply::Error(e.to_string());
        }
    };

    let status = response.status();
    let text = match response.text().await {
        Ok(t) => t,
        Err(e) => return RelayReply::Error(e.to_string()),
    };
    if !status.is_success() {
        return RelayReply::Error(format!(
            "status {}: {}",
            status.as_u16(),
            sanitize_http_error_body(&text)
        ));
    }

    match serde_json::from_str(&text) {
        Ok(value) => RelayReply::Data(value),
        Err(e) => RelayReply::Error(format!("malformed response: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Provider adapter
// ---------------------------------------------------------------------------

/// [`LlmProvider`] that completes through the cache relay.
#[derive(Clone)]
pub struct RelayProvider {
    relay: CacheRelay,
    endpoint: RelayEndpoint,
    cache_api_key: String,
    cache_id: String,
    provider_key: String,
    model: String,
}

impl std::fmt::Debug for RelayProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayProvider")
            .field("endpoint", &self.endpoint.template())
            .field("cache_id", &self.cache_id)
            .field("model", &self.model)
            .field("cache_api_key", &"[REDACTED]")
            .field("provider_key", &"[REDACTED]")
            .finish()
    }
}

impl RelayProvider {
    /// Build the adapter. The endpoint must resolve for `cache_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Endpoint`] when it does not.
    pub fn new(
        relay: CacheRelay,
        endpoint: RelayEndpoint,
        cache_api_key: String,
        cache_id: String,
        provider_key: String,
        model: String,
    ) -> Result<Self, RelayError> {
        endpoint.resolve(&cache_id)?;
        Ok(Self {
            relay,
            endpoint,
            cache_api_key,
            cache_id,
            provider_key,
            model,
        })
    }

    /// Relay message for a completion request.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Endpoint`] if the endpoint cannot be resolved.
    pub fn message_for(&self, request: &CompletionRequest) -> Result<RelayMessage, RelayError> {
        Ok(RelayMessage {
            action: RELAY_ACTION.to_owned(),
            url: self.endpoint.resolve(&self.cache_id)?.to_string(),
            api_key: self.cache_api_key.clone(),
            id: self.cache_id.clone(),
            provider_key: self.provider_key.clone(),
            messages: build_messages(request),
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        })
    }
}

#[async_trait]
impl LlmProvider for RelayProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let message = self.message_for(&request)?;
        let data = self.relay.call(message).await?;
        parse_response(&data.to_string(), &self.model)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
