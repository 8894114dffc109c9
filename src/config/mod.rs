//! Configuration loading and management.
//!
//! Loads `~/.replysmith/config.toml` (or `$REPLYSMITH_CONFIG`). Environment
//! variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.
//!
//! Per-run settings (display name, categories, preferences, credentials)
//! are resolved separately through [`run::ConfigProvider`].

pub mod run;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cache::relay::{RelayEndpoint, DEFAULT_ENDPOINT_TEMPLATE};
use crate::cache::{DEFAULT_SIMILARITY_THRESHOLD, MAX_CACHE_ENTRIES};
use crate::pipeline::{DEFAULT_DRAFT_MAX_TOKENS, DEFAULT_DRAFT_TEMPERATURE};
use crate::providers::embedder::DEFAULT_EMBEDDING_MODEL;
use crate::providers::openai::OPENAI_API_BASE;
use crate::providers::search::GOOGLE_SEARCH_ENDPOINT;

pub use run::{ConfigProvider, LayeredConfigProvider, RunConfig};

/// Env var naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "REPLYSMITH_CONFIG";

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Completion and embedding models.
    pub llm: LlmConfig,
    /// Web search.
    pub search: SearchConfig,
    /// Semantic cache.
    pub cache: CacheConfig,
    /// Field processing.
    pub orchestrator: OrchestratorConfig,
    /// Filesystem locations.
    pub paths: PathsConfig,
    /// Local profile overrides.
    pub profile: ProfileConfig,
}

impl AppConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// If the file does not exist, returns defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is unreadable or malformed, or the
    /// result fails [`AppConfig::validate`].
    pub fn load() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok())?;
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file only, no env overrides. A missing file yields
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve config path using a custom env resolver (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error when the home directory cannot be determined.
    pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
        if let Some(p) = env(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(p));
        }
        Ok(default_data_dir()?.join("config.toml"))
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // LLM.
        if let Some(v) = env("REPLYSMITH_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = env("REPLYSMITH_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = env("REPLYSMITH_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        parse_override(&env, "REPLYSMITH_LLM_TEMPERATURE", &mut self.llm.temperature);
        parse_override(&env, "REPLYSMITH_LLM_MAX_TOKENS", &mut self.llm.max_tokens);

        // Search.
        parse_override(&env, "REPLYSMITH_SEARCH_ENABLED", &mut self.search.enabled);
        if let Some(v) = env("REPLYSMITH_SEARCH_ENDPOINT") {
            self.search.endpoint = v;
        }

        // Cache.
        parse_override(&env, "REPLYSMITH_CACHE_ENABLED", &mut self.cache.enabled);
        parse_override(&env, "REPLYSMITH_CACHE_SEMANTIC", &mut self.cache.semantic);
        if let Some(v) = env("REPLYSMITH_CACHE_ENDPOINT") {
            self.cache.endpoint_template = v;
        }
        parse_override(
            &env,
            "REPLYSMITH_SIMILARITY_THRESHOLD",
            &mut self.cache.similarity_threshold,
        );

        // Orchestrator.
        parse_override(&env, "REPLYSMITH_DEBOUNCE_MS", &mut self.orchestrator.debounce_ms);

        // Paths and profile.
        if let Some(v) = env("REPLYSMITH_DATA_DIR") {
            self.paths.data_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = env("REPLYSMITH_DISPLAY_NAME") {
            self.profile.display_name = Some(v);
        }
    }

    /// Check values that would otherwise fail later, at first use.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.llm.base_url)
            .with_context(|| format!("invalid llm.base_url '{}'", self.llm.base_url))?;
        url::Url::parse(&self.search.endpoint)
            .with_context(|| format!("invalid search.endpoint '{}'", self.search.endpoint))?;
        if self.cache.enabled {
            RelayEndpoint::parse(&self.cache.endpoint_template)
                .context("invalid cache.endpoint_template")?;
        }
        if !(-1.0..=1.0).contains(&self.cache.similarity_threshold) {
            anyhow::bail!(
                "cache.similarity_threshold must be within [-1, 1], got {}",
                self.cache.similarity_threshold
            );
        }
        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be at least 1");
        }
        if self.orchestrator.retry_delays_ms.is_empty() {
            anyhow::bail!("orchestrator.retry_delays_ms must list at least one attempt");
        }
        Ok(())
    }

    /// Parse a TOML string into config (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error when the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}

fn parse_override<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    target: &mut T,
) {
    if let Some(v) = env(var) {
        match v.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value = %v, "ignoring invalid env override"),
        }
    }
}

// ── LLM config ──────────────────────────────────────────────────

/// Completion and embedding model settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API root.
    pub base_url: String,
    /// Completion model.
    pub model: String,
    /// Embedding model for the semantic cache.
    pub embedding_model: String,
    /// Draft sampling temperature.
    pub temperature: f32,
    /// Draft token ceiling.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_API_BASE.to_owned(),
            model: "gpt-4o-mini".to_owned(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_owned(),
            temperature: DEFAULT_DRAFT_TEMPERATURE,
            max_tokens: DEFAULT_DRAFT_MAX_TOKENS,
        }
    }
}

// ── Search config ───────────────────────────────────────────────

/// Web search settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Run research when search credentials are present.
    pub enabled: bool,
    /// Search API endpoint.
    pub endpoint: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: GOOGLE_SEARCH_ENDPOINT.to_owned(),
        }
    }
}

// ── Cache config ────────────────────────────────────────────────

/// Semantic cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Route generation through the cache when its credentials are present.
    pub enabled: bool,
    /// Enable embedding-based lookup.
    pub semantic: bool,
    /// Endpoint template with a `{cache_id}` placeholder.
    pub endpoint_template: String,
    /// Minimum similarity for a semantic hit.
    pub similarity_threshold: f64,
    /// Entry cap.
    pub max_entries: usize,
    /// Seconds to wait for a relay reply.
    pub reply_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            semantic: true,
            endpoint_template: DEFAULT_ENDPOINT_TEMPLATE.to_owned(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_entries: MAX_CACHE_ENTRIES,
            reply_timeout_secs: 60,
        }
    }
}

impl CacheConfig {
    /// Relay reply timeout.
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

// ── Orchestrator config ─────────────────────────────────────────

/// Field processing settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Quiet period after a page mutation before rescanning.
    pub debounce_ms: u64,
    /// Delay before each recipient extraction attempt.
    pub retry_delays_ms: Vec<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            retry_delays_ms: vec![0, 1000, 2000],
        }
    }
}

// ── Paths config ────────────────────────────────────────────────

/// Filesystem locations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Data directory; `~/.replysmith` when unset.
    pub data_dir: Option<PathBuf>,
}

/// Resolved runtime file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Data directory.
    pub root: PathBuf,
    /// Settings, history and cache store.
    pub store_file: PathBuf,
    /// Hand-provisioned credentials.
    pub env_file: PathBuf,
    /// Log directory.
    pub logs_dir: PathBuf,
}

impl PathsConfig {
    /// Resolve every runtime path.
    ///
    /// # Errors
    ///
    /// Returns an error when no data dir is configured and the home
    /// directory cannot be determined.
    pub fn resolve(&self) -> Result<RuntimePaths> {
        let root = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };
        Ok(RuntimePaths {
            store_file: root.join("store.json"),
            env_file: root.join(".env"),
            logs_dir: root.join("logs"),
            root,
        })
    }
}

/// Resolve the default data directory (`~/.replysmith/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_data_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".replysmith"))
}

// ── Profile config ──────────────────────────────────────────────

/// Local profile overrides, taking precedence over stored settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Display name used in prompts.
    pub display_name: Option<String>,
}

// ── Tests ───────────────────────────────────────────────────────
