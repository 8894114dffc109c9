//! Credential loading from the runtime `.env` file and the process env.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

/// Completion-provider key.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Web-search API key.
pub const GOOGLE_SEARCH_API_KEY: &str = "GOOGLE_SEARCH_API_KEY";
/// Web-search engine (context) id.
pub const GOOGLE_SEARCH_ENGINE_ID: &str = "GOOGLE_SEARCH_ENGINE_ID";
/// Cache service key.
pub const LANGCACHE_API_KEY: &str = "LANGCACHE_API_KEY";
/// Cache instance id.
pub const LANGCACHE_ID: &str = "LANGCACHE_ID";

/// Every credential key the pipeline reads.
pub const CREDENTIAL_KEYS: [&str; 5] = [
    OPENAI_API_KEY,
    GOOGLE_SEARCH_API_KEY,
    GOOGLE_SEARCH_ENGINE_ID,
    LANGCACHE_API_KEY,
    LANGCACHE_ID,
];

/// Runtime credentials. Values never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map. Blank values are dropped.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self {
            vars: vars
                .into_iter()
                .filter(|(_, v)| !v.trim().is_empty())
                .collect(),
        }
    }

    /// Returns a credential value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Returns a required credential or an error when missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the key does not exist in loaded credentials.
    pub fn require(&self, key: &str) -> anyhow::Result<String> {
        self.vars
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required credential: {key}"))
    }

    /// Keep every value already present and fill gaps from `fallback`.
    #[must_use]
    pub fn or_else(mut self, fallback: &Credentials) -> Self {
        for (key, value) in &fallback.vars {
            self.vars
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Completion-provider key.
    pub fn completion_key(&self) -> Option<&str> {
        self.get(OPENAI_API_KEY)
    }

    /// Search key and engine id, only when both are set.
    pub fn search_pair(&self) -> Option<(&str, &str)> {
        Some((self.get(GOOGLE_SEARCH_API_KEY)?, self.get(GOOGLE_SEARCH_ENGINE_ID)?))
    }

    /// Cache key and instance id, only when both are set.
    pub fn cache_pair(&self) -> Option<(&str, &str)> {
        Some((self.get(LANGCACHE_API_KEY)?, self.get(LANGCACHE_ID)?))
    }

    /// Returns all credential values for redaction purposes.
    pub fn known_secrets(&self) -> Vec<String> {
        self.vars.values().cloned().collect()
    }
}

/// Load credentials from a specific `.env` path.
///
/// # Errors
///
/// Returns an error if the file does not exist, permissions are too broad,
/// or parsing fails.
pub fn load_credentials(path: &Path) -> anyhow::Result<Credentials> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "credentials file does not exist: {}",
            path.display()
        ));
    }

    validate_private_permissions(path)?;

    let mut vars = BTreeMap::new();
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read credentials at {}", path.display()))?;

    for item in iter {
        let (key, value) = item.with_context(|| {
            format!(
                "failed to parse key-value entry in credentials file {}",
                path.display()
            )
        })?;
        vars.insert(key, value);
    }

    Ok(Credentials::from_map(vars))
}

/// Hand-provisioned credentials: the `.env` file when present, with the
/// process environment filling any key it lacks.
///
/// # Errors
///
/// Returns an error when the file exists but is unreadable, malformed or
/// not private.
pub fn load_local_credentials(env_file: &Path) -> anyhow::Result<Credentials> {
    let from_file = if env_file.exists() {
        load_credentials(env_file)?
    } else {
        debug!(path = %env_file.display(), "no credentials file");
        Credentials::default()
    };
    Ok(from_file.or_else(&credentials_from_env(|key| std::env::var(key).ok())))
}

/// Credentials found through `env` for every key in [`CREDENTIAL_KEYS`].
pub fn credentials_from_env(env: impl Fn(&str) -> Option<String>) -> Credentials {
    Credentials::from_map(
        CREDENTIAL_KEYS
            .iter()
            .filter_map(|key| env(key).map(|v| ((*key).to_owned(), v)))
            .collect(),
    )
}

/// Ensure a file exists and has private permissions when supported.
///
/// # Errors
///
/// Returns an error if metadata cannot be read or permissions cannot be updated.
pub fn enforce_private_file_permissions(path: &Path) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

#[cfg(unix)]
fn validate_private_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to inspect credentials file {}", path.display()))?;
    let mode = metadata.permissions().mode() & 0o777;

    if mode & 0o077 != 0 {
        return Err(anyhow::anyhow!(
            "credentials file {} must be 0600, found {:o}",
            path.display(),
            mode
        ));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_private_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
