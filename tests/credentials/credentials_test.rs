//! Coverage for credential loading and permission checks.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use replysmith::credentials::{
    credentials_from_env, enforce_private_file_permissions, load_credentials,
    load_local_credentials, Credentials, GOOGLE_SEARCH_API_KEY, GOOGLE_SEARCH_ENGINE_ID,
    LANGCACHE_API_KEY, LANGCACHE_ID, OPENAI_API_KEY,
};

fn write_env(dir: &Path, contents: &str) -> PathBuf {
    let env_path = dir.join(".env");
    fs::write(&env_path, contents).expect("write env file");
    env_path
}

fn creds(pairs: &[(&str, &str)]) -> Credentials {
    Credentials::from_map(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[test]
fn loads_env_credentials() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let env_path = write_env(
        tmp.path(),
        "OPENAI_API_KEY=sk-test\nGOOGLE_SEARCH_API_KEY=search\nGOOGLE_SEARCH_ENGINE_ID=cx-1\n",
    );
    enforce_private_file_permissions(&env_path).expect("chmod");

    let credentials = match load_credentials(&env_path) {
        Ok(credentials) => credentials,
        Err(err) => panic!("credentials should load: {err}"),
    };
    assert_eq!(credentials.completion_key(), Some("sk-test"));
    assert_eq!(credentials.search_pair(), Some(("search", "cx-1")));
    assert!(credentials.cache_pair().is_none());
}

#[cfg(unix)]
#[test]
fn rejects_world_readable_env_file() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::tempdir().expect("temp dir");
    let env_path = write_env(tmp.path(), "OPENAI_API_KEY=sk-test\n");
    fs::set_permissions(&env_path, fs::Permissions::from_mode(0o644)).expect("chmod");

    let err = load_credentials(&env_path).expect_err("should reject 0644");
    assert!(err.to_string().contains("must be 0600"));
}

#[test]
fn missing_file_is_an_error_for_explicit_load() {
    let tmp = tempfile::tempdir().expect("temp dir");
    assert!(load_credentials(&tmp.path().join(".env")).is_err());
}

#[test]
fn missing_file_is_fine_for_local_load() {
    let tmp = tempfile::tempdir().expect("temp dir");
    assert!(load_local_credentials(&tmp.path().join(".env")).is_ok());
}

#[test]
fn blank_values_are_dropped() {
    let credentials = creds(&[(OPENAI_API_KEY, "  "), (LANGCACHE_ID, "cache-1")]);
    assert!(credentials.completion_key().is_none());
    assert!(credentials.require(OPENAI_API_KEY).is_err());
    assert_eq!(credentials.require(LANGCACHE_ID).expect("present"), "cache-1");
}

#[test]
fn or_else_keeps_existing_values() {
    let local = creds(&[(OPENAI_API_KEY, "local")]);
    let stored = creds(&[(OPENAI_API_KEY, "stored"), (LANGCACHE_API_KEY, "cache-key")]);
    let merged = local.or_else(&stored);
    assert_eq!(merged.completion_key(), Some("local"));
    assert_eq!(merged.get(LANGCACHE_API_KEY), Some("cache-key"));
    assert!(merged.cache_pair().is_none());
}

#[test]
fn pairs_require_both_halves() {
    let credentials = creds(&[
        (GOOGLE_SEARCH_ENGINE_ID, "cx"),
        (LANGCACHE_API_KEY, "key"),
        (LANGCACHE_ID, "id"),
    ]);
    assert!(credentials.search_pair().is_none());
    assert_eq!(credentials.cache_pair(), Some(("key", "id")));
}

#[test]
fn debug_output_hides_values() {
    let credentials = creds(&[(OPENAI_API_KEY, "sk-very-secret")]);
    let rendered = format!("{credentials:?}");
    assert!(rendered.contains(OPENAI_API_KEY));
    assert!(!rendered.contains("sk-very-secret"));
    assert_eq!(credentials.known_secrets(), vec!["sk-very-secret".to_owned()]);
}

#[test]
fn env_resolver_reads_only_known_keys() {
    let credentials = credentials_from_env(|key| match key {
        "OPENAI_API_KEY" => Some("sk-env".to_owned()),
        "GOOGLE_SEARCH_API_KEY" => Some(String::new()),
        "UNRELATED" => Some("nope".to_owned()),
        _ => None,
    });
    assert_eq!(credentials.completion_key(), Some("sk-env"));
    assert!(credentials.get(GOOGLE_SEARCH_API_KEY).is_none());
    assert!(credentials.get("UNRELATED").is_none());
}
