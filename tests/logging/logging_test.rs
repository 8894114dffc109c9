//! Tests for `src/logging.rs`.

use replysmith::logging::{LoggingGuard, DEFAULT_FILTER, LOG_FILE_PREFIX};

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn init_production_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("nested").join("logs");
    assert!(!logs_dir.exists());

    // Only one global subscriber per process; a second install errors after
    // the directory is created.
    if let Ok(guard) = replysmith::logging::init_production(&logs_dir) {
        assert_eq!(guard.logs_dir(), logs_dir.as_path());
    }
    assert!(logs_dir.exists(), "logs directory should be created");
}

#[test]
fn default_filter_is_a_valid_directive() {
    let filter = tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER);
    assert!(filter.is_ok());
    assert!(DEFAULT_FILTER.starts_with("info,"));
    assert!(LOG_FILE_PREFIX.starts_with("replysmith"));
}

#[test]
fn cli_logging_tolerates_repeat_init() {
    replysmith::logging::init_cli();
    replysmith::logging::init_cli();
}
