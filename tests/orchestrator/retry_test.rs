//! Recipient extraction retries.

use std::time::Duration;

use replysmith::config::RunConfig;
use replysmith::orchestrator::{FieldState, RetryPolicy};

use crate::harness;
use crate::support::ANONYMOUS_PAGE;

#[test]
fn default_policy_is_three_attempts() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.attempts(), 3);
    assert_eq!(
        policy.delays(),
        [Duration::ZERO, Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(RetryPolicy::from_millis(&[]).attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_recipient_fails_after_all_attempts() {
    let h = harness(ANONYMOUS_PAGE, RunConfig::fallback());
    let started = tokio::time::Instant::now();

    let reports = h.orchestrator.scan().await;
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.state, FieldState::Failed);
    assert_eq!(
        report.error.as_deref(),
        Some("could not identify the recipient after 3 attempts")
    );
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(h.provider.calls(), 0);

    let text = replysmith::dom::HostPage::text(h.page.as_ref(), report.field).expect("text");
    assert!(text.starts_with("[Draft unavailable:"));
}

#[tokio::test(start_paused = true)]
async fn custom_policy_controls_attempts() {
    let h = harness(ANONYMOUS_PAGE, RunConfig::fallback());
    let orchestrator = h
        .orchestrator
        .with_retry_policy(RetryPolicy::from_millis(&[0, 250]));
    let started = tokio::time::Instant::now();

    let reports = orchestrator.scan().await;
    assert_eq!(
        reports[0].error.as_deref(),
        Some("could not identify the recipient after 2 attempts")
    );
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert!(started.elapsed() < Duration::from_secs(1));
}
