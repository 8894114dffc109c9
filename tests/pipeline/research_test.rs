//! Recipient research.

use replysmith::pipeline::research_recipient;
use replysmith::types::{RecipientInfo, ResearchOutcome};

use crate::support::{ScriptedProvider, StaticSearch};

fn jane() -> RecipientInfo {
    RecipientInfo {
        name: "Jane Doe".to_owned(),
        byline: Some("Technical Recruiter at Acme".to_owned()),
    }
}

#[tokio::test]
async fn missing_search_is_unavailable_without_model_calls() {
    let provider = ScriptedProvider::fixed("query");
    let outcome = research_recipient(Some(&provider), None, &jane()).await;

    assert!(matches!(outcome, ResearchOutcome::Unavailable { .. }));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn model_query_is_sent_to_search() {
    let provider = ScriptedProvider::fixed("\"jane doe recruiter acme\"\nextra line");
    let search = StaticSearch::one_hit();

    let outcome = research_recipient(Some(&provider), Some(&search), &jane()).await;
    let findings = outcome.findings().expect("found");
    assert_eq!(findings.search_term, "jane doe recruiter acme");
    assert_eq!(findings.search_results.items.len(), 1);
    assert_eq!(search.queries(), ["jane doe recruiter acme"]);
}

#[tokio::test]
async fn fallback_query_without_provider() {
    let search = StaticSearch::one_hit();
    research_recipient(None, Some(&search), &jane()).await;
    assert_eq!(search.queries(), ["Jane Doe - Technical Recruiter at Acme"]);

    let search = StaticSearch::one_hit();
    let nameless_byline = RecipientInfo {
        name: "Sam Carter".to_owned(),
        byline: None,
    };
    research_recipient(None, Some(&search), &nameless_byline).await;
    assert_eq!(search.queries(), ["Sam Carter"]);
}

#[tokio::test]
async fn failed_or_blank_model_query_falls_back() {
    let search = StaticSearch::one_hit();
    research_recipient(Some(&ScriptedProvider::failing()), Some(&search), &jane()).await;
    research_recipient(Some(&ScriptedProvider::fixed("   ")), Some(&search), &jane()).await;
    assert_eq!(
        search.queries(),
        [
            "Jane Doe - Technical Recruiter at Acme",
            "Jane Doe - Technical Recruiter at Acme"
        ]
    );
}

#[tokio::test]
async fn search_failure_is_unavailable() {
    let search = StaticSearch::failing();
    let outcome = research_recipient(None, Some(&search), &jane()).await;

    match outcome {
        ResearchOutcome::Unavailable { error } => assert!(error.contains("mock search outage")),
        other => panic!("expected unavailable, got {other:?}"),
    }
    assert_eq!(search.calls(), 1);
}
