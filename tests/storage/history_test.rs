//! Draft history.

use std::sync::Arc;

use replysmith::history::{HistoryContext, HistoryEntry, HistoryLog, MAX_HISTORY_ENTRIES};
use replysmith::storage::MemoryStore;
use replysmith::types::RecipientInfo;

fn entry(message: &str) -> HistoryEntry {
    HistoryEntry::new(
        message.to_owned(),
        HistoryContext {
            recipient: RecipientInfo {
                name: "Jane Doe".to_owned(),
                byline: None,
            },
            category: "Networking".to_owned(),
            chat_summary: None,
            page_url: Some("https://www.linkedin.com/messaging/".to_owned()),
        },
    )
}

#[test]
fn newest_entry_comes_first() {
    let log = HistoryLog::new(Arc::new(MemoryStore::new()));
    log.append(entry("first")).expect("append");
    log.append(entry("second")).expect("append");

    let messages: Vec<String> = log.entries().expect("entries").into_iter().map(|e| e.message).collect();
    assert_eq!(messages, ["second", "first"]);
}

#[test]
fn log_is_capped_at_one_hundred() {
    let log = HistoryLog::new(Arc::new(MemoryStore::new()));
    for i in 0..=MAX_HISTORY_ENTRIES {
        log.append(entry(&format!("draft {i}"))).expect("append");
    }

    let entries = log.entries().expect("entries");
    assert_eq!(entries.len(), MAX_HISTORY_ENTRIES);
    assert_eq!(entries[0].message, format!("draft {MAX_HISTORY_ENTRIES}"));
    assert!(entries.iter().all(|e| e.message != "draft 0"));
}

#[test]
fn entries_serialize_with_camel_case_context() {
    let value = serde_json::to_value(entry("hello")).expect("serialize");
    assert_eq!(value["message"], "hello");
    assert_eq!(value["context"]["pageUrl"], "https://www.linkedin.com/messaging/");
    assert!(value["id"].is_string());
}

#[test]
fn clear_empties_the_log() {
    let log = HistoryLog::with_capacity(Arc::new(MemoryStore::new()), 5);
    log.append(entry("x")).expect("append");
    log.clear().expect("clear");
    assert!(log.entries().expect("entries").is_empty());
}
