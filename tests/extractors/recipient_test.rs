//! Recipient name strategies and their priority order.

use replysmith::dom::SnapshotPage;
use replysmith::extractors::{extract_recipient_info, RecipientExtractor};

use crate::support::{conversation_page, ANONYMOUS_PAGE};

fn page(html: &str) -> SnapshotPage {
    SnapshotPage::new("https://www.linkedin.com/messaging/thread/1/", html)
}

#[test]
fn overlay_header_yields_name_and_byline() {
    let page = page(&conversation_page("Jane Doe"));
    let info = extract_recipient_info(&page).expect("recipient");
    assert_eq!(info.name, "Jane Doe");
    assert_eq!(info.byline.as_deref(), Some("Technical Recruiter at Acme"));
}

#[test]
fn earlier_selector_wins_over_earlier_document_position() {
    let html = r#"<html><body>
      <h2 class="msg-overlay-bubble-header__title">Bob Jones</h2>
      <span class="msg-entity-lockup__entity-title">Alice Smith</span>
    </body></html>"#;
    let info = extract_recipient_info(&page(html)).expect("recipient");
    assert_eq!(info.name, "Alice Smith");
    assert_eq!(info.byline, None);
}

#[test]
fn ui_labels_fall_through_to_next_selector() {
    let html = r#"<html><body>
      <span class="msg-entity-lockup__entity-title">New message</span>
      <span class="msg-s-message-group__name">María-José O'Neil</span>
    </body></html>"#;
    let info = extract_recipient_info(&page(html)).expect("recipient");
    assert_eq!(info.name, "María-José O'Neil");
}

#[test]
fn whitespace_is_normalized() {
    let html = r#"<html><body>
      <span class="msg-entity-lockup__entity-title">
          Jane
          Doe
      </span>
    </body></html>"#;
    let info = extract_recipient_info(&page(html)).expect("recipient");
    assert_eq!(info.name, "Jane Doe");
}

#[test]
fn conversation_container_heading_is_used_without_selectors() {
    let html = r#"<html><body>
      <h1>Messaging</h1>
      <section data-conversation-id="77">
        <h3>Sam Carter</h3>
        <form>
          <div contenteditable="true" role="textbox"></div>
          <button type="submit">Send</button>
        </form>
      </section>
    </body></html>"#;
    let info = extract_recipient_info(&page(html)).expect("recipient");
    assert_eq!(info.name, "Sam Carter");
}

#[test]
fn visible_heading_above_the_form_is_last_resort() {
    let html = r#"<html><body>
      <h2 style="display: none">Hidden Person</h2>
      <h2>Priya Patel</h2>
      <form>
        <div contenteditable="true" role="textbox"></div>
        <button type="submit">Send</button>
      </form>
      <h2>After Form</h2>
    </body></html>"#;
    let info = extract_recipient_info(&page(html)).expect("recipient");
    assert_eq!(info.name, "Priya Patel");
}

#[test]
fn headings_below_the_form_are_ignored() {
    let html = r#"<html><body>
      <form>
        <div contenteditable="true" role="textbox"></div>
        <button type="submit">Send</button>
      </form>
      <h2>Below Form</h2>
    </body></html>"#;
    assert_eq!(extract_recipient_info(&page(html)), None);
}

#[test]
fn anonymous_page_has_no_recipient() {
    assert_eq!(extract_recipient_info(&page(ANONYMOUS_PAGE)), None);
}

#[test]
fn shouting_and_digits_are_not_names() {
    let html = r#"<html><body>
      <span class="msg-entity-lockup__entity-title">ACME RECRUITING</span>
      <span class="msg-s-message-group__name">user12345</span>
    </body></html>"#;
    assert_eq!(extract_recipient_info(&page(html)), None);
}

#[test]
fn custom_selectors_replace_defaults() {
    let html = r#"<html><body>
      <span class="msg-entity-lockup__entity-title">Default Pick</span>
      <span class="who">Custom Pick</span>
      <em class="tagline">Engineering Manager</em>
    </body></html>"#;
    let extractor =
        RecipientExtractor::new(vec![".who".to_owned()], vec![".tagline".to_owned()]);
    let info = extractor.extract(&page(html)).expect("recipient");
    assert_eq!(info.name, "Custom Pick");
    assert_eq!(info.byline.as_deref(), Some("Engineering Manager"));
}
