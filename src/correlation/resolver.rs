//! DOM resolution over a tab's rendered HTML
//!
//! Slack renders the same message differently depending on the view: the
//! normal channel view keys message rows by their timestamp, while the unread
//! view uses composite keys like `unreads_view_message-C123-1746449122.020599`.
//! Locating a message is therefore an ordered list of strategies, first match
//! wins. Inside a message row the body and sender live under different
//! elements in the current and legacy UI, so those are ordered lists too.

use super::protocol::{ChannelNameReply, PageReply, PageRequest};
use crate::events::Enrichment;
use scraper::{ElementRef, Html, Node, Selector};

/// Builds a CSS selector for a message timestamp
type SelectorTemplate = fn(&str) -> String;

/// One way of finding a message row by timestamp
#[derive(Clone, Copy)]
pub struct MessageLocator {
    pub name: &'static str,
    template: SelectorTemplate,
}

impl MessageLocator {
    pub const fn new(name: &'static str, template: SelectorTemplate) -> Self {
        Self { name, template }
    }

    /// First element in the document matched by this strategy
    pub fn locate<'a>(&self, document: &'a Html, timestamp: &str) -> Option<ElementRef<'a>> {
        let css = (self.template)(&css_string(timestamp));
        let selector = match Selector::parse(&css) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::debug!("Locator '{}' built an invalid selector: {:?}", self.name, e);
                return None;
            }
        };
        document.select(&selector).next()
    }
}

impl std::fmt::Debug for MessageLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLocator")
            .field("name", &self.name)
            .finish()
    }
}

fn exact_key(ts: &str) -> String {
    format!(r#"[data-item-key="{ts}"], [data-message-ts="{ts}"]"#)
}

// Unread view: message-<channel>-<ts> / unreads_view_message-<...>-<ts>
fn item_key_suffix(ts: &str) -> String {
    format!(r#"[data-item-key$="-{ts}"]"#)
}

fn id_suffix(ts: &str) -> String {
    format!(r#"[id$="-{ts}"]"#)
}

/// Message row strategies, tried in order
pub const SLACK_LOCATORS: &[MessageLocator] = &[
    MessageLocator::new("exact", exact_key),
    MessageLocator::new("item-key-suffix", item_key_suffix),
    MessageLocator::new("id-suffix", id_suffix),
];

/// Message body, current UI first
pub const SLACK_TEXT_SELECTORS: &[&str] = &[r#"[data-qa="message-text"]"#, ".p-rich_text_section"];

/// Sender name, current UI first
pub const SLACK_USER_SELECTORS: &[&str] = &[
    "button[data-message-sender]",
    r#"[data-qa="message_sender_name"]"#,
];

/// Answers page requests from a document snapshot
#[derive(Debug, Clone)]
pub struct DomResolver {
    locators: Vec<MessageLocator>,
    text_selectors: Vec<Selector>,
    user_selectors: Vec<Selector>,
}

impl DomResolver {
    pub fn new(
        locators: Vec<MessageLocator>,
        text_selectors: &[&str],
        user_selectors: &[&str],
    ) -> Self {
        Self {
            locators,
            text_selectors: parse_selectors(text_selectors),
            user_selectors: parse_selectors(user_selectors),
        }
    }

    /// Resolver tuned to Slack's web client markup
    pub fn slack() -> Self {
        Self::new(
            SLACK_LOCATORS.to_vec(),
            SLACK_TEXT_SELECTORS,
            SLACK_USER_SELECTORS,
        )
    }

    /// Answer a request against raw HTML
    pub fn handle(&self, html: &str, request: &PageRequest) -> PageReply {
        let document = Html::parse_document(html);
        match request {
            PageRequest::ResolveChannelName { channel_id } => {
                PageReply::ChannelName(ChannelNameReply {
                    channel_name: self.channel_name(&document, channel_id),
                })
            }
            PageRequest::ResolveMessage {
                timestamp,
                channel_id,
            } => PageReply::Message(self.message_details(&document, timestamp, channel_id)),
        }
    }

    /// Trimmed text of the element whose id is the channel id
    pub fn channel_name(&self, document: &Html, channel_id: &str) -> Option<String> {
        if channel_id.is_empty() {
            return None;
        }
        let selector = Selector::parse(&format!(r#"[id="{}"]"#, css_string(channel_id))).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|el| non_empty(inner_text(el).trim()))
    }

    /// Find the message row for a timestamp, trying each locator in order
    pub fn find_message<'a>(&self, document: &'a Html, timestamp: &str) -> Option<ElementRef<'a>> {
        if timestamp.is_empty() {
            return None;
        }
        self.locators.iter().find_map(|locator| {
            let found = locator.locate(document, timestamp);
            if found.is_some() {
                tracing::trace!("Message {} located by '{}'", timestamp, locator.name);
            }
            found
        })
    }

    /// Channel name, message body and sender for a reaction target
    ///
    /// Missing pieces stay `None`; an unlocatable message still reports the
    /// channel name when the sidebar has it.
    pub fn message_details(&self, document: &Html, timestamp: &str, channel_id: &str) -> Enrichment {
        let channel_name = self.channel_name(document, channel_id);

        let Some(message) = self.find_message(document, timestamp) else {
            return Enrichment {
                channel_name,
                ..Default::default()
            };
        };

        let text = first_text(message, &self.text_selectors)
            .and_then(|text| non_empty(text.trim()));

        // Sender buttons sometimes repeat the name on a second line
        let user = first_text(message, &self.user_selectors).and_then(|text| {
            let first_line = text.split('\n').next().unwrap_or_default();
            non_empty(first_line.trim())
        });

        Enrichment {
            channel_name,
            text,
            user,
        }
    }
}

impl Default for DomResolver {
    fn default() -> Self {
        Self::slack()
    }
}

fn parse_selectors(sources: &[&str]) -> Vec<Selector> {
    sources
        .iter()
        .filter_map(|src| match Selector::parse(src) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::warn!("Ignoring invalid selector {:?}: {:?}", src, e);
                None
            }
        })
        .collect()
}

/// Text of the first descendant matched by any selector, in selector order
fn first_text(element: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .find_map(|selector| element.select(selector).next())
        .map(inner_text)
}

/// Elements whose text never shows up on screen
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that start a new line when rendered
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Rendered text of an element: line breaks at `<br>` and block boundaries,
/// hidden subtrees skipped
fn inner_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                if HIDDEN_TAGS.contains(&name) {
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    line_break(out);
                }
                collect_text(child_el, out);
                if block {
                    line_break(out);
                }
            }
            _ => {}
        }
    }
}

fn line_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Escape a value for use inside a double-quoted CSS attribute selector
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\a "),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const NORMAL_VIEW: &str = r#"
        <html><body>
          <nav>
            <span id="C1"> general </span>
            <span id="C2"></span>
          </nav>
          <div data-item-key="200.2">
            <button data-message-sender="U1">Alice
Alice</button>
            <div data-qa="message-text"> original body </div>
          </div>
          <div data-item-key="300.3">
            <span data-qa="message_sender_name">Bob</span>
            <div class="p-rich_text_section">legacy body</div>
          </div>
        </body></html>
    "#;

    const UNREAD_VIEW: &str = r#"
        <html><body>
          <div data-item-key="unreads_view_message-C1-400.4">
            <button data-message-sender="U3">Carol</button>
            <div data-qa="message-text">from unreads</div>
          </div>
          <div id="message-C1-500.5">
            <button data-message-sender="U4">Dan</button>
          </div>
        </body></html>
    "#;

    fn lookup(html: &str, ts: &str, channel: &str) -> Enrichment {
        let reply = DomResolver::slack().handle(
            html,
            &PageRequest::ResolveMessage {
                timestamp: ts.to_string(),
                channel_id: channel.to_string(),
            },
        );
        match reply {
            PageReply::Message(details) => details,
            other => panic!("Expected Message reply, got {:?}", other),
        }
    }

    #[test]
    fn test_channel_name_is_trimmed() {
        let reply = DomResolver::slack().handle(
            NORMAL_VIEW,
            &PageRequest::ResolveChannelName {
                channel_id: "C1".to_string(),
            },
        );
        assert_eq!(
            reply,
            PageReply::ChannelName(ChannelNameReply {
                channel_name: Some("general".to_string())
            })
        );
    }

    #[test]
    fn test_empty_or_missing_channel_is_none() {
        let resolver = DomResolver::slack();
        let document = Html::parse_document(NORMAL_VIEW);
        assert_eq!(resolver.channel_name(&document, "C2"), None);
        assert_eq!(resolver.channel_name(&document, "C404"), None);
        assert_eq!(resolver.channel_name(&document, ""), None);
    }

    #[test]
    fn test_exact_match_current_ui() {
        let details = lookup(NORMAL_VIEW, "200.2", "C1");
        assert_eq!(details.channel_name.as_deref(), Some("general"));
        assert_eq!(details.text.as_deref(), Some("original body"));
        assert_eq!(details.user.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_exact_match_legacy_ui() {
        let details = lookup(NORMAL_VIEW, "300.3", "C1");
        assert_eq!(details.text.as_deref(), Some("legacy body"));
        assert_eq!(details.user.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_unread_view_suffix_matches() {
        let details = lookup(UNREAD_VIEW, "400.4", "C1");
        assert_eq!(details.text.as_deref(), Some("from unreads"));
        assert_eq!(details.user.as_deref(), Some("Carol"));
        // No sidebar in this snapshot
        assert_eq!(details.channel_name, None);

        let details = lookup(UNREAD_VIEW, "500.5", "C1");
        assert_eq!(details.user.as_deref(), Some("Dan"));
        assert_eq!(details.text, None);
    }

    #[test]
    fn test_unknown_message_keeps_channel_name() {
        let details = lookup(NORMAL_VIEW, "999.9", "C1");
        assert_eq!(
            details,
            Enrichment {
                channel_name: Some("general".to_string()),
                text: None,
                user: None,
            }
        );
    }

    #[test]
    fn test_empty_timestamp_matches_nothing() {
        let details = lookup(UNREAD_VIEW, "", "C1");
        assert!(details.is_empty());
    }

    #[test]
    fn test_quotes_in_identifiers_do_not_break_selectors() {
        let details = lookup(NORMAL_VIEW, r#"1"] , div[x="#, r#"C"1"#);
        assert!(details.is_empty());
    }

    #[test]
    fn test_sender_split_by_br_keeps_first_line() {
        let html = r#"
            <div data-item-key="700.7">
              <button data-message-sender="U1">Alice<br>Alice</button>
              <div data-qa="message-text"><p>first</p><p>second</p></div>
            </div>
        "#;
        let details = lookup(html, "700.7", "C1");
        assert_eq!(details.user.as_deref(), Some("Alice"));
        assert_eq!(details.text.as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn test_sender_split_by_block_children() {
        let html = r#"
            <div data-item-key="710.1">
              <button data-message-sender="U1"><div>Alice</div><div>Alice</div></button>
            </div>
        "#;
        assert_eq!(lookup(html, "710.1", "C1").user.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_script_and_style_text_is_skipped() {
        let html = r#"
            <div data-item-key="800.8">
              <div data-qa="message-text">hello <b>world</b><script>var x = 1;</script><style>.a{}</style></div>
            </div>
        "#;
        let details = lookup(html, "800.8", "C1");
        assert_eq!(details.text.as_deref(), Some("hello world"));
    }

    #[test]
    fn test_locator_order_prefers_exact() {
        let html = r#"
            <div id="thread-600.6"><button data-message-sender="U9">Suffix</button></div>
            <div data-message-ts="600.6"><button data-message-sender="U8">Exact</button></div>
        "#;
        let details = lookup(html, "600.6", "C1");
        assert_eq!(details.user.as_deref(), Some("Exact"));
    }
}
