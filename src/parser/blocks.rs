//! Rich-text block flattening
//!
//! Slack's composer posts formatted messages as a `blocks` JSON array instead
//! of a plain `text` field. Only leaf `text` elements carry the typed words;
//! links, emoji and mentions are skipped.

use super::models::{Block, RichElement};

/// Element type tag for plain-text leaves
const TEXT_ELEMENT: &str = "text";

/// Flatten a JSON-encoded block array into plain text
///
/// Text leaves are concatenated in document order with no separator.
/// Malformed JSON or an unexpected shape yields an empty string.
pub fn decode_rich_text(blob: &str) -> String {
    let blocks: Vec<Block> = match serde_json::from_str(blob) {
        Ok(blocks) => blocks,
        Err(e) => {
            tracing::trace!("Unparseable rich-text blocks: {}", e);
            return String::new();
        }
    };

    let mut out = String::new();
    for block in &blocks {
        for element in &block.elements {
            collect_text(element, &mut out);
        }
    }
    out
}

fn collect_text(element: &RichElement, out: &mut String) {
    if element.kind.as_deref() == Some(TEXT_ELEMENT) {
        if let Some(text) = element.text.as_ref().and_then(|v| v.as_str()) {
            out.push_str(text);
        }
        return;
    }
    for child in &element.elements {
        collect_text(child, out);
    }
}
