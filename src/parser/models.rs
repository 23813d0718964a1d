// Wire models for intercepted requests and Slack rich-text blocks
//
// These mirror what the browser shim forwards (the webRequest `details` shape)
// and the `blocks` JSON that Slack's web client posts. Only the fields we
// need are modelled; serde ignores the rest.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Browser tab identifier; the shim sends -1 for requests not tied to a tab
pub type TabId = i64;

/// An outgoing request observed by the browser shim
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptedRequest {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub tab_id: Option<TabId>,
    #[serde(default)]
    pub request_body: Option<RequestBody>,
}

/// Request body as captured by the browser
///
/// Either the browser already parsed a form (`formData`) or it hands over the
/// raw upload chunks (`raw`). The shim base64-encodes raw bytes for transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    #[serde(default)]
    pub form_data: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    pub raw: Option<Vec<UploadChunk>>,
    /// Set by the browser when it could not capture the body
    #[serde(default)]
    pub error: Option<String>,
}

/// One element of a raw upload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadChunk {
    /// Base64-encoded bytes
    #[serde(default)]
    pub bytes: Option<String>,
    /// File uploads carry a path instead of bytes; we never read these
    #[serde(default)]
    pub file: Option<String>,
}

/// Top-level rich-text block (`{"type": "rich_text", "elements": [...]}`)
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub elements: Vec<RichElement>,
}

/// A rich-text element; sections and lists nest further elements,
/// leaves carry text
#[derive(Debug, Clone, Deserialize)]
pub struct RichElement {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Leaf text. Kept untyped so that unrelated element kinds with a
    /// non-string `text` do not reject the whole payload.
    #[serde(default)]
    pub text: Option<serde_json::Value>,
    #[serde(default)]
    pub elements: Vec<RichElement>,
}
