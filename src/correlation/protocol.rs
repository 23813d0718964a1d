//! Messages exchanged between the background pipeline and page contexts
//!
//! Background-initiated requests are one-shot: each carries its own reply
//! slot and is answered at most once. `MessageInfo` is the one page-initiated
//! message; it hands over a finished record for the background to persist.

use crate::events::{Enrichment, LogRecord};
use serde::{Deserialize, Serialize};

/// Requests the background sends to a page context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum PageRequest {
    /// Display name for a channel id (after a post)
    #[serde(rename = "GET_CHANNEL_NAME")]
    ResolveChannelName {
        #[serde(rename = "channelId")]
        channel_id: String,
    },
    /// Body, author and channel name of a rendered message (after a reaction)
    #[serde(rename = "LOOKUP_MESSAGE")]
    ResolveMessage {
        #[serde(rename = "ts")]
        timestamp: String,
        #[serde(rename = "channelId")]
        channel_id: String,
    },
}

impl PageRequest {
    pub fn action(&self) -> &'static str {
        match self {
            PageRequest::ResolveChannelName { .. } => "GET_CHANNEL_NAME",
            PageRequest::ResolveMessage { .. } => "LOOKUP_MESSAGE",
        }
    }
}

/// Page context answers, one variant per request kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageReply {
    ChannelName(ChannelNameReply),
    Message(Enrichment),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelNameReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
}

/// Page-initiated push of a finished record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub record: LogRecord,
}
