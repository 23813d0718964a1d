// Audit records that flow from the classifier through correlation into storage
//
// A record starts life as a PendingEvent (classifier output, no enrichment),
// picks up display-only fields from the page context, and is persisted once
// as a LogRecord. The JSON shape matches what the side-panel UI already reads:
// camelCase keys, `kind` as the discriminant, `ts`/`type` wire names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application tag carried by every record
pub const APP_SLACK: &str = "slack";

/// Whether a reaction was added or removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Add,
    Remove,
}

impl ReactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Add => "add",
            ReactionType::Remove => "remove",
        }
    }

    /// Parse the stored column value (unknown values read as `Remove`, matching the
    /// endpoint fallback in the classifier)
    pub fn from_str(s: &str) -> Self {
        match s {
            "add" => ReactionType::Add,
            _ => ReactionType::Remove,
        }
    }
}

/// Classifier output before any asynchronous enrichment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingEvent {
    Post {
        timestamp: String,
        channel_id: String,
        text: String,
    },
    Reaction {
        timestamp: String,
        channel_id: String,
        emoji: String,
        reaction_type: ReactionType,
    },
}

/// Display-only fields resolved from the rendered page
///
/// Every field is optional: a correlation miss leaves the default (all `None`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrichment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.channel_name.is_none() && self.text.is_none() && self.user.is_none()
    }
}

impl PendingEvent {
    pub fn timestamp(&self) -> &str {
        match self {
            PendingEvent::Post { timestamp, .. } | PendingEvent::Reaction { timestamp, .. } => {
                timestamp
            }
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            PendingEvent::Post { channel_id, .. } | PendingEvent::Reaction { channel_id, .. } => {
                channel_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PendingEvent::Post { .. } => "post",
            PendingEvent::Reaction { .. } => "reaction",
        }
    }

    /// Merge enrichment into the final record
    ///
    /// Posts already know their own text, so only the channel name is taken.
    pub fn finalize(self, enrichment: Enrichment) -> LogRecord {
        let activity = match self {
            PendingEvent::Post {
                timestamp,
                channel_id,
                text,
            } => Activity::Post {
                timestamp,
                channel_id,
                channel_name: enrichment.channel_name,
                text,
            },
            PendingEvent::Reaction {
                timestamp,
                channel_id,
                emoji,
                reaction_type,
            } => Activity::Reaction {
                timestamp,
                channel_id,
                channel_name: enrichment.channel_name,
                emoji,
                reaction_type,
                text: enrichment.text,
                user: enrichment.user,
            },
        };
        LogRecord::new(activity)
    }
}

/// The audited action, one variant per kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Activity {
    Post {
        #[serde(rename = "ts")]
        timestamp: String,
        #[serde(rename = "channelId")]
        channel_id: String,
        #[serde(
            rename = "channelName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        channel_name: Option<String>,
        text: String,
    },
    Reaction {
        #[serde(rename = "ts")]
        timestamp: String,
        #[serde(rename = "channelId")]
        channel_id: String,
        #[serde(
            rename = "channelName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        channel_name: Option<String>,
        emoji: String,
        #[serde(rename = "type")]
        reaction_type: ReactionType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
    },
}

fn default_app() -> String {
    APP_SLACK.to_string()
}

/// A finalized audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(default = "default_app")]
    pub app: String,
    /// Assigned by the store at write time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub activity: Activity,
}

impl LogRecord {
    pub fn new(activity: Activity) -> Self {
        Self {
            app: default_app(),
            logged_at: None,
            activity,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.activity {
            Activity::Post { .. } => "post",
            Activity::Reaction { .. } => "reaction",
        }
    }

    pub fn timestamp(&self) -> &str {
        match &self.activity {
            Activity::Post { timestamp, .. } | Activity::Reaction { timestamp, .. } => timestamp,
        }
    }

    pub fn channel_id(&self) -> &str {
        match &self.activity {
            Activity::Post { channel_id, .. } | Activity::Reaction { channel_id, .. } => {
                channel_id
            }
        }
    }

    pub fn channel_name(&self) -> Option<&str> {
        match &self.activity {
            Activity::Post { channel_name, .. } | Activity::Reaction { channel_name, .. } => {
                channel_name.as_deref()
            }
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.activity {
            Activity::Post { text, .. } => Some(text),
            Activity::Reaction { text, .. } => text.as_deref(),
        }
    }
}

/// A record as read back from the store, with its store-assigned id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: LogRecord,
}

/// Push notification sent to UI listeners after every successful append
#[derive(Debug, Clone, Serialize)]
pub struct LogSaved {
    pub action: &'static str,
    pub entry: StoredRecord,
}

impl LogSaved {
    pub fn new(entry: StoredRecord) -> Self {
        Self {
            action: "LOG_SAVED",
            entry,
        }
    }
}
