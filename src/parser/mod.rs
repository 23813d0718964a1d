// Parser module - turns intercepted Slack API calls into pending audit events
//
// The classifier is configured with a static table of endpoint rules. Each
// rule pairs a URL pattern with the kind of event it produces; the table is
// passed in at construction so nothing here is a global.

pub mod blocks;
pub mod form;
pub mod models;

use crate::events::{PendingEvent, ReactionType};
use form::FormFields;
use models::InterceptedRequest;
use regex::Regex;

pub use blocks::decode_rich_text;

/// Which Slack write endpoint a request hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    PostMessage,
    ReactionAdd,
    ReactionRemove,
}

/// Slack Web API write endpoints we audit
///
/// Any workspace host under slack.com; the method name may be followed by a
/// query string (the web client appends `?_x_id=...&slack_route=...`).
pub const SLACK_ENDPOINTS: &[(&str, EndpointKind)] = &[
    (
        r"^https://[^/]+\.slack\.com/api/chat\.postMessage(?:[?#]|$)",
        EndpointKind::PostMessage,
    ),
    (
        r"^https://[^/]+\.slack\.com/api/reactions\.add(?:[?#]|$)",
        EndpointKind::ReactionAdd,
    ),
    (
        r"^https://[^/]+\.slack\.com/api/reactions\.remove(?:[?#]|$)",
        EndpointKind::ReactionRemove,
    ),
];

/// One entry of the classifier's endpoint table
#[derive(Debug, Clone)]
pub struct EndpointRule {
    pattern: Regex,
    kind: EndpointKind,
}

impl EndpointRule {
    pub fn new(pattern: &str, kind: EndpointKind) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            kind,
        })
    }
}

/// Decides whether a request is an audited action and extracts its fields
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<EndpointRule>,
}

impl Classifier {
    pub fn new(rules: Vec<EndpointRule>) -> Self {
        Self { rules }
    }

    /// Build a classifier from a `(pattern, kind)` table
    pub fn from_table(table: &[(&str, EndpointKind)]) -> Result<Self, regex::Error> {
        let rules = table
            .iter()
            .map(|(pattern, kind)| EndpointRule::new(pattern, *kind))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Classifier for the Slack web client
    pub fn slack() -> Result<Self, regex::Error> {
        Self::from_table(SLACK_ENDPOINTS)
    }

    /// First rule whose pattern matches the URL
    pub fn match_endpoint(&self, url: &str) -> Option<EndpointKind> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(url))
            .map(|rule| rule.kind)
    }

    /// Classify an intercepted request
    ///
    /// Returns `None` for anything that is not a POST to an audited endpoint,
    /// and for requests whose body was not captured. Missing fields become
    /// empty strings.
    pub fn classify(&self, request: &InterceptedRequest) -> Option<PendingEvent> {
        if !request.method.eq_ignore_ascii_case("POST") {
            return None;
        }
        let kind = self.match_endpoint(&request.url)?;

        let Some(body) = request.request_body.as_ref() else {
            tracing::debug!("Audited endpoint without a captured body: {}", request.url);
            return None;
        };
        if let Some(error) = &body.error {
            tracing::debug!("Browser could not capture body ({}): {}", error, request.url);
        }
        let fields = FormFields::from_body(body);
        if fields.is_empty() {
            tracing::debug!("No form fields decoded for {}", request.url);
        }

        Some(Self::build_event(kind, &fields))
    }

    /// Map decoded fields onto the typed event for an endpoint
    pub fn build_event(kind: EndpointKind, fields: &FormFields) -> PendingEvent {
        match kind {
            EndpointKind::PostMessage => PendingEvent::Post {
                timestamp: fields.first_or_empty("ts"),
                channel_id: fields.first_or_empty("channel"),
                text: match fields.first("text") {
                    Some(text) => text.to_string(),
                    None => decode_rich_text(fields.first("blocks").unwrap_or_default()),
                },
            },
            EndpointKind::ReactionAdd | EndpointKind::ReactionRemove => PendingEvent::Reaction {
                timestamp: fields.first_or_empty("timestamp"),
                channel_id: fields.first_or_empty("channel"),
                emoji: fields.first_or_empty("name"),
                reaction_type: if kind == EndpointKind::ReactionAdd {
                    ReactionType::Add
                } else {
                    ReactionType::Remove
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::RequestBody;
    use std::collections::HashMap;

    const POST_URL: &str = "https://acme.slack.com/api/chat.postMessage?_x_id=45a143e3-1746449646.826&slack_route=T04FQAVAVDZ";

    fn request(url: &str, method: &str, fields: &[(&str, &str)]) -> InterceptedRequest {
        let form: HashMap<String, Vec<String>> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
            .collect();
        InterceptedRequest {
            url: url.to_string(),
            method: method.to_string(),
            tab_id: Some(7),
            request_body: Some(RequestBody {
                form_data: Some(form),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_post_with_text() {
        let classifier = Classifier::slack().unwrap();
        let event = classifier.classify(&request(
            POST_URL,
            "POST",
            &[("ts", "100.1"), ("channel", "C1"), ("text", "hello")],
        ));

        assert_eq!(
            event,
            Some(PendingEvent::Post {
                timestamp: "100.1".to_string(),
                channel_id: "C1".to_string(),
                text: "hello".to_string(),
            })
        );
    }

    #[test]
    fn test_post_falls_back_to_blocks() {
        let classifier = Classifier::slack().unwrap();
        let event = classifier
            .classify(&request(
                POST_URL,
                "POST",
                &[
                    ("ts", "100.1"),
                    ("channel", "C1"),
                    (
                        "blocks",
                        r#"[{"elements":[{"elements":[{"type":"text","text":"hi"}]}]}]"#,
                    ),
                ],
            ))
            .unwrap();

        match event {
            PendingEvent::Post { text, .. } => assert_eq!(text, "hi"),
            other => panic!("Expected Post, got {:?}", other),
        }
    }

    #[test]
    fn test_text_field_wins_over_blocks() {
        let classifier = Classifier::slack().unwrap();
        let event = classifier
            .classify(&request(
                POST_URL,
                "POST",
                &[
                    ("text", "plain"),
                    (
                        "blocks",
                        r#"[{"elements":[{"elements":[{"type":"text","text":"rich"}]}]}]"#,
                    ),
                ],
            ))
            .unwrap();

        match event {
            PendingEvent::Post { text, .. } => assert_eq!(text, "plain"),
            other => panic!("Expected Post, got {:?}", other),
        }
    }

    #[test]
    fn test_reaction_add() {
        let classifier = Classifier::slack().unwrap();
        let event = classifier.classify(&request(
            "https://acme.slack.com/api/reactions.add?_x_id=1",
            "POST",
            &[("channel", "C1"), ("name", "eyes"), ("timestamp", "200.2")],
        ));

        assert_eq!(
            event,
            Some(PendingEvent::Reaction {
                timestamp: "200.2".to_string(),
                channel_id: "C1".to_string(),
                emoji: "eyes".to_string(),
                reaction_type: ReactionType::Add,
            })
        );
    }

    #[test]
    fn test_reaction_remove_with_query_string() {
        let classifier = Classifier::slack().unwrap();
        let event = classifier
            .classify(&request(
                "https://acme.slack.com/api/reactions.remove?_x_num_retries=0",
                "POST",
                &[("channel", "C1"), ("name", "eyes"), ("timestamp", "200.2")],
            ))
            .unwrap();

        match event {
            PendingEvent::Reaction { reaction_type, .. } => {
                assert_eq!(reaction_type, ReactionType::Remove)
            }
            other => panic!("Expected Reaction, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_degrade_to_empty() {
        let classifier = Classifier::slack().unwrap();
        let event = classifier.classify(&request(
            "https://acme.slack.com/api/reactions.add",
            "POST",
            &[],
        ));

        assert_eq!(
            event,
            Some(PendingEvent::Reaction {
                timestamp: String::new(),
                channel_id: String::new(),
                emoji: String::new(),
                reaction_type: ReactionType::Add,
            })
        );
    }

    #[test]
    fn test_unscoped_requests_are_ignored() {
        let classifier = Classifier::slack().unwrap();
        let fields = [("channel", "C1"), ("text", "hello")];

        for (url, method) in [
            (POST_URL, "GET"),
            ("https://acme.slack.com/api/conversations.history", "POST"),
            ("https://acme.slack.com/api/chat.postMessageExtra", "POST"),
            ("https://evil.example.com/api/chat.postMessage", "POST"),
            ("http://acme.slack.com/api/chat.postMessage", "POST"),
            ("https://slack.com.evil.io/api/reactions.add", "POST"),
        ] {
            assert!(
                classifier.classify(&request(url, method, &fields)).is_none(),
                "{} {} should not classify",
                method,
                url
            );
        }
    }

    #[test]
    fn test_missing_body_yields_nothing() {
        let classifier = Classifier::slack().unwrap();
        let mut req = request(POST_URL, "POST", &[]);
        req.request_body = None;
        assert!(classifier.classify(&req).is_none());
    }

    #[test]
    fn test_custom_table() {
        let classifier = Classifier::from_table(&[(
            r"^https://chat\.internal/api/post$",
            EndpointKind::PostMessage,
        )])
        .unwrap();

        assert_eq!(
            classifier.match_endpoint("https://chat.internal/api/post"),
            Some(EndpointKind::PostMessage)
        );
        assert_eq!(classifier.match_endpoint(POST_URL), None);
    }
}
