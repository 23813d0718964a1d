//! Page agent - the page-side half of the correlation protocol
//!
//! One agent task per browser tab. The agent owns the tab's latest rendered
//! HTML and is the only thing that reads it; the background reaches it only
//! through its mailbox.
//!
//! Parsing a rendered page is CPU-bound and snapshots can run to tens of
//! megabytes, so each request is answered on the blocking pool. Requests for
//! one tab are still answered in arrival order.

use super::protocol::{PageReply, PageRequest};
use super::resolver::DomResolver;
use crate::parser::models::TabId;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Commands accepted by a page agent
pub enum AgentCommand {
    /// Replace the rendered document
    Snapshot(String),
    /// Answer a background request through the reply slot
    Request {
        request: PageRequest,
        reply: oneshot::Sender<PageReply>,
    },
    Shutdown,
}

/// Page-side task for a single tab
pub struct PageAgent {
    tab_id: TabId,
    document: Arc<str>,
    resolver: Arc<DomResolver>,
    rx: mpsc::Receiver<AgentCommand>,
}

impl PageAgent {
    pub fn new(tab_id: TabId, resolver: Arc<DomResolver>, rx: mpsc::Receiver<AgentCommand>) -> Self {
        Self {
            tab_id,
            document: Arc::from(""),
            resolver,
            rx,
        }
    }

    /// Serve commands until shutdown or until every sender is gone
    pub async fn run(mut self) {
        tracing::debug!("Page agent started for tab {}", self.tab_id);

        while let Some(command) = self.rx.recv().await {
            match command {
                AgentCommand::Snapshot(html) => {
                    tracing::trace!(
                        "Tab {} snapshot updated ({} bytes)",
                        self.tab_id,
                        html.len()
                    );
                    self.document = Arc::from(html);
                }
                AgentCommand::Request { request, reply } => {
                    let action = request.action();
                    let Some(answer) = self.answer(request).await else {
                        // Dropping the reply slot tells the requester there is no answer
                        continue;
                    };
                    tracing::trace!("Tab {} answered {}: {:?}", self.tab_id, action, answer);
                    // Requester may have given up; nothing to do then
                    let _ = reply.send(answer);
                }
                AgentCommand::Shutdown => break,
            }
        }

        tracing::debug!("Page agent for tab {} stopped", self.tab_id);
    }

    async fn answer(&self, request: PageRequest) -> Option<PageReply> {
        let resolver = Arc::clone(&self.resolver);
        let document = Arc::clone(&self.document);
        match tokio::task::spawn_blocking(move || resolver.handle(&document, &request)).await {
            Ok(answer) => Some(answer),
            Err(e) => {
                tracing::warn!("Tab {} lookup failed: {}", self.tab_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::protocol::ChannelNameReply;

    #[tokio::test]
    async fn test_agent_answers_from_latest_snapshot() {
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(PageAgent::new(1, Arc::new(DomResolver::slack()), rx).run());

        tx.send(AgentCommand::Snapshot(r#"<span id="C1">old</span>"#.to_string()))
            .await
            .unwrap();
        tx.send(AgentCommand::Snapshot(r#"<span id="C1">new</span>"#.to_string()))
            .await
            .unwrap();

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(AgentCommand::Request {
            request: PageRequest::ResolveChannelName {
                channel_id: "C1".to_string(),
            },
            reply: reply_tx,
        })
        .await
        .unwrap();

        assert_eq!(
            reply_rx.await.unwrap(),
            PageReply::ChannelName(ChannelNameReply {
                channel_name: Some("new".to_string())
            })
        );

        tx.send(AgentCommand::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_large_snapshot_does_not_stall_runtime() {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(PageAgent::new(3, Arc::new(DomResolver::slack()), rx).run());

        let mut html = String::from(r#"<span id="C1">general</span>"#);
        for i in 0..60_000 {
            html.push_str(&format!(
                r#"<div data-item-key="{i}.0"><div data-qa="message-text">row {i}</div></div>"#
            ));
        }
        tx.send(AgentCommand::Snapshot(html)).await.unwrap();

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(AgentCommand::Request {
            request: PageRequest::ResolveMessage {
                timestamp: "59999.0".to_string(),
                channel_id: "C1".to_string(),
            },
            reply: reply_tx,
        })
        .await
        .unwrap();

        // Single-threaded runtime: the timer only fires on time if the parse is off-thread
        let started = std::time::Instant::now();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(started.elapsed() < std::time::Duration::from_millis(500));

        match reply_rx.await.unwrap() {
            PageReply::Message(details) => {
                assert_eq!(details.text.as_deref(), Some("row 59999"));
                assert_eq!(details.channel_name.as_deref(), Some("general"));
            }
            other => panic!("Expected Message reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_agent_stops_when_senders_drop() {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(PageAgent::new(2, Arc::new(DomResolver::slack()), rx).run());
        drop(tx);
        handle.await.unwrap();
    }
}
