//! Background-side transport to page contexts
//!
//! `PageContext` is the seam between the audit pipeline and whatever hosts
//! the page side. `PageRegistry` is the in-process implementation: one page
//! agent per tab, each reached through a bounded mailbox. A request gets
//! exactly one attempt; a missing tab, a closed mailbox or a dropped reply
//! slot all count as "no response".

use super::agent::{AgentCommand, PageAgent};
use super::protocol::{PageReply, PageRequest};
use super::resolver::DomResolver;
use crate::events::Enrichment;
use crate::parser::models::TabId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

/// Why a page request produced no answer
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no page context for tab {0}")]
    UnknownTab(TabId),

    #[error("page context for tab {0} is closed")]
    Closed(TabId),

    #[error("page context for tab {0} dropped the request")]
    NoResponse(TabId),

    #[error("page context for tab {tab} answered {action} with the wrong reply kind")]
    UnexpectedReply { tab: TabId, action: &'static str },
}

/// Request/response channel to the page side of a tab
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Send one request and wait for its reply
    async fn request(&self, tab: TabId, request: PageRequest) -> Result<PageReply, BridgeError>;

    /// Channel display name for a channel id
    async fn resolve_channel_name(
        &self,
        tab: TabId,
        channel_id: &str,
    ) -> Result<Option<String>, BridgeError> {
        let request = PageRequest::ResolveChannelName {
            channel_id: channel_id.to_string(),
        };
        let action = request.action();
        match self.request(tab, request).await? {
            PageReply::ChannelName(reply) => Ok(reply.channel_name),
            PageReply::Message(_) => Err(BridgeError::UnexpectedReply { tab, action }),
        }
    }

    /// Channel name, body and sender of the message a reaction targets
    async fn resolve_message(
        &self,
        tab: TabId,
        timestamp: &str,
        channel_id: &str,
    ) -> Result<Enrichment, BridgeError> {
        let request = PageRequest::ResolveMessage {
            timestamp: timestamp.to_string(),
            channel_id: channel_id.to_string(),
        };
        let action = request.action();
        match self.request(tab, request).await? {
            PageReply::Message(details) => Ok(details),
            PageReply::ChannelName(_) => Err(BridgeError::UnexpectedReply { tab, action }),
        }
    }
}

/// In-process page contexts, one agent per tab
pub struct PageRegistry {
    pages: Mutex<HashMap<TabId, mpsc::Sender<AgentCommand>>>,
    resolver: Arc<DomResolver>,
    mailbox_size: usize,
}

impl PageRegistry {
    pub fn new(resolver: DomResolver, mailbox_size: usize) -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            resolver: Arc::new(resolver),
            mailbox_size: mailbox_size.max(1),
        }
    }

    /// Mailbox for a tab, spawning its agent on first use
    ///
    /// Must be called from within a Tokio runtime.
    fn mailbox(&self, tab: TabId) -> mpsc::Sender<AgentCommand> {
        let mut pages = match self.pages.lock() {
            Ok(pages) => pages,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(tx) = pages.get(&tab) {
            if !tx.is_closed() {
                return tx.clone();
            }
        }

        let (tx, rx) = mpsc::channel(self.mailbox_size);
        tokio::spawn(PageAgent::new(tab, self.resolver.clone(), rx).run());
        pages.insert(tab, tx.clone());
        tracing::debug!("Opened page context for tab {}", tab);
        tx
    }

    fn existing(&self, tab: TabId) -> Option<mpsc::Sender<AgentCommand>> {
        let pages = match self.pages.lock() {
            Ok(pages) => pages,
            Err(poisoned) => poisoned.into_inner(),
        };
        pages.get(&tab).cloned()
    }

    /// Replace a tab's rendered document, opening its page context if needed
    pub async fn update_snapshot(&self, tab: TabId, html: String) -> Result<(), BridgeError> {
        self.mailbox(tab)
            .send(AgentCommand::Snapshot(html))
            .await
            .map_err(|_| BridgeError::Closed(tab))
    }

    /// Tear down a tab's page context
    pub async fn close(&self, tab: TabId) -> bool {
        let removed = {
            let mut pages = match self.pages.lock() {
                Ok(pages) => pages,
                Err(poisoned) => poisoned.into_inner(),
            };
            pages.remove(&tab)
        };

        match removed {
            Some(tx) => {
                let _ = tx.send(AgentCommand::Shutdown).await;
                tracing::debug!("Closed page context for tab {}", tab);
                true
            }
            None => false,
        }
    }

    /// Number of open page contexts
    pub fn open_tabs(&self) -> usize {
        match self.pages.lock() {
            Ok(pages) => pages.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[async_trait]
impl PageContext for PageRegistry {
    async fn request(&self, tab: TabId, request: PageRequest) -> Result<PageReply, BridgeError> {
        let tx = self.existing(tab).ok_or(BridgeError::UnknownTab(tab))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(AgentCommand::Request {
            request,
            reply: reply_tx,
        })
        .await
        .map_err(|_| BridgeError::Closed(tab))?;

        reply_rx.await.map_err(|_| BridgeError::NoResponse(tab))
    }
}
