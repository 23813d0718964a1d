//! Audit pipeline: classify, correlate, persist
//!
//! # Architecture
//!
//! ```text
//! InterceptedRequest → Classifier → PendingEvent ─spawn─→ enrich (PageContext)
//!                                                              │
//!                                                              ▼
//!                                              finalize → LogStore::append
//! ```
//!
//! Classification is synchronous so the intercept handler can answer right
//! away. Everything after it runs in its own task that owns the pending event
//! by value; concurrent correlations never share state. Nothing that happens
//! in that task (page miss, storage failure) is reported back to the caller.

use crate::correlation::{BridgeError, MessageInfo, PageContext};
use crate::events::{Enrichment, PendingEvent, StoredRecord};
use crate::parser::models::{InterceptedRequest, TabId};
use crate::parser::Classifier;
use crate::storage::{LogStore, StoreError};
use crate::util::text_preview;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

const PREVIEW_BYTES: usize = 60;

/// Counters for the pipeline itself
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Requests received from the shim
    pub requests_seen: AtomicU64,
    /// Requests that produced an audit event
    pub events_classified: AtomicU64,
    /// Records successfully appended
    pub records_stored: AtomicU64,
    /// Enrichment attempts that came back empty or failed
    pub correlation_misses: AtomicU64,
    /// Appends that failed
    pub store_failures: AtomicU64,
}

impl PipelineMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_seen: self.requests_seen.load(Ordering::Relaxed),
            events_classified: self.events_classified.load(Ordering::Relaxed),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            correlation_misses: self.correlation_misses.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_seen: u64,
    pub events_classified: u64,
    pub records_stored: u64,
    pub correlation_misses: u64,
    pub store_failures: u64,
}

pub struct AuditPipeline {
    classifier: Classifier,
    pages: Arc<dyn PageContext>,
    store: Arc<LogStore>,
    correlation_enabled: bool,
    metrics: PipelineMetrics,
}

impl AuditPipeline {
    pub fn new(
        classifier: Classifier,
        pages: Arc<dyn PageContext>,
        store: Arc<LogStore>,
        correlation_enabled: bool,
    ) -> Self {
        Self {
            classifier,
            pages,
            store,
            correlation_enabled,
            metrics: PipelineMetrics::default(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn store(&self) -> &Arc<LogStore> {
        &self.store
    }

    /// Classify one intercepted request and hand any event to a background task
    ///
    /// Returns the task handle when the request was an audited write; callers
    /// on the interception path drop it.
    pub fn ingest(self: &Arc<Self>, request: InterceptedRequest) -> Option<JoinHandle<()>> {
        self.metrics.requests_seen.fetch_add(1, Ordering::Relaxed);

        let pending = self.classifier.classify(&request)?;
        self.metrics.events_classified.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            kind = pending.kind(),
            ts = pending.timestamp(),
            channel = pending.channel_id(),
            tab = ?request.tab_id,
            "Audited write intercepted"
        );

        let pipeline = Arc::clone(self);
        let tab = request.tab_id;
        Some(tokio::spawn(async move {
            pipeline.complete(tab, pending).await;
        }))
    }

    /// Enrich, finalize and persist one pending event
    ///
    /// Storage failures are logged and swallowed.
    pub async fn complete(&self, tab: Option<TabId>, pending: PendingEvent) -> Option<StoredRecord> {
        let enrichment = self.enrich(tab, &pending).await;
        let record = pending.finalize(enrichment);

        match self.store.append(record).await {
            Ok(stored) => {
                self.metrics.records_stored.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    id = stored.id,
                    kind = stored.record.kind(),
                    channel = stored.record.channel_name().unwrap_or(stored.record.channel_id()),
                    "Logged: {}",
                    text_preview(stored.record.text().unwrap_or_default(), PREVIEW_BYTES)
                );
                Some(stored)
            }
            Err(e) => {
                self.metrics.store_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Failed to store audit record: {}", e);
                None
            }
        }
    }

    /// Best-effort page lookup; any failure yields an empty enrichment
    async fn enrich(&self, tab: Option<TabId>, pending: &PendingEvent) -> Enrichment {
        if !self.correlation_enabled {
            return Enrichment::default();
        }

        // The shim reports -1 for requests that do not belong to a tab
        let Some(tab) = tab.filter(|t| *t >= 0) else {
            self.record_miss(pending, "request has no tab");
            return Enrichment::default();
        };

        let result: Result<Enrichment, BridgeError> = match pending {
            PendingEvent::Post { channel_id, .. } => self
                .pages
                .resolve_channel_name(tab, channel_id)
                .await
                .map(|channel_name| Enrichment {
                    channel_name,
                    ..Default::default()
                }),
            PendingEvent::Reaction {
                timestamp,
                channel_id,
                ..
            } => self.pages.resolve_message(tab, timestamp, channel_id).await,
        };

        match result {
            Ok(enrichment) => {
                let found = match pending {
                    PendingEvent::Post { .. } => enrichment.channel_name.is_some(),
                    PendingEvent::Reaction { .. } => {
                        enrichment.text.is_some() || enrichment.user.is_some()
                    }
                };
                if !found {
                    self.record_miss(pending, "not found on page");
                } else if !enrichment.is_empty() {
                    tracing::debug!(ts = pending.timestamp(), "Enriched from tab {}", tab);
                }
                enrichment
            }
            Err(e) => {
                self.record_miss(pending, &e.to_string());
                Enrichment::default()
            }
        }
    }

    fn record_miss(&self, pending: &PendingEvent, reason: &str) {
        self.metrics.correlation_misses.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            kind = pending.kind(),
            ts = pending.timestamp(),
            channel = pending.channel_id(),
            "Correlation miss, storing partial record: {}",
            reason
        );
    }

    /// Persist a record pushed by a page context
    ///
    /// Fields are kept as sent; a preset `loggedAt` is clamped by the store.
    pub async fn accept_message_info(&self, info: MessageInfo) -> Result<StoredRecord, StoreError> {
        match self.store.append(info.record).await {
            Ok(stored) => {
                self.metrics.records_stored.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(id = stored.id, "Stored page-pushed record");
                Ok(stored)
            }
            Err(e) => {
                self.metrics.store_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Failed to store page-pushed record: {}", e);
                Err(e)
            }
        }
    }
}
