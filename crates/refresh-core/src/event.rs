use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::CollectionTarget;

#[derive(Debug, Clone)]
pub enum RefreshEvent {
    Started {
        run_id: Uuid,
        target: CollectionTarget,
        at: DateTime<Utc>,
    },
    SourceLoaded {
        run_id: Uuid,
        count: usize,
    },
    Connected {
        run_id: Uuid,
    },
    Cleared {
        run_id: Uuid,
        deleted: u64,
    },
    Inserted {
        run_id: Uuid,
        inserted: u64,
        ids: usize,
    },
    InsertSkipped {
        run_id: Uuid,
    },
    Swapped {
        run_id: Uuid,
        staging: CollectionTarget,
    },
    Disconnected {
        run_id: Uuid,
    },
    Completed {
        run_id: Uuid,
        at: DateTime<Utc>,
    },
    Failed {
        run_id: Uuid,
        kind: &'static str,
        error: String,
    },
}

/// Sink for refresh events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: RefreshEvent);
}

/// Channel-based event sink that forwards events to a receiver.
pub struct ChannelEventSink {
    tx: tokio::sync::mpsc::UnboundedSender<RefreshEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<RefreshEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: RefreshEvent) {
        let _ = self.tx.send(event);
    }
}

/// Logs each event as a human-readable progress line.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: RefreshEvent) {
        match event {
            RefreshEvent::Started { run_id, target, .. } => {
                tracing::info!(%run_id, %target, "Starting refresh");
            }
            RefreshEvent::SourceLoaded { count, .. } => {
                tracing::info!(count, "Records loaded into memory");
            }
            RefreshEvent::Connected { .. } => tracing::info!("Connected to document store"),
            RefreshEvent::Cleared { deleted, .. } => {
                tracing::info!(deleted, "Old documents removed");
            }
            RefreshEvent::Inserted { inserted, ids, .. } => {
                tracing::info!(inserted, ids, "New documents inserted");
            }
            RefreshEvent::InsertSkipped { .. } => {
                tracing::warn!("Source was empty, nothing inserted; collection left empty");
            }
            RefreshEvent::Swapped { staging, .. } => {
                tracing::info!(%staging, "Staged collection swapped into place");
            }
            RefreshEvent::Disconnected { .. } => tracing::debug!("Connection closed"),
            RefreshEvent::Completed { run_id, .. } => {
                tracing::info!(%run_id, "Refresh complete");
            }
            RefreshEvent::Failed { kind, error, .. } => {
                tracing::error!(kind, %error, "Refresh failed");
            }
        }
    }
}
