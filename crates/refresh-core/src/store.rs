use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::source::Record;

/// A `(database, collection)` pair addressed by a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionTarget {
    pub database: String,
    pub collection: String,
}

impl CollectionTarget {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Sibling collection used by the staged strategy.
    pub fn staging(&self) -> Self {
        Self {
            database: self.database.clone(),
            collection: format!("{}_refresh_staging", self.collection),
        }
    }
}

impl fmt::Display for CollectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Result of a bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: u64,
    /// Identifiers assigned to the new documents, stringified.
    pub ids: Vec<String>,
}

/// Factory for live connections to a document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &str;

    /// Reject records this store cannot hold. Runs before any connection
    /// is opened, so a failure here never touches remote data.
    fn check_records(&self, _records: &[Record]) -> anyhow::Result<()> {
        Ok(())
    }

    /// Open a connection and verify the target is addressable.
    async fn connect(
        &self,
        uri: &str,
        target: &CollectionTarget,
    ) -> anyhow::Result<Box<dyn StoreConnection>>;
}

/// A live connection. The refresher calls `close` exactly once on every
/// connection it opens.
#[async_trait]
pub trait StoreConnection: Send {
    /// Number of documents currently in the collection.
    async fn count(&mut self, target: &CollectionTarget) -> anyhow::Result<u64>;

    /// Delete every document with no filter; returns the deleted count.
    async fn delete_all(&mut self, target: &CollectionTarget) -> anyhow::Result<u64>;

    /// Ordered bulk insert preserving `records` order.
    async fn insert_all(
        &mut self,
        target: &CollectionTarget,
        records: &[Record],
    ) -> anyhow::Result<InsertOutcome>;

    /// Remove a collection entirely. Missing collections are not an error.
    async fn drop_collection(&mut self, target: &CollectionTarget) -> anyhow::Result<()>;

    /// Atomically rename `from` over `to`, replacing `to` if it exists.
    async fn swap_into(
        &mut self,
        from: &CollectionTarget,
        to: &CollectionTarget,
    ) -> anyhow::Result<()>;

    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Owns a live connection for the length of a run.
///
/// `release` closes it and is the normal exit. If the guard is dropped
/// while still holding the connection (the run future was cancelled
/// mid-phase), the close is handed to the current tokio runtime instead.
pub struct ConnectionGuard {
    conn: Option<Box<dyn StoreConnection>>,
}

impl ConnectionGuard {
    pub fn new(conn: Box<dyn StoreConnection>) -> Self {
        Self { conn: Some(conn) }
    }

    /// The held connection; `None` only after `release`.
    pub fn connection(&mut self) -> Option<&mut (dyn StoreConnection + 'static)> {
        self.conn.as_deref_mut()
    }

    pub async fn release(mut self) -> anyhow::Result<()> {
        match self.conn.take() {
            Some(mut conn) => conn.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("Connection dropped mid-run, closing in the background");
                handle.spawn(async move {
                    if let Err(e) = conn.close().await {
                        tracing::warn!(error = %e, "Background close failed");
                    }
                });
            }
            Err(_) => tracing::warn!("Connection dropped outside a runtime and left open"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryStore, StoreOp};

    async fn guarded(store: &InMemoryStore) -> ConnectionGuard {
        let conn = store
            .connect("mem://", &CollectionTarget::new("db", "coll"))
            .await
            .unwrap();
        ConnectionGuard::new(conn)
    }

    #[tokio::test]
    async fn release_closes_once() {
        let store = InMemoryStore::new();
        let mut guard = guarded(&store).await;
        assert!(guard.connection().is_some());

        guard.release().await.unwrap();

        assert_eq!(store.call_count(StoreOp::Close).await, 1);
    }

    #[tokio::test]
    async fn dropped_guard_closes_in_background() {
        let store = InMemoryStore::new();
        let guard = guarded(&store).await;

        drop(guard);
        for _ in 0..10 {
            if store.call_count(StoreOp::Close).await == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(store.call_count(StoreOp::Close).await, 1);
    }

    #[test]
    fn staging_name_is_derived_from_the_live_collection() {
        let live = CollectionTarget::new("finance", "entries");
        assert_eq!(live.staging().to_string(), "finance.entries_refresh_staging");
    }
}
