//! In-memory [`DocumentStore`] that records every call.
//!
//! Used by the test suites to check phase ordering and connection release
//! without a running database. Collections live behind an `Arc<Mutex<..>>`
//! shared by the store and all of its connections, so a test can seed data
//! before a run and inspect it afterwards.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::source::Record;
use crate::store::{CollectionTarget, DocumentStore, InsertOutcome, StoreConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Connect,
    Count,
    DeleteAll,
    InsertAll,
    DropCollection,
    SwapInto,
    Close,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<CollectionTarget, Vec<Value>>,
    calls: Vec<StoreOp>,
    failing: HashSet<StoreOp>,
    stalling: HashSet<StoreOp>,
    next_id: u64,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    rejection: Option<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of `target` without recording a call.
    pub async fn seed(&self, target: &CollectionTarget, docs: Vec<Value>) {
        let mut state = self.state.lock().await;
        let stored = docs
            .into_iter()
            .map(|doc| {
                state.next_id += 1;
                with_id(doc, state.next_id)
            })
            .collect();
        state.collections.insert(target.clone(), stored);
    }

    /// Reject every record set passed to `check_records` with `reason`.
    pub fn rejecting_records(mut self, reason: impl Into<String>) -> Self {
        self.rejection = Some(reason.into());
        self
    }

    /// Make every subsequent call of `op` hang forever once recorded.
    pub async fn stall_on(&self, op: StoreOp) {
        self.state.lock().await.stalling.insert(op);
    }

    /// Make every subsequent call of `op` fail.
    pub async fn fail_on(&self, op: StoreOp) {
        self.state.lock().await.failing.insert(op);
    }

    pub async fn calls(&self) -> Vec<StoreOp> {
        self.state.lock().await.calls.clone()
    }

    pub async fn call_count(&self, op: StoreOp) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| **c == op)
            .count()
    }

    pub async fn documents(&self, target: &CollectionTarget) -> Vec<Value> {
        self.state
            .lock()
            .await
            .collections
            .get(target)
            .cloned()
            .unwrap_or_default()
    }

    /// Stored documents with their `_id` field removed.
    pub async fn documents_without_ids(&self, target: &CollectionTarget) -> Vec<Value> {
        self.documents(target)
            .await
            .into_iter()
            .map(|mut doc| {
                if let Value::Object(map) = &mut doc {
                    map.remove("_id");
                }
                doc
            })
            .collect()
    }

    pub async fn has_collection(&self, target: &CollectionTarget) -> bool {
        self.state.lock().await.collections.contains_key(target)
    }

    async fn record(&self, op: StoreOp) -> anyhow::Result<tokio::sync::MutexGuard<'_, MemoryState>> {
        let mut state = self.state.lock().await;
        state.calls.push(op);
        if state.failing.contains(&op) {
            anyhow::bail!("injected failure on {op:?}");
        }
        if state.stalling.contains(&op) {
            drop(state);
            return std::future::pending().await;
        }
        Ok(state)
    }
}

fn with_id(doc: Value, id: u64) -> Value {
    match doc {
        Value::Object(mut map) => {
            map.entry("_id")
                .or_insert_with(|| Value::String(format!("mem-{id}")));
            Value::Object(map)
        }
        other => other,
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn check_records(&self, _records: &[Record]) -> anyhow::Result<()> {
        match &self.rejection {
            Some(reason) => anyhow::bail!("{reason}"),
            None => Ok(()),
        }
    }

    async fn connect(
        &self,
        _uri: &str,
        target: &CollectionTarget,
    ) -> anyhow::Result<Box<dyn StoreConnection>> {
        self.record(StoreOp::Connect).await?;
        if target.database.is_empty() || target.collection.is_empty() {
            anyhow::bail!("invalid namespace '{target}'");
        }
        Ok(Box::new(InMemoryConnection {
            store: self.clone(),
        }))
    }
}

pub struct InMemoryConnection {
    store: InMemoryStore,
}

#[async_trait]
impl StoreConnection for InMemoryConnection {
    async fn count(&mut self, target: &CollectionTarget) -> anyhow::Result<u64> {
        let state = self.store.record(StoreOp::Count).await?;
        Ok(state.collections.get(target).map_or(0, |c| c.len() as u64))
    }

    async fn delete_all(&mut self, target: &CollectionTarget) -> anyhow::Result<u64> {
        let mut state = self.store.record(StoreOp::DeleteAll).await?;
        Ok(state
            .collections
            .get_mut(target)
            .map_or(0, |c| c.drain(..).count() as u64))
    }

    async fn insert_all(
        &mut self,
        target: &CollectionTarget,
        records: &[Record],
    ) -> anyhow::Result<InsertOutcome> {
        let mut state = self.store.record(StoreOp::InsertAll).await?;
        let mut ids = Vec::with_capacity(records.len());
        let mut stored = Vec::with_capacity(records.len());
        for record in records {
            state.next_id += 1;
            let doc = with_id(record.clone(), state.next_id);
            let id = match doc.get("_id") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => format!("mem-{}", state.next_id),
            };
            ids.push(id);
            stored.push(doc);
        }
        state
            .collections
            .entry(target.clone())
            .or_default()
            .extend(stored);
        Ok(InsertOutcome {
            inserted: records.len() as u64,
            ids,
        })
    }

    async fn drop_collection(&mut self, target: &CollectionTarget) -> anyhow::Result<()> {
        let mut state = self.store.record(StoreOp::DropCollection).await?;
        state.collections.remove(target);
        Ok(())
    }

    async fn swap_into(
        &mut self,
        from: &CollectionTarget,
        to: &CollectionTarget,
    ) -> anyhow::Result<()> {
        let mut state = self.store.record(StoreOp::SwapInto).await?;
        let docs = state
            .collections
            .remove(from)
            .ok_or_else(|| anyhow::anyhow!("source namespace '{from}' does not exist"))?;
        state.collections.insert(to.clone(), docs);
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.store.record(StoreOp::Close).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn duplicate_records_get_distinct_ids() {
        let store = InMemoryStore::new();
        let target = CollectionTarget::new("db", "coll");
        let mut conn = store.connect("mem://", &target).await.unwrap();

        let outcome = conn
            .insert_all(&target, &[json!({"a": 1}), json!({"a": 1})])
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.ids.len(), 2);
        assert_ne!(outcome.ids[0], outcome.ids[1]);
    }

    #[tokio::test]
    async fn injected_failure_is_still_recorded() {
        let store = InMemoryStore::new();
        store.fail_on(StoreOp::DeleteAll).await;
        let target = CollectionTarget::new("db", "coll");
        let mut conn = store.connect("mem://", &target).await.unwrap();

        assert!(conn.delete_all(&target).await.is_err());
        assert_eq!(store.calls().await, vec![StoreOp::Connect, StoreOp::DeleteAll]);
    }

    #[tokio::test]
    async fn empty_namespace_fails_to_connect() {
        let store = InMemoryStore::new();
        let result = store.connect("mem://", &CollectionTarget::new("", "coll")).await;
        assert!(result.is_err());
    }
}
