use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection};

use refresh_core::source::Record;
use refresh_core::store::{CollectionTarget, DocumentStore, InsertOutcome, StoreConnection};

use crate::convert::{check_convertible, id_to_string, to_documents};

/// [`DocumentStore`] backed by the official MongoDB driver.
///
/// Driver defaults apply throughout, including server selection timeout;
/// no retries are layered on top.
#[derive(Debug, Default, Clone)]
pub struct MongoStore;

impl MongoStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn name(&self) -> &str {
        "mongodb"
    }

    fn check_records(&self, records: &[Record]) -> anyhow::Result<()> {
        check_convertible(records)
    }

    async fn connect(
        &self,
        uri: &str,
        target: &CollectionTarget,
    ) -> anyhow::Result<Box<dyn StoreConnection>> {
        if target.database.trim().is_empty() {
            anyhow::bail!("Database name is empty (set DB_NAME)");
        }
        if target.collection.trim().is_empty() {
            anyhow::bail!("Collection name is empty (set COLLECTION_NAME)");
        }

        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| anyhow::anyhow!("MongoDB connection failed: {e}"))?;

        // Verify connectivity before anything is deleted
        client
            .database(&target.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| anyhow::anyhow!("MongoDB ping failed: {e}"))?;

        tracing::debug!(%target, "MongoDB connection verified");
        Ok(Box::new(MongoConnection {
            client: Some(client),
        }))
    }
}

pub struct MongoConnection {
    client: Option<Client>,
}

impl MongoConnection {
    fn client(&self) -> anyhow::Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Connection already closed"))
    }

    fn collection(&self, target: &CollectionTarget) -> anyhow::Result<Collection<Document>> {
        Ok(self
            .client()?
            .database(&target.database)
            .collection::<Document>(&target.collection))
    }
}

#[async_trait]
impl StoreConnection for MongoConnection {
    async fn count(&mut self, target: &CollectionTarget) -> anyhow::Result<u64> {
        Ok(self.collection(target)?.count_documents(doc! {}).await?)
    }

    async fn delete_all(&mut self, target: &CollectionTarget) -> anyhow::Result<u64> {
        let result = self.collection(target)?.delete_many(doc! {}).await?;
        tracing::debug!(%target, deleted = result.deleted_count, "delete_many complete");
        Ok(result.deleted_count)
    }

    async fn insert_all(
        &mut self,
        target: &CollectionTarget,
        records: &[Record],
    ) -> anyhow::Result<InsertOutcome> {
        let docs = to_documents(records)?;
        let result = self.collection(target)?.insert_many(&docs).await?;

        let mut indexed: Vec<_> = result.inserted_ids.into_iter().collect();
        indexed.sort_by_key(|(i, _)| *i);
        let ids: Vec<String> = indexed.iter().map(|(_, id)| id_to_string(id)).collect();

        tracing::debug!(%target, count = ids.len(), "insert_many complete");
        Ok(InsertOutcome {
            inserted: docs.len() as u64,
            ids,
        })
    }

    async fn drop_collection(&mut self, target: &CollectionTarget) -> anyhow::Result<()> {
        self.collection(target)?.drop().await?;
        Ok(())
    }

    async fn swap_into(
        &mut self,
        from: &CollectionTarget,
        to: &CollectionTarget,
    ) -> anyhow::Result<()> {
        let command = rename_command(from, to);
        self.client()?
            .database("admin")
            .run_command(command)
            .await
            .map_err(|e| anyhow::anyhow!("renameCollection {from} -> {to} failed: {e}"))?;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            tracing::debug!("MongoDB client shut down");
        }
        Ok(())
    }
}

fn rename_command(from: &CollectionTarget, to: &CollectionTarget) -> Document {
    doc! {
        "renameCollection": from.to_string(),
        "to": to.to_string(),
        "dropTarget": true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rename_command_targets_full_namespaces() {
        let live = CollectionTarget::new("finance", "entries");
        let command = rename_command(&live.staging(), &live);
        assert_eq!(
            command.get_str("renameCollection").unwrap(),
            "finance.entries_refresh_staging"
        );
        assert_eq!(command.get_str("to").unwrap(), "finance.entries");
        assert!(command.get_bool("dropTarget").unwrap());
    }

    #[test]
    fn store_rejects_non_object_records() {
        let store = MongoStore::new();
        assert!(store.check_records(&[json!({"a": 1})]).is_ok());
        assert!(store.check_records(&[json!([1, 2])]).is_err());
    }

    #[test]
    fn store_rejects_integers_bson_cannot_hold() {
        let store = MongoStore::new();
        let err = store
            .check_records(&[json!({"n": 1}), json!({"n": u64::MAX})])
            .unwrap_err();
        assert!(err.to_string().contains("Record at index 1"), "{err}");
    }

    #[tokio::test]
    async fn empty_names_fail_before_dialing() {
        let store = MongoStore::new();
        let err = store
            .connect("mongodb://127.0.0.1:1", &CollectionTarget::new("", "entries"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("DB_NAME"));

        let err = store
            .connect("mongodb://127.0.0.1:1", &CollectionTarget::new("finance", " "))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("COLLECTION_NAME"));
    }

    #[tokio::test]
    async fn malformed_uri_is_a_connection_failure() {
        let store = MongoStore::new();
        let err = store
            .connect("not-a-mongo-uri", &CollectionTarget::new("finance", "entries"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("MongoDB connection failed"));
    }
}
