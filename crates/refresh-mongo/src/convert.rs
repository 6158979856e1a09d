use mongodb::bson::{self, Bson, Document};
use serde_json::Value;

use refresh_core::source::{json_kind, Record};

/// Run the full BSON conversion without keeping the result, so anything
/// the driver would reject at insert time is caught before connecting.
pub fn check_convertible(records: &[Record]) -> anyhow::Result<()> {
    to_documents(records).map(|_| ())
}

pub fn to_document(record: &Record) -> anyhow::Result<Document> {
    match record {
        Value::Object(_) => Ok(bson::to_document(record)?),
        other => anyhow::bail!("Cannot store {} as a document", json_kind(other)),
    }
}

pub fn to_documents(records: &[Record]) -> anyhow::Result<Vec<Document>> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| to_document(r).map_err(|e| anyhow::anyhow!("Record at index {i}: {e}")))
        .collect()
}

/// Render an inserted `_id` the way it would be shown to a user.
pub fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        other => other.to_string(),
    }
}
