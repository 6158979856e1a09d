use std::path::Path;

use serde_json::Value;

use crate::error::{RefreshError, RefreshResult};

/// One element of the source array. No schema is imposed.
pub type Record = Value;

/// Read `path` and parse it as a JSON array of records.
pub fn load_records(path: &Path) -> RefreshResult<Vec<Record>> {
    let read_error = |source: anyhow::Error| RefreshError::SourceRead {
        path: path.to_path_buf(),
        source,
    };

    let content = std::fs::read_to_string(path).map_err(|e| read_error(e.into()))?;
    let root: Value = serde_json::from_str(&content)
        .map_err(|e| read_error(anyhow::anyhow!("Invalid JSON: {e}")))?;

    match root {
        Value::Array(records) => {
            tracing::debug!(path = %path.display(), count = records.len(), "Parsed source array");
            Ok(records)
        }
        other => Err(read_error(anyhow::anyhow!(
            "Expected a JSON array at the root, found {}",
            json_kind(&other)
        ))),
    }
}

/// Article-prefixed JSON type name, for error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_source(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_array_in_order() {
        let file = write_source(r#"[{"a":1},{"a":2},{"a":1}]"#);
        let records = load_records(file.path()).unwrap();
        assert_eq!(records, vec![json!({"a":1}), json!({"a":2}), json!({"a":1})]);
    }

    #[test]
    fn empty_array_is_valid() {
        let file = write_source("[]");
        assert!(load_records(file.path()).unwrap().is_empty());
    }

    #[test]
    fn object_root_is_a_shape_error() {
        let file = write_source(r#"{"a":1}"#);
        let err = load_records(file.path()).unwrap_err();
        match err {
            RefreshError::SourceRead { path, source } => {
                assert_eq!(path, file.path().to_path_buf());
                assert!(source.to_string().contains("found an object"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_a_read_error() {
        let file = write_source(r#"[{"a":1},"#);
        let err = load_records(file.path()).unwrap_err();
        assert!(matches!(err, RefreshError::SourceRead { .. }));
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = load_records(&path).unwrap_err();
        assert!(matches!(err, RefreshError::SourceRead { .. }));
    }
}
