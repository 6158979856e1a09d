use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Connection string not found: set MONGO_URI in the environment or .env")]
    MissingConnectionString,

    #[error("Cannot read source {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Connection error: {0}")]
    Connection(#[source] anyhow::Error),

    #[error("Clearing collection failed: {0}")]
    Clear(#[source] anyhow::Error),

    #[error("Insert failed: {0}")]
    Insert(#[source] anyhow::Error),

    /// Only produced by the staged strategy: preparing or filling the staging
    /// collection failed. The live collection has not been touched.
    #[error("Staging new data failed: {0}")]
    Stage(#[source] anyhow::Error),

    /// Only produced by the staged strategy, when renaming the staging
    /// collection over the live one fails.
    #[error("Swapping staged collection failed: {0}")]
    Swap(#[source] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RefreshError {
    /// Short machine-friendly tag for logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingConnectionString => "missing_connection_string",
            Self::SourceRead { .. } => "source_read",
            Self::Connection(_) => "connection",
            Self::Clear(_) => "clear",
            Self::Insert(_) => "insert",
            Self::Stage(_) => "stage",
            Self::Swap(_) => "swap",
            Self::Config(_) => "config",
        }
    }

    /// True when the remote collection may have been modified before the
    /// failure occurred.
    pub fn remote_touched(&self) -> bool {
        matches!(self, Self::Clear(_) | Self::Insert(_) | Self::Swap(_))
    }
}

pub type RefreshResult<T> = Result<T, RefreshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_read_message_names_the_path() {
        let err = RefreshError::SourceRead {
            path: PathBuf::from("data/records.json"),
            source: anyhow::anyhow!("No such file or directory"),
        };
        let msg = err.to_string();
        assert!(msg.contains("data/records.json"));
        assert!(msg.contains("No such file"));
        assert_eq!(err.kind(), "source_read");
        assert!(!err.remote_touched());
    }

    #[test]
    fn insert_failure_reports_remote_touched() {
        let err = RefreshError::Insert(anyhow::anyhow!("write concern"));
        assert!(err.remote_touched());
        assert!(!RefreshError::Connection(anyhow::anyhow!("refused")).remote_touched());
        assert!(!RefreshError::Stage(anyhow::anyhow!("drop failed")).remote_touched());
    }
}
