use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::config::RefreshStrategy;
use crate::store::CollectionTarget;

/// Counts and timing for one successful refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub target: CollectionTarget,
    pub strategy: RefreshStrategy,
    pub source_path: PathBuf,

    pub loaded: usize,
    pub deleted: u64,
    pub inserted: u64,
    pub generated_ids: usize,
    /// Set when the source was empty and no insert was issued.
    pub insert_skipped: bool,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl RunSummary {
    pub fn status(&self) -> &'static str {
        if self.insert_skipped {
            "OK (source empty, collection left empty)"
        } else {
            "OK"
        }
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    if total_secs >= 60 {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    } else {
        let millis = d.as_millis();
        if millis < 1000 {
            format!("{millis}ms")
        } else {
            format!("{}.{}s", total_secs, d.subsec_millis() / 100)
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bar = "=".repeat(60);
        let thin = "-".repeat(60);

        writeln!(f, "\n{bar}")?;
        writeln!(f, "  REFRESH SUMMARY")?;
        writeln!(f, "{bar}\n")?;

        writeln!(f, "  Run:        {}", self.run_id)?;
        writeln!(f, "  Target:     {}", self.target)?;
        writeln!(f, "  Source:     {}", self.source_path.display())?;
        writeln!(f, "  Strategy:   {}", self.strategy)?;
        writeln!(f, "  Status:     {}", self.status())?;

        writeln!(f, "\n{thin}")?;
        writeln!(f, "  {:<22} {}", "Records loaded", self.loaded)?;
        writeln!(f, "  {:<22} {}", "Documents removed", self.deleted)?;
        if self.insert_skipped {
            writeln!(f, "  {:<22} skipped", "Documents inserted")?;
        } else {
            writeln!(f, "  {:<22} {}", "Documents inserted", self.inserted)?;
            writeln!(f, "  {:<22} {}", "Generated ids", self.generated_ids)?;
        }
        writeln!(f, "{thin}")?;

        writeln!(
            f,
            "  Started:    {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f, "  Total:      {}", format_duration(self.duration))?;
        writeln!(f, "{bar}")?;

        Ok(())
    }
}
