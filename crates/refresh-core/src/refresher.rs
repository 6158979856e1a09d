use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::config::{RefreshConfig, RefreshStrategy};
use crate::error::{RefreshError, RefreshResult};
use crate::event::{EventSink, RefreshEvent};
use crate::report::RunSummary;
use crate::source::{load_records, Record};
use crate::store::{CollectionTarget, ConnectionGuard, DocumentStore, StoreConnection};

/// Counts produced by the mutating phases of a run.
#[derive(Debug, Default)]
struct PhaseCounts {
    deleted: u64,
    inserted: u64,
    generated_ids: usize,
    insert_skipped: bool,
}

/// Replaces a remote collection with the contents of a local JSON file.
///
/// Phases run strictly in order: validate config, read the source, connect,
/// clear, insert, disconnect. The source is fully read and parsed before a
/// connection is attempted, so a broken file never deletes live data.
pub struct Refresher {
    config: RefreshConfig,
    store: Arc<dyn DocumentStore>,
    event_sinks: Vec<Arc<dyn EventSink>>,
}

impl Refresher {
    pub fn new(config: RefreshConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config,
            store,
            event_sinks: Vec::new(),
        }
    }

    pub fn add_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.event_sinks.push(sink);
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    async fn emit(&self, event: RefreshEvent) {
        for sink in &self.event_sinks {
            sink.emit(event.clone()).await;
        }
    }

    /// Run one refresh to completion. Every failure is terminal; nothing is
    /// retried.
    pub async fn run(&self) -> RefreshResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let result = self.run_phases(run_id).await;

        if let Err(ref e) = result {
            self.emit(RefreshEvent::Failed {
                run_id,
                kind: e.kind(),
                error: e.to_string(),
            })
            .await;
        }

        result
    }

    async fn run_phases(&self, run_id: Uuid) -> RefreshResult<RunSummary> {
        self.config.validate()?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let target = self.config.target();
        let source_path = &self.config.source_path;

        self.emit(RefreshEvent::Started {
            run_id,
            target: target.clone(),
            at: started_at,
        })
        .await;

        tracing::info!(path = %source_path.display(), "Reading local source");
        let records = load_records(source_path)?;
        self.store
            .check_records(&records)
            .map_err(|source| RefreshError::SourceRead {
                path: source_path.clone(),
                source,
            })?;
        self.emit(RefreshEvent::SourceLoaded {
            run_id,
            count: records.len(),
        })
        .await;

        tracing::info!(
            store = self.store.name(),
            uri = %self.config.redacted_uri(),
            "Connecting"
        );
        let conn = self
            .store
            .connect(&self.config.connection_uri, &target)
            .await
            .map_err(RefreshError::Connection)?;
        let mut guard = ConnectionGuard::new(conn);
        self.emit(RefreshEvent::Connected { run_id }).await;

        let outcome = self.mutate(run_id, &mut guard, &target, &records).await;

        // Released on success and on every phase failure alike.
        if let Err(e) = guard.release().await {
            tracing::warn!(error = %e, "Closing connection failed");
        }
        self.emit(RefreshEvent::Disconnected { run_id }).await;

        let counts = outcome?;
        let completed_at = Utc::now();
        self.emit(RefreshEvent::Completed {
            run_id,
            at: completed_at,
        })
        .await;

        Ok(RunSummary {
            run_id,
            target,
            strategy: self.config.strategy,
            source_path: source_path.clone(),
            loaded: records.len(),
            deleted: counts.deleted,
            inserted: counts.inserted,
            generated_ids: counts.generated_ids,
            insert_skipped: counts.insert_skipped,
            started_at,
            completed_at,
            duration: clock.elapsed(),
        })
    }

    async fn mutate(
        &self,
        run_id: Uuid,
        guard: &mut ConnectionGuard,
        target: &CollectionTarget,
        records: &[Record],
    ) -> RefreshResult<PhaseCounts> {
        let conn = guard.connection().ok_or_else(|| {
            RefreshError::Connection(anyhow::anyhow!("Connection already released"))
        })?;
        match self.config.strategy {
            RefreshStrategy::Replace => self.replace(run_id, conn, target, records).await,
            RefreshStrategy::Staged => self.staged(run_id, conn, target, records).await,
        }
    }

    /// Delete everything, then bulk insert. An insert failure after the
    /// delete leaves the collection empty.
    async fn replace(
        &self,
        run_id: Uuid,
        conn: &mut dyn StoreConnection,
        target: &CollectionTarget,
        records: &[Record],
    ) -> RefreshResult<PhaseCounts> {
        let deleted = conn.delete_all(target).await.map_err(RefreshError::Clear)?;
        self.emit(RefreshEvent::Cleared { run_id, deleted }).await;

        if records.is_empty() {
            self.emit(RefreshEvent::InsertSkipped { run_id }).await;
            return Ok(PhaseCounts {
                deleted,
                insert_skipped: true,
                ..Default::default()
            });
        }

        let outcome = conn
            .insert_all(target, records)
            .await
            .map_err(RefreshError::Insert)?;
        self.emit(RefreshEvent::Inserted {
            run_id,
            inserted: outcome.inserted,
            ids: outcome.ids.len(),
        })
        .await;

        Ok(PhaseCounts {
            deleted,
            inserted: outcome.inserted,
            generated_ids: outcome.ids.len(),
            insert_skipped: false,
        })
    }

    /// Insert into a staging collection and rename it over the target, so
    /// the live collection is untouched until the new data is complete.
    async fn staged(
        &self,
        run_id: Uuid,
        conn: &mut dyn StoreConnection,
        target: &CollectionTarget,
        records: &[Record],
    ) -> RefreshResult<PhaseCounts> {
        // Nothing to stage: clearing the live collection keeps empty-source
        // behavior identical across strategies.
        if records.is_empty() {
            return self.replace(run_id, conn, target, records).await;
        }

        let staging = target.staging();
        conn.drop_collection(&staging)
            .await
            .map_err(RefreshError::Stage)?;

        let outcome = match conn.insert_all(&staging, records).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(cleanup) = conn.drop_collection(&staging).await {
                    tracing::warn!(%staging, error = %cleanup, "Could not drop partial staging collection");
                }
                return Err(RefreshError::Stage(e));
            }
        };
        self.emit(RefreshEvent::Inserted {
            run_id,
            inserted: outcome.inserted,
            ids: outcome.ids.len(),
        })
        .await;

        let deleted = conn.count(target).await.map_err(RefreshError::Swap)?;
        conn.swap_into(&staging, target)
            .await
            .map_err(RefreshError::Swap)?;
        self.emit(RefreshEvent::Cleared { run_id, deleted }).await;
        self.emit(RefreshEvent::Swapped { run_id, staging }).await;

        Ok(PhaseCounts {
            deleted,
            inserted: outcome.inserted,
            generated_ids: outcome.ids.len(),
            insert_skipped: false,
        })
    }
}
