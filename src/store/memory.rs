use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{apply_rating, EventLog, EventStore, ReportStore, DEFAULT_BATCH_LIMIT};
use crate::error::{Error, Result};
use crate::event::{QueryEvent, Rating};
use crate::report::Report;

/// Event store held in process memory.
///
/// Enforces its batch limit the way a document database caps `IN` queries,
/// so callers that forget to chunk fail loudly.
#[derive(Debug)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<QueryEvent>>,
    batch_limit: usize,
    lookups: AtomicUsize,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    /// Empty store with the default batch limit.
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            batch_limit: DEFAULT_BATCH_LIMIT,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Store pre-populated with `events`.
    pub fn with_events(events: Vec<QueryEvent>) -> Self {
        Self {
            events: RwLock::new(events),
            ..Self::new()
        }
    }

    /// Override the per-call id limit.
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit.max(1);
        self
    }

    /// Number of `get_events_by_ids` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get_events(
        &self,
        tenant_id: &str,
        type_filter: Option<&str>,
    ) -> Result<Vec<QueryEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| type_filter.map_or(true, |t| e.event_type == t))
            .cloned()
            .collect())
    }

    async fn get_events_by_ids(&self, ids: &[String]) -> Result<Vec<QueryEvent>> {
        if ids.len() > self.batch_limit {
            return Err(Error::Store(format!(
                "batch of {} ids exceeds limit of {}",
                ids.len(),
                self.batch_limit
            )));
        }
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| ids.contains(&e.doc_id))
            .cloned()
            .collect())
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }
}

#[async_trait]
impl EventLog for InMemoryEventStore {
    async fn record(&self, mut event: QueryEvent) -> Result<String> {
        if event.doc_id.is_empty() {
            event.doc_id = Uuid::new_v4().to_string();
        }
        let doc_id = event.doc_id.clone();

        let mut events = self.events.write().await;
        if events.iter().any(|e| e.doc_id == doc_id) {
            return Err(Error::InvalidParameter {
                name: "doc_id",
                message: format!("event {doc_id} already exists"),
            });
        }
        debug!(doc_id = %doc_id, tenant_id = %event.tenant_id, "recorded query event");
        events.push(event);
        Ok(doc_id)
    }

    async fn rate(&self, doc_id: &str, rating: Rating) -> Result<()> {
        let mut events = self.events.write().await;
        let event = events
            .iter_mut()
            .find(|e| e.doc_id == doc_id)
            .ok_or_else(|| Error::NotFound(format!("event {doc_id}")))?;
        apply_rating(doc_id, &mut event.rating, rating)
    }
}

/// Report store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: RwLock<HashMap<String, Report>>,
    saves: AtomicUsize,
}

impl InMemoryReportStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save_report` calls.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn save_report(&self, tenant_id: &str, report: &Report) -> Result<()> {
        self.reports
            .write()
            .await
            .insert(tenant_id.to_string(), report.clone());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get_report(&self, tenant_id: &str) -> Result<Option<Report>> {
        Ok(self.reports.read().await.get(tenant_id).cloned())
    }
}
