//! Collaborator seams: where events come from and where reports go.
//!
//! ```text
//! ┌──────────────────┐   get_events / get_events_by_ids   ┌──────────────┐
//! │  AnalyticsEngine │ ─────────────────────────────────▶ │  EventStore  │
//! │                  │                                    └──────────────┘
//! │                  │   save_report / get_report         ┌──────────────┐
//! │                  │ ─────────────────────────────────▶ │ ReportStore  │
//! └──────────────────┘                                    └──────────────┘
//! ```
//!
//! Implementations:
//!
//! | Store | Backing | Use |
//! |-------|---------|-----|
//! | [`InMemoryEventStore`] / [`InMemoryReportStore`] | process memory | tests, embedding in a service |
//! | [`JsonFileEventStore`] / [`JsonDirReportStore`] | JSON-lines file / one JSON file per tenant | the `quarry` CLI |
//!
//! Writers of events (the chat path that logs questions and the feedback path
//! that rates answers) go through [`EventLog`].

mod file;
mod memory;

pub use file::{JsonDirReportStore, JsonFileEventStore};
pub use memory::{InMemoryEventStore, InMemoryReportStore};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::event::{QueryEvent, Rating};
use crate::report::Report;

/// Largest id batch a single `get_events_by_ids` call accepts by default.
pub const DEFAULT_BATCH_LIMIT: usize = 10;

/// Read access to logged query events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// All events of a tenant, optionally restricted to one event type.
    async fn get_events(
        &self,
        tenant_id: &str,
        type_filter: Option<&str>,
    ) -> Result<Vec<QueryEvent>>;

    /// Events with the given ids, in any order. Unknown ids are skipped.
    ///
    /// Callers must not pass more than [`EventStore::batch_limit`] ids.
    async fn get_events_by_ids(&self, ids: &[String]) -> Result<Vec<QueryEvent>>;

    /// Maximum ids per `get_events_by_ids` call.
    fn batch_limit(&self) -> usize {
        DEFAULT_BATCH_LIMIT
    }
}

/// Write access to the event log.
#[async_trait]
pub trait EventLog: EventStore {
    /// Append an event and return its document id.
    ///
    /// An empty `doc_id` is replaced by a fresh one.
    async fn record(&self, event: QueryEvent) -> Result<String>;

    /// Set the rating of an event. A rating can be set once.
    async fn rate(&self, doc_id: &str, rating: Rating) -> Result<()>;
}

/// Persistence of the latest report per tenant.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Store `report`, replacing whatever the tenant had before.
    async fn save_report(&self, tenant_id: &str, report: &Report) -> Result<()>;

    /// The tenant's latest report, if any.
    async fn get_report(&self, tenant_id: &str) -> Result<Option<Report>>;
}

/// Log a user question as a `chat` event and return its document id.
pub async fn record_query<L: EventLog + ?Sized>(
    log: &L,
    tenant_id: &str,
    query_text: &str,
    embedding: Option<Vec<f32>>,
) -> Result<String> {
    let mut event = QueryEvent::new(Uuid::new_v4().to_string(), query_text).with_tenant(tenant_id);
    if let Some(embedding) = embedding {
        event = event.with_embedding(embedding);
    }
    log.record(event).await
}

/// Apply a rating to `current`, enforcing set-once semantics.
pub(crate) fn apply_rating(doc_id: &str, current: &mut Rating, rating: Rating) -> Result<()> {
    if current.is_rated() {
        return Err(Error::InvalidParameter {
            name: "rating",
            message: format!("event {doc_id} is already rated"),
        });
    }
    *current = rating;
    Ok(())
}

/// Await a collaborator call with a time budget.
pub(crate) async fn bounded<T, F>(operation: &'static str, budget: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation,
            elapsed: budget,
        }),
    }
}
