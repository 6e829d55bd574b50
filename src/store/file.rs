use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{apply_rating, EventLog, EventStore, ReportStore, DEFAULT_BATCH_LIMIT};
use crate::error::{Error, Result};
use crate::event::{QueryEvent, Rating};
use crate::report::Report;

/// Event store backed by a JSON-lines file, one [`QueryEvent`] per line.
///
/// A missing file reads as an empty log. Writes are serialized through a
/// lock; ratings rewrite the whole file.
#[derive(Debug)]
pub struct JsonFileEventStore {
    path: PathBuf,
    batch_limit: usize,
    write_lock: Mutex<()>,
}

impl JsonFileEventStore {
    /// Store reading and appending to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            batch_limit: DEFAULT_BATCH_LIMIT,
            write_lock: Mutex::new(()),
        }
    }

    /// Override the per-call id limit.
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit.max(1);
        self
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<QueryEvent>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let event = serde_json::from_str(line).map_err(|e| {
                Error::Store(format!("{}:{}: {e}", self.path.display(), line_no + 1))
            })?;
            events.push(event);
        }
        Ok(events)
    }

    async fn rewrite(&self, events: &[QueryEvent]) -> Result<()> {
        let mut body = String::new();
        for event in events {
            body.push_str(&serde_json::to_string(event)?);
            body.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for JsonFileEventStore {
    async fn get_events(
        &self,
        tenant_id: &str,
        type_filter: Option<&str>,
    ) -> Result<Vec<QueryEvent>> {
        let mut events = self.load().await?;
        events.retain(|e| {
            e.tenant_id == tenant_id && type_filter.map_or(true, |t| e.event_type == t)
        });
        Ok(events)
    }

    async fn get_events_by_ids(&self, ids: &[String]) -> Result<Vec<QueryEvent>> {
        if ids.len() > self.batch_limit {
            return Err(Error::Store(format!(
                "batch of {} ids exceeds limit of {}",
                ids.len(),
                self.batch_limit
            )));
        }
        let mut events = self.load().await?;
        events.retain(|e| ids.contains(&e.doc_id));
        Ok(events)
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }
}

#[async_trait]
impl EventLog for JsonFileEventStore {
    async fn record(&self, mut event: QueryEvent) -> Result<String> {
        let _guard = self.write_lock.lock().await;

        if event.doc_id.is_empty() {
            event.doc_id = Uuid::new_v4().to_string();
        } else if self.load().await?.iter().any(|e| e.doc_id == event.doc_id) {
            return Err(Error::InvalidParameter {
                name: "doc_id",
                message: format!("event {} already exists", event.doc_id),
            });
        }

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(doc_id = %event.doc_id, path = %self.path.display(), "appended query event");
        Ok(event.doc_id)
    }

    async fn rate(&self, doc_id: &str, rating: Rating) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut events = self.load().await?;
        let event = events
            .iter_mut()
            .find(|e| e.doc_id == doc_id)
            .ok_or_else(|| Error::NotFound(format!("event {doc_id}")))?;
        apply_rating(doc_id, &mut event.rating, rating)?;

        self.rewrite(&events).await
    }
}

/// Report store writing one pretty-printed `<tenant_id>.json` per tenant.
#[derive(Debug, Clone)]
pub struct JsonDirReportStore {
    dir: PathBuf,
}

impl JsonDirReportStore {
    /// Store rooted at `dir`, created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn report_path(&self, tenant_id: &str) -> Result<PathBuf> {
        if tenant_id.is_empty()
            || tenant_id.contains(['/', '\\'])
            || tenant_id.contains("..")
        {
            return Err(Error::InvalidParameter {
                name: "tenant_id",
                message: format!("{tenant_id:?} is not usable as a file name"),
            });
        }
        Ok(self.dir.join(format!("{tenant_id}.json")))
    }
}

#[async_trait]
impl ReportStore for JsonDirReportStore {
    async fn save_report(&self, tenant_id: &str, report: &Report) -> Result<()> {
        let path = self.report_path(tenant_id)?;
        fs::create_dir_all(&self.dir).await?;

        let body = serde_json::to_vec_pretty(report)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &path).await?;

        debug!(tenant_id, path = %path.display(), "saved report");
        Ok(())
    }

    async fn get_report(&self, tenant_id: &str) -> Result<Option<Report>> {
        let path = self.report_path(tenant_id)?;
        match fs::read(&path).await {
            Ok(body) => Ok(Some(serde_json::from_slice(&body)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(tenant_id, error = %e, "failed to read report");
                Err(e.into())
            }
        }
    }
}
