//! Engine configuration.
//!
//! | Field | Default | Environment |
//! |-------|---------|-------------|
//! | `max_clusters` | 15 | `QUARRY_MAX_CLUSTERS` |
//! | `seed` | 42 | `QUARRY_SEED` |
//! | `min_queries` | 5 | `QUARRY_MIN_QUERIES` |
//! | `batch_size` | 100 | |
//! | `max_iter` | 100 | |
//! | `label_pool_size` | 10 | |
//! | `sample_size` | 3 | |
//! | `event_type` | `"chat"` | |
//! | `call_timeout_secs` | 30 | `QUARRY_CALL_TIMEOUT_SECS` |
//! | `search_deadline_secs` | none | `QUARRY_SEARCH_DEADLINE_SECS` |
//! | `algorithm` | `mini_batch` | |
//!
//! A JSON file may set any subset of the fields; the rest keep their defaults.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cluster::{Algorithm, ClusterParams};
use crate::error::{Error, Result};
use crate::event::CHAT_EVENT;
use crate::represent::PoolSizes;

/// Settings for one [`AnalyticsEngine`](crate::engine::AnalyticsEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsConfig {
    /// Upper bound for the elbow search.
    pub max_clusters: usize,
    /// Seed shared by every fit.
    pub seed: u64,
    /// Fewer fetched events than this yields an insufficient-data report.
    pub min_queries: usize,
    /// Mini-batch size.
    pub batch_size: usize,
    /// Iteration cap per fit.
    pub max_iter: usize,
    /// Hydrated records per cluster used for labeling.
    pub label_pool_size: usize,
    /// Sample questions kept per cluster.
    pub sample_size: usize,
    /// Event type fetched from the store.
    pub event_type: String,
    /// Budget for each store or generator call.
    pub call_timeout_secs: u64,
    /// Budget for the whole elbow search.
    pub search_deadline_secs: Option<u64>,
    /// Partitioning primitive.
    pub algorithm: Algorithm,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_clusters: 15,
            seed: 42,
            min_queries: 5,
            batch_size: 100,
            max_iter: 100,
            label_pool_size: 10,
            sample_size: 3,
            event_type: CHAT_EVENT.to_string(),
            call_timeout_secs: 30,
            search_deadline_secs: None,
            algorithm: Algorithm::MiniBatch,
        }
    }
}

impl AnalyticsConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the upper bound for the elbow search.
    pub fn with_max_clusters(mut self, max_clusters: usize) -> Self {
        self.max_clusters = max_clusters;
        self
    }

    /// Set the seed shared by every fit.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the insufficient-data threshold.
    pub fn with_min_queries(mut self, min_queries: usize) -> Self {
        self.min_queries = min_queries;
        self
    }

    /// Set the partitioning primitive.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the mini-batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the per-call budget, rounded down to whole seconds (at least one).
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set or clear the elbow search budget, in whole seconds.
    pub fn with_search_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.search_deadline_secs = deadline.map(|d| d.as_secs());
        self
    }

    /// Set the event type fetched from the store.
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    /// Defaults overridden by any `QUARRY_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = env_parse("QUARRY_MAX_CLUSTERS")? {
            config.max_clusters = v;
        }
        if let Some(v) = env_parse("QUARRY_SEED")? {
            config.seed = v;
        }
        if let Some(v) = env_parse("QUARRY_MIN_QUERIES")? {
            config.min_queries = v;
        }
        if let Some(v) = env_parse("QUARRY_CALL_TIMEOUT_SECS")? {
            config.call_timeout_secs = v;
        }
        if let Some(v) = env_parse("QUARRY_SEARCH_DEADLINE_SECS")? {
            config.search_deadline_secs = Some(v);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("batch_size", self.batch_size),
            ("max_iter", self.max_iter),
            ("call_timeout_secs", self.call_timeout_secs as usize),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be positive")));
            }
        }
        if self.sample_size > self.label_pool_size {
            return Err(Error::Config(format!(
                "sample_size ({}) exceeds label_pool_size ({})",
                self.sample_size, self.label_pool_size
            )));
        }
        if self.event_type.is_empty() {
            return Err(Error::Config("event_type must not be empty".into()));
        }
        Ok(())
    }

    /// Parameters for every fit of a run.
    pub fn cluster_params(&self) -> ClusterParams {
        ClusterParams {
            algorithm: self.algorithm,
            seed: self.seed,
            batch_size: self.batch_size,
            max_iter: self.max_iter,
        }
    }

    /// Labeling pool and sample sizes.
    pub fn pool_sizes(&self) -> PoolSizes {
        PoolSizes {
            pool_size: self.label_pool_size,
            sample_size: self.sample_size,
        }
    }

    /// Budget for each store or generator call.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Budget for the elbow search, if any.
    pub fn search_deadline(&self) -> Option<Duration> {
        self.search_deadline_secs.map(Duration::from_secs)
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
