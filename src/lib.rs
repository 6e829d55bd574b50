//! # quarry
//!
//! Query analytics: turn a log of user questions (each with an embedding and
//! optional helpfulness rating) into a handful of labeled topic clusters with
//! sample questions and feedback tallies.
//!
//! ```text
//! EventStore ─▶ extract ─▶ elbow ─▶ cluster ─▶ represent ─▶ label ─▶ report ─▶ ReportStore
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`event`] | typed query events, rating wire names |
//! | [`extract`] | keep events with an embedding |
//! | [`elbow`] | choose `k` from the inertia curve |
//! | [`cluster`] | k-means (Lloyd and mini-batch) |
//! | [`represent`] | rank members by centroid distance, hydrate records |
//! | [`ratings`] | feedback tallies |
//! | [`label`] | 2-4 word labels via a text generator, with fallback |
//! | [`report`] | in-memory report and its persisted shape |
//! | [`engine`] | the pipeline |
//! | [`store`] | event and report storage traits and implementations |
//! | [`metrics`] | partition quality |
//!
//! The `parallel` feature fits elbow candidates on the rayon pool. The `http`
//! feature adds an OpenAI-compatible [`llm::HttpTextGenerator`].

pub mod cluster;
pub mod config;
pub mod elbow;
pub mod engine;
/// Error types used across `quarry`.
pub mod error;
pub mod event;
pub mod extract;
pub mod label;
#[cfg(feature = "http")]
pub mod llm;
pub mod metrics;
pub mod ratings;
pub mod report;
pub mod represent;
pub mod store;

pub use cluster::{Algorithm, ClusterParams, Clustering, Kmeans, MiniBatchKmeans, Partition};
pub use config::AnalyticsConfig;
pub use elbow::{choose_k, ElbowSearch, Selection};
pub use engine::AnalyticsEngine;
pub use error::{Error, Result};
pub use event::{QueryEvent, Rating};
pub use label::{LabelOutcome, TextGenerator, UnavailableGenerator};
pub use ratings::RatingTally;
pub use report::{AnalyticsReport, Report, ReportStatus};
pub use store::{EventLog, EventStore, ReportStore};

#[cfg(feature = "http")]
pub use llm::HttpTextGenerator;
