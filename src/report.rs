//! Analytics reports: the in-memory result and its persisted shape.
//!
//! [`AnalyticsReport`] is what the pipeline builds. Its clusters are keyed by
//! ordinal and keep everything computed for them (centroid, ordered members,
//! label provenance). [`Report`] is the persisted, field-exact wire form,
//! where clusters are keyed by label:
//!
//! ```text
//! AnalyticsReport                         Report::Complete
//! ┌──────────────────────────┐            ┌──────────────────────────────┐
//! │ clusters: [ordinal 0..k) │ to_report  │ clusters: { label: entry }   │
//! │   label: LabelOutcome    │ ─────────▶ │   count, sample_queries,     │
//! │   centroid, members, ... │            │   ratings {good, bad, none}  │
//! └──────────────────────────┘            └──────────────────────────────┘
//! ```
//!
//! Two clusters that end up with the same label collide in the wire map and
//! the later ordinal wins. The persisted `num_clusters` is the size of that
//! map; [`AnalyticsReport::num_clusters`] keeps counting every cluster.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::label::LabelOutcome;
use crate::ratings::RatingTally;

/// Whether a report carries clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Too few events to analyze; never persisted.
    InsufficientData,
    /// Clustering ran (possibly over zero vectors).
    Complete,
}

/// Everything computed for one non-empty cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    /// Cluster index in `[0, k)`.
    pub ordinal: usize,
    /// Label and how it was obtained.
    pub label: LabelOutcome,
    /// Cluster centre.
    pub centroid: Vec<f32>,
    /// Member document ids, nearest to the centroid first.
    pub members: Vec<String>,
    /// Up to three member questions, nearest first.
    pub sample_queries: Vec<String>,
    /// Feedback over all members.
    pub ratings: RatingTally,
}

/// Result of one analytics run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    /// Tenant the events belong to.
    pub tenant_id: String,
    /// Outcome kind.
    pub status: ReportStatus,
    /// All fetched events, with or without an embedding.
    pub total_queries: usize,
    /// The `k` used for clustering (0 when nothing was clustered).
    pub optimal_clusters: usize,
    /// Whether `k` came from the elbow search.
    pub auto_detected: bool,
    /// Non-empty clusters in ordinal order.
    pub clusters: Vec<ClusterSummary>,
    /// Creation time.
    pub generated_at: DateTime<Utc>,
    /// Explanation for an insufficient-data report.
    pub message: Option<String>,
}

impl AnalyticsReport {
    /// Report for a tenant with fewer than `min_queries` events.
    pub fn insufficient(
        tenant_id: impl Into<String>,
        total_queries: usize,
        min_queries: usize,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            status: ReportStatus::InsufficientData,
            total_queries,
            optimal_clusters: 0,
            auto_detected: false,
            clusters: Vec::new(),
            generated_at: Utc::now(),
            message: Some(insufficient_message(min_queries)),
        }
    }

    /// Completed report. `clusters` are sorted by ordinal.
    pub fn complete(
        tenant_id: impl Into<String>,
        total_queries: usize,
        optimal_clusters: usize,
        auto_detected: bool,
        mut clusters: Vec<ClusterSummary>,
    ) -> Self {
        clusters.sort_by_key(|c| c.ordinal);
        Self {
            tenant_id: tenant_id.into(),
            status: ReportStatus::Complete,
            total_queries,
            optimal_clusters,
            auto_detected,
            clusters,
            generated_at: Utc::now(),
            message: None,
        }
    }

    /// Number of non-empty clusters produced, before any label collision.
    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Number of clustered (vectored) events.
    pub fn clustered_queries(&self) -> usize {
        self.clusters.iter().map(|c| c.members.len()).sum()
    }

    /// Whether clustering ran.
    pub fn is_complete(&self) -> bool {
        self.status == ReportStatus::Complete
    }

    /// Render the persisted shape, keying clusters by label.
    pub fn to_report(&self) -> Report {
        match self.status {
            ReportStatus::InsufficientData => Report::InsufficientData {
                tenant_id: self.tenant_id.clone(),
                total_queries: self.total_queries,
                message: self.message.clone().unwrap_or_default(),
            },
            ReportStatus::Complete => {
                let mut clusters = BTreeMap::new();
                for cluster in &self.clusters {
                    let entry = ClusterEntry {
                        count: cluster.members.len(),
                        sample_queries: cluster.sample_queries.clone(),
                        ratings: cluster.ratings,
                    };
                    if clusters.insert(cluster.label.text().to_string(), entry).is_some() {
                        warn!(
                            tenant_id = %self.tenant_id,
                            cluster = cluster.ordinal,
                            label = cluster.label.text(),
                            "label collision, later cluster replaces earlier"
                        );
                    }
                }

                Report::Complete {
                    tenant_id: self.tenant_id.clone(),
                    total_queries: self.total_queries,
                    num_clusters: clusters.len(),
                    optimal_clusters: self.optimal_clusters,
                    auto_detected: self.auto_detected,
                    clusters,
                    generated_at: self.generated_at,
                }
            }
        }
    }
}

fn insufficient_message(min_queries: usize) -> String {
    format!("Need at least {min_queries} queries to generate analytics")
}

/// One cluster in the persisted report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEntry {
    /// Member count.
    pub count: usize,
    /// Up to three member questions, nearest to the centroid first.
    pub sample_queries: Vec<String>,
    /// Feedback over all members.
    pub ratings: RatingTally,
}

/// Persisted report, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Report {
    /// Clusters keyed by label.
    Complete {
        tenant_id: String,
        total_queries: usize,
        num_clusters: usize,
        optimal_clusters: usize,
        auto_detected: bool,
        clusters: BTreeMap<String, ClusterEntry>,
        generated_at: DateTime<Utc>,
    },
    /// Too few events.
    InsufficientData {
        tenant_id: String,
        total_queries: usize,
        message: String,
    },
}

impl Report {
    /// Insufficient-data report.
    pub fn insufficient(
        tenant_id: impl Into<String>,
        total_queries: usize,
        min_queries: usize,
    ) -> Self {
        Report::InsufficientData {
            tenant_id: tenant_id.into(),
            total_queries,
            message: insufficient_message(min_queries),
        }
    }

    /// Status tag.
    pub fn status(&self) -> ReportStatus {
        match self {
            Report::Complete { .. } => ReportStatus::Complete,
            Report::InsufficientData { .. } => ReportStatus::InsufficientData,
        }
    }

    /// Tenant the report belongs to.
    pub fn tenant_id(&self) -> &str {
        match self {
            Report::Complete { tenant_id, .. } | Report::InsufficientData { tenant_id, .. } => {
                tenant_id
            }
        }
    }

    /// All fetched events.
    pub fn total_queries(&self) -> usize {
        match self {
            Report::Complete { total_queries, .. }
            | Report::InsufficientData { total_queries, .. } => *total_queries,
        }
    }

    /// Label-keyed clusters; empty for insufficient data.
    pub fn clusters(&self) -> Option<&BTreeMap<String, ClusterEntry>> {
        match self {
            Report::Complete { clusters, .. } => Some(clusters),
            Report::InsufficientData { .. } => None,
        }
    }
}

impl From<&AnalyticsReport> for Report {
    fn from(report: &AnalyticsReport) -> Self {
        report.to_report()
    }
}
