//! The analytics pipeline.
//!
//! ```text
//! get_events ─▶ extract ─▶ elbow search ─▶ fit ─▶ rank ─▶ hydrate ─▶ label ─▶ save_report
//!    │                     (skipped when                          (all clusters
//!    │                      k is given)                            concurrently)
//!    └─▶ fewer than `min_queries` events: insufficient-data report, nothing saved
//! ```
//!
//! Fitting is CPU-bound and runs on the blocking pool. Every store and
//! generator call is bounded by `call_timeout`. Store failures abort the run;
//! generator failures only change a cluster's label.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use tracing::{debug, error, info, instrument, warn};

use crate::cluster::Partition;
use crate::config::AnalyticsConfig;
use crate::elbow::ElbowSearch;
use crate::error::{Error, Result};
use crate::extract::{extract_vectors, Extracted};
use crate::label::{ClusterLabeler, TextGenerator};
use crate::metrics::{cluster_sizes, dominant_share};
use crate::report::{AnalyticsReport, ClusterSummary, Report};
use crate::represent::{hydrate, rank_members};
use crate::store::{bounded, EventStore, ReportStore};

/// Runs analytics for a tenant against injected collaborators.
pub struct AnalyticsEngine {
    events: Arc<dyn EventStore>,
    reports: Arc<dyn ReportStore>,
    labeler: ClusterLabeler,
    config: AnalyticsConfig,
}

impl std::fmt::Debug for AnalyticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsEngine")
            .field("labeler", &self.labeler)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What the blocking clustering step hands back.
struct Fitted {
    extracted: Extracted,
    partition: Partition,
    k: usize,
    auto_detected: bool,
}

impl AnalyticsEngine {
    /// Create an engine; labels are generated with `config`'s call timeout.
    pub fn new(
        events: Arc<dyn EventStore>,
        reports: Arc<dyn ReportStore>,
        generator: Arc<dyn TextGenerator>,
        config: AnalyticsConfig,
    ) -> Self {
        let labeler = ClusterLabeler::new(generator, config.call_timeout());
        Self {
            events,
            reports,
            labeler,
            config,
        }
    }

    /// Settings this engine runs with.
    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Cluster the tenant's logged questions and persist the report.
    ///
    /// With `n_clusters` the elbow search is skipped and the value is used
    /// as given; a count the clusterer rejects fails the run.
    #[instrument(skip(self))]
    pub async fn run_analytics(
        &self,
        tenant_id: &str,
        n_clusters: Option<usize>,
    ) -> Result<AnalyticsReport> {
        let timeout = self.config.call_timeout();
        info!("starting analytics run");

        let events = bounded(
            "get_events",
            timeout,
            self.events.get_events(tenant_id, Some(&self.config.event_type)),
        )
        .await
        .inspect_err(|e| error!(error = %e, "failed to fetch events"))?;

        let total_queries = events.len();
        if total_queries < self.config.min_queries {
            warn!(
                total_queries,
                min_queries = self.config.min_queries,
                "not enough data for clustering"
            );
            return Ok(AnalyticsReport::insufficient(
                tenant_id,
                total_queries,
                self.config.min_queries,
            ));
        }

        let extracted = extract_vectors(&events)?;
        drop(events);
        info!(total_queries, vectored = extracted.len(), "extracted vectors");

        if extracted.is_empty() {
            warn!(total_queries, "no event carries an embedding");
            let report = AnalyticsReport::complete(tenant_id, total_queries, 0, false, Vec::new());
            self.persist(&report).await?;
            return Ok(report);
        }

        let fitted = self
            .fit(extracted, n_clusters)
            .await
            .inspect_err(|e| error!(error = %e, "clustering failed"))?;
        info!(
            k = fitted.k,
            auto_detected = fitted.auto_detected,
            inertia = fitted.partition.inertia,
            sizes = ?cluster_sizes(&fitted.partition.assignments, fitted.k),
            dominant_share = dominant_share(&fitted.partition.assignments),
            "clustered vectors"
        );

        let ranked = rank_members(&fitted.extracted, &fitted.partition);
        let sizes = self.config.pool_sizes();
        let hydrated = try_join_all(
            ranked
                .iter()
                .map(|cluster| hydrate(self.events.as_ref(), cluster, sizes, timeout)),
        )
        .await
        .inspect_err(|e| error!(error = %e, "failed to hydrate cluster members"))?;

        let labels = join_all(hydrated.iter().map(|reps| self.labeler.label(&reps.texts))).await;

        let clusters: Vec<ClusterSummary> = ranked
            .into_iter()
            .zip(hydrated)
            .zip(labels)
            .map(|((cluster, reps), label)| {
                debug!(
                    cluster = cluster.ordinal,
                    members = cluster.members.len(),
                    label = label.text(),
                    "assembled cluster"
                );
                ClusterSummary {
                    ordinal: cluster.ordinal,
                    label,
                    centroid: cluster.centroid,
                    members: cluster.members,
                    sample_queries: reps.sample_queries,
                    ratings: reps.ratings,
                }
            })
            .collect();

        let report = AnalyticsReport::complete(
            tenant_id,
            total_queries,
            fitted.k,
            fitted.auto_detected,
            clusters,
        );
        self.persist(&report).await?;

        info!(num_clusters = report.num_clusters(), "analytics run complete");
        Ok(report)
    }

    /// The tenant's latest persisted report.
    #[instrument(skip(self))]
    pub async fn get_report(&self, tenant_id: &str) -> Result<Report> {
        bounded(
            "get_report",
            self.config.call_timeout(),
            self.reports.get_report(tenant_id),
        )
        .await?
        .ok_or_else(|| Error::NotFound(format!("no report for tenant {tenant_id}")))
    }

    async fn fit(&self, extracted: Extracted, n_clusters: Option<usize>) -> Result<Fitted> {
        let params = self.config.cluster_params();
        let search = ElbowSearch::new(params.clone())
            .with_max_clusters(self.config.max_clusters)
            .with_deadline(self.config.search_deadline());

        tokio::task::spawn_blocking(move || -> Result<Fitted> {
            let (k, auto_detected) = match n_clusters {
                Some(k) => (k, false),
                None => {
                    let selection = search.select(&extracted.vectors);
                    debug!(k = selection.k, reason = ?selection.reason, "selected cluster count");
                    (selection.k, true)
                }
            };
            let partition = params.fit(&extracted.vectors, k)?;
            Ok(Fitted {
                extracted,
                partition,
                k,
                auto_detected,
            })
        })
        .await
        .map_err(|e| Error::Other(format!("clustering task failed: {e}")))?
    }

    async fn persist(&self, report: &AnalyticsReport) -> Result<()> {
        let wire = report.to_report();
        bounded(
            "save_report",
            self.config.call_timeout(),
            self.reports.save_report(&report.tenant_id, &wire),
        )
        .await
        .inspect_err(|e| error!(error = %e, "failed to save report"))?;
        debug!("saved report");
        Ok(())
    }
}
