//! Representative selection: which members speak for a cluster.
//!
//! Members are ranked by Euclidean distance to their centroid (nearest first,
//! ties in input order). The ranked ids are then hydrated from the event
//! store in chunks no larger than the store's batch limit, and the hydrated
//! records are put back into distance order.
//!
//! ```text
//! members (ranked) ──chunk(batch_limit)──▶ get_events_by_ids ──▶ re-order by rank
//!                                                               │
//!                        ┌──────────────────────────────────────┤
//!                        ▼                                      ▼
//!              first `pool_size` texts                 ratings over all
//!              (labeling pool, samples)                members
//! ```

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::cluster::Partition;
use crate::error::Result;
use crate::event::QueryEvent;
use crate::extract::Extracted;
use crate::ratings::{tally_members, RatingTally};
use crate::store::{bounded, EventStore};

/// A non-empty cluster with its members in distance order.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCluster {
    /// Cluster index in `[0, k)`.
    pub ordinal: usize,
    /// Cluster centre.
    pub centroid: Vec<f32>,
    /// Member ids, nearest first.
    pub members: Vec<String>,
}

/// Rank the members of every non-empty cluster.
///
/// Clusters without members are skipped. The result is in ordinal order.
pub fn rank_members(extracted: &Extracted, partition: &Partition) -> Vec<RankedCluster> {
    partition
        .members()
        .into_iter()
        .enumerate()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(ordinal, rows)| {
            let centroid = &partition.centroids[ordinal];
            let mut ranked: Vec<(usize, f32)> = rows
                .into_iter()
                .map(|i| (i, euclidean(&extracted.vectors[i], centroid)))
                .collect();
            // sort_by is stable: equal distances keep input order
            ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

            RankedCluster {
                ordinal,
                centroid: centroid.clone(),
                members: ranked
                    .into_iter()
                    .map(|(i, _)| extracted.doc_ids[i].clone())
                    .collect(),
            }
        })
        .collect()
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Hydrated view of a ranked cluster.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Representatives {
    /// Non-empty texts among the first `pool_size` hydrated records, nearest first.
    pub texts: Vec<String>,
    /// The first `sample_size` of `texts`.
    pub sample_queries: Vec<String>,
    /// Feedback over all members; unhydrated members count as unrated.
    pub ratings: RatingTally,
}

/// How many records feed labeling and samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizes {
    /// Hydrated records considered for labeling.
    pub pool_size: usize,
    /// Sample questions kept in the report.
    pub sample_size: usize,
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self {
            pool_size: 10,
            sample_size: 3,
        }
    }
}

/// Load every member of `cluster` and derive its representatives.
///
/// Each store call is bounded by `timeout`; a failed or timed-out call fails
/// the whole hydration.
pub async fn hydrate(
    store: &dyn EventStore,
    cluster: &RankedCluster,
    sizes: PoolSizes,
    timeout: Duration,
) -> Result<Representatives> {
    let chunk_size = store.batch_limit().max(1);
    let mut by_id: HashMap<String, QueryEvent> = HashMap::with_capacity(cluster.members.len());

    for chunk in cluster.members.chunks(chunk_size) {
        let events = bounded("get_events_by_ids", timeout, store.get_events_by_ids(chunk)).await?;
        by_id.extend(events.into_iter().map(|e| (e.doc_id.clone(), e)));
    }

    let ordered: Vec<&QueryEvent> = cluster
        .members
        .iter()
        .filter_map(|id| by_id.get(id))
        .collect();
    debug!(
        cluster = cluster.ordinal,
        members = cluster.members.len(),
        hydrated = ordered.len(),
        "hydrated cluster members"
    );

    let texts: Vec<String> = ordered
        .iter()
        .take(sizes.pool_size)
        .filter(|e| !e.query_text.is_empty())
        .map(|e| e.query_text.clone())
        .collect();
    let sample_queries = texts.iter().take(sizes.sample_size).cloned().collect();
    let ratings = tally_members(ordered.iter().map(|e| e.rating), cluster.members.len());

    Ok(Representatives {
        texts,
        sample_queries,
        ratings,
    })
}
