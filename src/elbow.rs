//! Cluster-count selection by the elbow method.
//!
//! # The Heuristic
//!
//! Inertia always falls as `k` grows, so minimizing it is useless on its own.
//! The elbow is where adding another cluster stops paying off: the point of
//! maximum curvature on the inertia-vs-k curve.
//!
//! ```text
//! inertia
//!   │█
//!   │ █
//!   │  █
//!   │   █▄▄▄▄▄▄▄▄▄   ← diminishing returns
//!   └─────────────── k
//!       ↑ elbow
//! ```
//!
//! # Procedure
//!
//! 1. `effective_max = min(max_clusters, n - 1)`; below 2 there is nothing to
//!    search and `k = 1`.
//! 2. Fit every `k` in `1..effective_max` with the same seed; record inertia.
//! 3. Min-max normalize the inertias to `[0, 1]`. A spread at rounding
//!    level counts as flat and normalizes to all zeros.
//! 4. Take first differences (rate of decrease), then second differences
//!    (curvature).
//! 5. `k = k_values[min(argmax(curvature) + 2, len - 1)]`. The `+2` puts
//!    back the two leading elements the differencing consumed; the clamp
//!    keeps a tail argmax in range.
//!
//! Fewer than three inertias leave no curvature to inspect, and the search
//! returns `effective_max`. If a fit fails the search falls back to
//! `max(1, min(5, n / 10))`.
//!
//! The fits are independent. With the `parallel` feature they run on the
//! rayon pool.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cluster::ClusterParams;
use crate::error::Result;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Why a particular `k` was returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// Fewer than three rows; `k = 1` without fitting.
    TooFewPoints,
    /// Maximum curvature of the normalized inertia curve.
    Elbow,
    /// Fewer than three inertias; `effective_max` returned.
    TooFewSamples,
    /// The time budget ran out; chosen from the fits completed so far.
    DeadlineExceeded,
    /// A fit failed; `max(1, min(5, n / 10))` returned.
    Fallback,
}

/// Result of a cluster-count search.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// The chosen cluster count.
    pub k: usize,
    /// Inertia for `k = 1, 2, ...` in order, as far as the search got.
    pub inertias: Vec<f64>,
    /// How `k` was arrived at.
    pub reason: SelectionReason,
}

/// Inertia spreads at or below this fraction of the curve's scale (at least
/// 1.0) count as flat.
const FLAT_RELATIVE_RANGE: f64 = 1e-9;

/// Pick `k` from an inertia curve where `inertias[i]` is the inertia at
/// `k = i + 1`.
///
/// Returns `None` when fewer than three inertias are given, since two rounds
/// of differencing need at least three points. Ties in curvature resolve to
/// the smallest `k`, and a flat curve (including one that differs only by
/// rounding noise) gives `k = 3`.
///
/// ```rust
/// use quarry::elbow::choose_k;
///
/// // Sharp bend at k = 3.
/// assert_eq!(choose_k(&[100.0, 10.0, 1.0, 0.9, 0.8]), Some(3));
/// assert_eq!(choose_k(&[100.0, 10.0]), None);
/// ```
pub fn choose_k(inertias: &[f64]) -> Option<usize> {
    if inertias.len() < 3 {
        return None;
    }

    let min = inertias.iter().copied().fold(f64::INFINITY, f64::min);
    let max = inertias.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    // A spread at rounding level is a flat curve, not a shape to normalize.
    let flat = range <= FLAT_RELATIVE_RANGE * max.abs().max(1.0);

    let normalized: Vec<f64> = inertias
        .iter()
        .map(|&v| if flat { 0.0 } else { (v - min) / range })
        .collect();

    let first: Vec<f64> = normalized.windows(2).map(|w| w[1] - w[0]).collect();
    let second: Vec<f64> = first.windows(2).map(|w| w[1] - w[0]).collect();

    let mut argmax = 0;
    for (i, &v) in second.iter().enumerate() {
        if v > second[argmax] {
            argmax = i;
        }
    }

    let idx = (argmax + 2).min(inertias.len() - 1);
    Some(idx + 1)
}

/// Cluster count used when the search itself fails.
pub fn fallback_k(n: usize) -> usize {
    (n / 10).min(5).max(1)
}

/// Elbow search over candidate cluster counts.
#[derive(Debug, Clone)]
pub struct ElbowSearch {
    max_clusters: usize,
    params: ClusterParams,
    deadline: Option<Duration>,
}

impl ElbowSearch {
    /// Search with the given fit parameters and an upper bound of 15 clusters.
    pub fn new(params: ClusterParams) -> Self {
        Self {
            max_clusters: 15,
            params,
            deadline: None,
        }
    }

    /// Set the upper bound on `k`.
    pub fn with_max_clusters(mut self, max_clusters: usize) -> Self {
        self.max_clusters = max_clusters;
        self
    }

    /// Stop fitting new candidates once this much time has passed.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Choose a cluster count for `data`.
    pub fn select(&self, data: &[Vec<f32>]) -> Selection {
        let n = data.len();
        let effective_max = self.max_clusters.min(n.saturating_sub(1));

        if effective_max < 2 {
            debug!(n, effective_max, "too few points for an elbow search");
            return Selection {
                k: 1,
                inertias: Vec::new(),
                reason: SelectionReason::TooFewPoints,
            };
        }

        let started = Instant::now();
        let (fits, truncated) = self.fit_candidates(data, effective_max, started);

        let inertias = match fits {
            Ok(inertias) => inertias,
            Err(e) => {
                let k = fallback_k(n);
                warn!(error = %e, n, k, "elbow search failed, using fallback cluster count");
                return Selection {
                    k,
                    inertias: Vec::new(),
                    reason: SelectionReason::Fallback,
                };
            }
        };

        if truncated {
            let k = choose_k(&inertias).unwrap_or(inertias.len().max(1));
            warn!(
                fitted = inertias.len(),
                candidates = effective_max - 1,
                k,
                "elbow search deadline exceeded"
            );
            return Selection {
                k,
                inertias,
                reason: SelectionReason::DeadlineExceeded,
            };
        }

        let (k, reason) = match choose_k(&inertias) {
            Some(k) => (k, SelectionReason::Elbow),
            None => (effective_max, SelectionReason::TooFewSamples),
        };
        debug!(n, effective_max, k, ?inertias, "elbow search complete");

        Selection {
            k,
            inertias,
            reason,
        }
    }

    fn expired(&self, started: Instant) -> bool {
        self.deadline.is_some_and(|budget| started.elapsed() >= budget)
    }

    fn fit_inertia(&self, data: &[Vec<f32>], k: usize) -> Result<f64> {
        Ok(self.params.fit(data, k)?.inertia)
    }

    #[cfg(not(feature = "parallel"))]
    fn fit_candidates(
        &self,
        data: &[Vec<f32>],
        effective_max: usize,
        started: Instant,
    ) -> (Result<Vec<f64>>, bool) {
        let mut inertias = Vec::with_capacity(effective_max);
        for k in 1..effective_max {
            if self.expired(started) {
                return (Ok(inertias), true);
            }
            match self.fit_inertia(data, k) {
                Ok(inertia) => inertias.push(inertia),
                Err(e) => return (Err(e), false),
            }
        }
        (Ok(inertias), false)
    }

    #[cfg(feature = "parallel")]
    fn fit_candidates(
        &self,
        data: &[Vec<f32>],
        effective_max: usize,
        started: Instant,
    ) -> (Result<Vec<f64>>, bool) {
        let results: Vec<Option<Result<f64>>> = (1..effective_max)
            .into_par_iter()
            .map(|k| {
                if self.expired(started) {
                    None
                } else {
                    Some(self.fit_inertia(data, k))
                }
            })
            .collect();

        let mut inertias = Vec::with_capacity(results.len());
        for result in results {
            match result {
                // Only the prefix of consecutive k values is usable.
                None => return (Ok(inertias), true),
                Some(Ok(inertia)) => inertias.push(inertia),
                Some(Err(e)) => return (Err(e), false),
            }
        }
        (Ok(inertias), false)
    }
}
