//! Clustering algorithms for grouping query embeddings into topics.
//!
//! All algorithms here are **hard** partitioners: each point lands in exactly
//! one cluster, and the fit reports the centroid of every cluster together
//! with the total inertia (WCSS) the elbow search needs.
//!
//! ## Algorithms
//!
//! ### K-means (Lloyd)
//!
//! Assign each point to the nearest centroid, then move each centroid to the
//! mean of its points. Repeat.
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} ||x - μ_k||²
//! ```
//!
//! ### Mini-batch K-means
//!
//! Same objective, but each step uses a bounded random batch and a per-centroid
//! learning rate. Cost per step is independent of `n`, which is what lets the
//! engine refit a dozen candidate `k`s over a large query log.
//!
//! | Algorithm | Cost per step | Centroids | Use |
//! |-----------|---------------|-----------|-----|
//! | [`Kmeans`] | O(n·k·d) | exact member means | small logs, reference results |
//! | [`MiniBatchKmeans`] | O(b·k·d) | running means | default for the pipeline |
//!
//! **Assumptions** (both): clusters are roughly spherical and similarly sized.
//!
//! ## Degenerate input
//!
//! With heavily duplicated rows, k-means++ can seed several centroids on the
//! same point. Ties go to the lower cluster index, so the extra clusters end up
//! with no members. That is not an error: downstream stages skip empty
//! clusters.
//!
//! ## Usage
//!
//! ```rust
//! use quarry::cluster::{Clustering, MiniBatchKmeans};
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ];
//!
//! let partition = MiniBatchKmeans::new(2).with_seed(42).fit(&data).unwrap();
//! assert_eq!(partition.assignments[0], partition.assignments[1]);
//! assert_ne!(partition.assignments[0], partition.assignments[2]);
//! ```

mod kmeans;
mod minibatch;
mod traits;

pub use kmeans::Kmeans;
pub use minibatch::MiniBatchKmeans;
pub use traits::{Clustering, Partition};

use serde::{Deserialize, Serialize};

/// Which partitioning primitive the pipeline fits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Mini-batch updates (default).
    #[default]
    MiniBatch,
    /// Full-batch Lloyd iterations.
    Lloyd,
}

/// Parameters shared by every fit in one analytics run.
///
/// The elbow search and the final clustering use the same parameters, so the
/// inertia curve describes exactly the partitions the report is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterParams {
    /// Partitioning primitive.
    pub algorithm: Algorithm,
    /// Fixed seed.
    pub seed: u64,
    /// Points per mini-batch step.
    pub batch_size: usize,
    /// Iteration cap.
    pub max_iter: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::MiniBatch,
            seed: 42,
            batch_size: 100,
            max_iter: 100,
        }
    }
}

impl ClusterParams {
    /// Build a clusterer for `k` clusters.
    pub fn clusterer(&self, k: usize) -> Box<dyn Clustering + Send + Sync> {
        match self.algorithm {
            Algorithm::MiniBatch => Box::new(
                MiniBatchKmeans::new(k)
                    .with_seed(self.seed)
                    .with_batch_size(self.batch_size)
                    .with_max_iter(self.max_iter),
            ),
            Algorithm::Lloyd => Box::new(
                Kmeans::new(k)
                    .with_seed(self.seed)
                    .with_max_iter(self.max_iter),
            ),
        }
    }

    /// Fit `k` clusters to `data`.
    pub fn fit(&self, data: &[Vec<f32>], k: usize) -> crate::Result<Partition> {
        self.clusterer(k).fit(data)
    }
}
