//! Mini-batch K-means.
//!
//! Lloyd's algorithm touches every point on every iteration. Sculley (2010)
//! replaces the full pass with a small random batch and a per-centroid
//! gradient step:
//!
//! ```text
//! for x in batch:
//!     c      = nearest(x)
//!     n[c]  += 1
//!     η      = 1 / n[c]
//!     μ[c]  += η (x - μ[c])
//! ```
//!
//! The learning rate `1 / n[c]` makes each centroid the running mean of every
//! point ever assigned to it, so early batches move centroids a lot and later
//! batches barely nudge them.
//!
//! # Stopping
//!
//! - total squared centroid shift of a step falls below `tol`, or
//! - the smoothed batch inertia fails to improve for `max_no_improvement`
//!   consecutive steps, or
//! - `max_iter` steps have run.
//!
//! When `batch_size >= n` every step uses the whole dataset in input order,
//! which keeps small inputs fully deterministic for a given seed.
//!
//! # References
//!
//! - Sculley (2010). "Web-Scale K-Means Clustering." WWW '10.

use super::kmeans::{finish, kmeans_plus_plus, nearest, seeded_rng, to_matrix};
use super::traits::{Clustering, Partition};
use crate::error::{Error, Result};
use ndarray::Array2;
use rand::prelude::*;
use rand::seq::index;

/// Mini-batch K-means clustering.
#[derive(Debug, Clone)]
pub struct MiniBatchKmeans {
    k: usize,
    batch_size: usize,
    max_iter: usize,
    tol: f64,
    max_no_improvement: usize,
    n_init: usize,
    seed: Option<u64>,
}

impl MiniBatchKmeans {
    /// Create a new mini-batch K-means clusterer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            batch_size: 100,
            max_iter: 100,
            tol: 1e-6,
            max_no_improvement: 10,
            n_init: 3,
            seed: None,
        }
    }

    /// Set the number of points sampled per step.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set maximum number of mini-batch steps.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn run_once(&self, data: &Array2<f32>, rng: &mut impl Rng) -> Partition {
        let n = data.nrows();
        let mut centroids = kmeans_plus_plus(data, self.k, rng);
        let mut counts = vec![0u64; self.k];

        let full_batch: Vec<usize> = (0..n).collect();
        let mut ewa_inertia: Option<f64> = None;
        let mut best_ewa = f64::INFINITY;
        let mut stale_steps = 0usize;

        for _step in 0..self.max_iter {
            let batch: Vec<usize> = if self.batch_size >= n {
                full_batch.clone()
            } else {
                index::sample(rng, n, self.batch_size).into_vec()
            };

            let before = centroids.clone();
            let mut batch_inertia = 0.0f64;

            for &i in &batch {
                let point = data.row(i);
                let (c, dist) = nearest(&point, &centroids);
                batch_inertia += dist as f64;

                counts[c] += 1;
                let eta = 1.0 / counts[c] as f32;
                // Written as a step toward x so a centroid sitting on x stays put.
                let mut centroid = centroids.row_mut(c);
                centroid.zip_mut_with(&point, |m, &x| *m += eta * (x - *m));
            }

            let shift: f32 = before
                .iter()
                .zip(centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            if (shift as f64) < self.tol {
                break;
            }

            // Smoothed per-point batch inertia, as a cheap progress signal.
            let per_point = batch_inertia / batch.len() as f64;
            let alpha = (batch.len() as f64 * 2.0 / (n as f64 + 1.0)).min(1.0);
            let ewa = match ewa_inertia {
                Some(prev) => prev * (1.0 - alpha) + per_point * alpha,
                None => per_point,
            };
            ewa_inertia = Some(ewa);

            if ewa < best_ewa {
                best_ewa = ewa;
                stale_steps = 0;
            } else {
                stale_steps += 1;
                if stale_steps >= self.max_no_improvement {
                    break;
                }
            }
        }

        finish(data, centroids)
    }
}

impl Clustering for MiniBatchKmeans {
    fn fit(&self, data: &[Vec<f32>]) -> Result<Partition> {
        if self.batch_size == 0 {
            return Err(Error::InvalidParameter {
                name: "batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        let data_arr = to_matrix(data, self.k)?;
        let mut rng = seeded_rng(self.seed);

        let mut best: Option<Partition> = None;
        for _ in 0..self.n_init.max(1) {
            let run = self.run_once(&data_arr, &mut rng);
            match &best {
                Some(b) if b.inertia <= run.inertia => {}
                _ => best = Some(run),
            }
        }

        best.ok_or(Error::EmptyInput)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}
