//! K-means clustering.
//!
//! Partitions data into k clusters by minimizing **within-cluster sum of squares**
//! (WCSS), also called inertia. The foundational clustering algorithm, dating to
//! 1957 (Lloyd).
//!
//! # The Objective
//!
//! ```text
//! WCSS = Σₖ Σᵢ∈Cₖ ||xᵢ - μₖ||²
//! ```
//!
//! # Lloyd's Algorithm
//!
//! 1. Initialize k centroids via k-means++
//! 2. **Assign**: Each point → nearest centroid
//! 3. **Update**: Each centroid → mean of assigned points
//! 4. Repeat until the centroids stop moving
//!
//! WCSS decreases monotonically, so the loop converges to a local minimum.
//! Lloyd only finds local minima, so [`Kmeans`] runs `n_init` seeded restarts
//! and keeps the lowest-inertia result.
//!
//! ## K-means++ Initialization
//!
//! 1. Choose first centroid uniformly at random
//! 2. Choose next centroid with probability proportional to D(x)²
//!    (squared distance to nearest existing centroid)
//!
//! Provides provable O(log k) approximation to optimal WCSS.
//!
//! For large inputs prefer [`super::MiniBatchKmeans`], which updates centroids
//! from bounded batches instead of full passes.

use super::traits::{Clustering, Partition};
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1};
use rand::prelude::*;

/// K-means clustering algorithm (full-batch Lloyd iterations).
#[derive(Debug, Clone)]
pub struct Kmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum iterations.
    max_iter: usize,
    /// Convergence tolerance on total squared centroid shift.
    tol: f64,
    /// Seeded restarts; the lowest-inertia run wins.
    n_init: usize,
    /// Random seed.
    seed: Option<u64>,
}

impl Kmeans {
    /// Create a new K-means clusterer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 100,
            tol: 1e-4,
            n_init: 3,
            seed: None,
        }
    }

    /// Set maximum iterations.
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
        let d = data.ncols();

        let mut centroids = kmeans_plus_plus(data, self.k, rng);
        let mut labels = vec![0usize; n];

        for _iter in 0..self.max_iter {
            assign_all(data, &centroids, &mut labels);

            // Update step
            let mut new_centroids = Array2::zeros((self.k, d));
            let mut counts = vec![0usize; self.k];

            for (i, &k) in labels.iter().enumerate() {
                let mut row = new_centroids.row_mut(k);
                row += &data.row(i);
                counts[k] += 1;
            }

            for (k, &count) in counts.iter().enumerate() {
                if count > 0 {
                    new_centroids
                        .row_mut(k)
                        .mapv_inplace(|v| v / count as f32);
                } else {
                    // Empty cluster: reinitialize randomly
                    let idx = rng.random_range(0..n);
                    new_centroids.row_mut(k).assign(&data.row(idx));
                }
            }

            let shift: f32 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();

            centroids = new_centroids;

            if shift < self.tol as f32 {
                break;
            }
        }

        finish(data, centroids)
    }
}

impl Clustering for Kmeans {
    fn fit(&self, data: &[Vec<f32>]) -> Result<Partition> {
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

/// Validate rows and copy them into a dense `n × d` matrix.
pub(crate) fn to_matrix(data: &[Vec<f32>], k: usize) -> Result<Array2<f32>> {
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }

    let n = data.len();
    let d = data[0].len();

    if k == 0 || k > n {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_items: n,
        });
    }

    let mut flat: Vec<f32> = Vec::with_capacity(n * d);
    for point in data {
        if point.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: point.len(),
            });
        }
        flat.extend(point);
    }
    Array2::from_shape_vec((n, d), flat).map_err(|e| Error::Other(e.to_string()))
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> Box<dyn RngCore> {
    match seed {
        Some(s) => Box::new(StdRng::seed_from_u64(s)),
        None => Box::new(rand::rng()),
    }
}

/// Initialize centroids using the k-means++ algorithm.
pub(crate) fn kmeans_plus_plus(data: &Array2<f32>, k: usize, rng: &mut impl Rng) -> Array2<f32> {
    let n = data.nrows();
    let d = data.ncols();
    let mut centroids = Array2::zeros((k, d));

    // First centroid: random point
    let first = rng.random_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    // Running minimum of D(x)² over the centroids chosen so far.
    let mut distances: Vec<f32> = (0..n)
        .map(|j| squared_distance(&data.row(j), &centroids.row(0)))
        .collect();

    for i in 1..k {
        let total: f32 = distances.iter().sum();
        let selected = if total == 0.0 {
            rng.random_range(0..n)
        } else {
            let threshold = rng.random::<f32>() * total;
            let mut cumsum = 0.0;
            let mut selected = n - 1;
            for (j, &d) in distances.iter().enumerate() {
                cumsum += d;
                if cumsum >= threshold {
                    selected = j;
                    break;
                }
            }
            selected
        };

        centroids.row_mut(i).assign(&data.row(selected));

        for (j, dist) in distances.iter_mut().enumerate() {
            let to_new = squared_distance(&data.row(j), &centroids.row(i));
            if to_new < *dist {
                *dist = to_new;
            }
        }
    }

    centroids
}

/// Compute squared Euclidean distance.
pub(crate) fn squared_distance(a: &ArrayView1<'_, f32>, b: &ArrayView1<'_, f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index and squared distance of the nearest centroid. Ties go to the lower index.
pub(crate) fn nearest(point: &ArrayView1<'_, f32>, centroids: &Array2<f32>) -> (usize, f32) {
    let mut best_cluster = 0;
    let mut best_dist = f32::MAX;
    for (k, centroid) in centroids.rows().into_iter().enumerate() {
        let dist = squared_distance(point, &centroid);
        if dist < best_dist {
            best_dist = dist;
            best_cluster = k;
        }
    }
    (best_cluster, best_dist)
}

fn assign_all(data: &Array2<f32>, centroids: &Array2<f32>, labels: &mut [usize]) {
    for (i, label) in labels.iter_mut().enumerate() {
        *label = nearest(&data.row(i), centroids).0;
    }
}

/// Final assignment pass: labels every row and sums the inertia.
pub(crate) fn finish(data: &Array2<f32>, centroids: Array2<f32>) -> Partition {
    let mut assignments = Vec::with_capacity(data.nrows());
    let mut inertia = 0.0f64;
    for row in data.rows() {
        let (c, dist) = nearest(&row, &centroids);
        assignments.push(c);
        inertia += dist as f64;
    }

    Partition {
        assignments,
        centroids: centroids.rows().into_iter().map(|r| r.to_vec()).collect(),
        inertia,
    }
}
