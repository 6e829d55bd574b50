//! Clustering traits.

use crate::error::Result;

/// Output of a hard partitioning run.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Cluster index in `[0, k)` for each input row.
    pub assignments: Vec<usize>,
    /// One centroid per cluster, `k` rows of dimension `d`.
    pub centroids: Vec<Vec<f32>>,
    /// Within-cluster sum of squared distances.
    pub inertia: f64,
}

impl Partition {
    /// Number of clusters the partition was fitted with.
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Row indices assigned to each cluster, in input order.
    ///
    /// Clusters nobody was assigned to come back as empty vectors.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.k()];
        for (i, &c) in self.assignments.iter().enumerate() {
            members[c].push(i);
        }
        members
    }
}

/// Trait for clustering algorithms.
pub trait Clustering {
    /// Fit the model to data and return assignments, centroids and inertia.
    fn fit(&self, data: &[Vec<f32>]) -> Result<Partition>;

    /// Fit the model to data and return cluster assignments.
    ///
    /// Returns a vector of cluster labels, one per input point.
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        Ok(self.fit(data)?.assignments)
    }

    /// Get the number of clusters.
    fn n_clusters(&self) -> usize;
}
