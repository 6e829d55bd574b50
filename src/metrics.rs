//! Partition quality measures.
//!
//! | Measure | Range | Needs ground truth | Used for |
//! |---------|-------|--------------------|----------|
//! | [`cluster_sizes`] | counts | no | run logs, spotting empty clusters |
//! | [`dominant_share`] | (0, 1] | no | "one topic swallowed the log" |
//! | [`purity`] | [0, 1] | yes | evaluating fits on labelled blobs |
//!
//! # Example
//!
//! ```rust
//! use quarry::metrics::{cluster_sizes, purity};
//!
//! let pred = [0, 0, 1, 1, 2, 2];
//! let truth = [0, 0, 0, 1, 1, 1];
//!
//! assert_eq!(cluster_sizes(&pred, 3), vec![2, 2, 2]);
//! assert!((purity(&pred, &truth) - 5.0 / 6.0).abs() < 1e-9);
//! ```

use std::collections::HashMap;

/// Number of rows assigned to each of `k` clusters.
///
/// Assignments `>= k` are ignored.
pub fn cluster_sizes(assignments: &[usize], k: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; k];
    for &c in assignments {
        if let Some(size) = sizes.get_mut(c) {
            *size += 1;
        }
    }
    sizes
}

/// Fraction of rows that fall in the largest cluster.
///
/// Returns 0.0 for empty input.
pub fn dominant_share(assignments: &[usize]) -> f64 {
    if assignments.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for &c in assignments {
        *counts.entry(c).or_insert(0) += 1;
    }
    let largest = counts.values().copied().max().unwrap_or(0);
    largest as f64 / assignments.len() as f64
}

/// Purity of clustering with respect to ground truth.
///
/// For each cluster, find the most common ground truth label.
/// Purity is the fraction of correctly assigned points.
///
/// Note: Purity increases with more clusters and is 1.0 when each point
/// is its own cluster. Use with caution.
///
/// # Returns
///
/// Purity score in [0, 1]. Higher is better. Mismatched or empty inputs
/// score 0.0.
pub fn purity(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.len() != truth.len() || pred.is_empty() {
        return 0.0;
    }

    let mut joint: HashMap<(usize, usize), usize> = HashMap::new();
    for (&p, &t) in pred.iter().zip(truth) {
        *joint.entry((p, t)).or_insert(0) += 1;
    }

    // For each predicted cluster, find max overlap with any true class
    let mut cluster_maxes: HashMap<usize, usize> = HashMap::new();
    for (&(p, _), &count) in &joint {
        let current_max = cluster_maxes.entry(p).or_insert(0);
        *current_max = (*current_max).max(count);
    }

    let correct: usize = cluster_maxes.values().sum();
    correct as f64 / pred.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_sizes_counts_empty_clusters() {
        assert_eq!(cluster_sizes(&[0, 2, 2, 0, 2], 4), vec![2, 0, 3, 0]);
        assert_eq!(cluster_sizes(&[], 2), vec![0, 0]);
    }

    #[test]
    fn test_dominant_share() {
        assert_eq!(dominant_share(&[]), 0.0);
        assert_eq!(dominant_share(&[1, 1, 1, 1]), 1.0);
        assert!((dominant_share(&[0, 1, 1, 1]) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_purity_perfect() {
        let pred = [0, 0, 1, 1];
        let truth = [1, 1, 0, 0];
        assert!((purity(&pred, &truth) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_purity_overclustering() {
        // Each point in its own cluster: purity is trivially 1.0
        let pred = [0, 1, 2, 3];
        let truth = [0, 0, 1, 1];
        assert!((purity(&pred, &truth) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_purity_mismatched_lengths() {
        assert_eq!(purity(&[0, 1], &[0]), 0.0);
    }
}
