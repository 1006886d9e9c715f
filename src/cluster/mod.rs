//! Density-based clustering over article embedding vectors.
//!
//! The algorithm is HDBSCAN: mutual-reachability distances, a minimum
//! spanning tree condensed into a cluster hierarchy, and stability-based
//! cluster extraction. Every point receives either a non-negative cluster
//! label or [`NOISE`].
//!
//! # Submodules
//!
//! - [`hdbscan`]: the clustering algorithm itself
//!
//! Configuration enums live here so the CLI and the engine share them.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod hdbscan;

pub use hdbscan::{Hdbscan, HdbscanParams};

/// Sentinel label for points not assigned to any cluster.
pub const NOISE: i64 = -1;

/// Distance metric used for the pairwise distance matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
pub enum DistanceMetric {
    /// Cosine distance: `1 - (a·b) / (|a||b|)`.
    #[default]
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
}

impl DistanceMetric {
    /// Distance between two equal-length vectors.
    ///
    /// For cosine, a zero-norm vector is maximally dissimilar to everything
    /// (distance 1.0).
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            DistanceMetric::Cosine => {
                let mut dot = 0.0;
                let mut norm_a = 0.0;
                let mut norm_b = 0.0;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
            }
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
        }
    }
}

/// How clusters are extracted from the condensed hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
pub enum ClusterSelection {
    /// Excess of Mass: favors globally stable clusters.
    #[default]
    Eom,
    /// Leaf: selects the leaves of the hierarchy for maximal granularity.
    Leaf,
}

impl ClusterSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterSelection::Eom => "eom",
            ClusterSelection::Leaf => "leaf",
        }
    }
}

/// Why a clustering run could not produce a partition.
///
/// The per-date driver treats any of these as "skip this date": a malformed
/// single day must never abort a multi-year batch.
#[derive(Debug, Error, PartialEq)]
pub enum ClusterError {
    #[error("clustering received no vectors")]
    EmptyInput,

    #[error("min_cluster_size must be >= 2, got {0}")]
    MinClusterSize(usize),

    #[error("vector {index} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("vector {index} contains a non-finite component")]
    NonFinite { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance() {
        let d = DistanceMetric::Euclidean.distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_distance_orthogonal() {
        let d = DistanceMetric::Cosine.distance(&[1.0, 0.0], &[0.0, 1.0]);
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_distance_parallel() {
        let d = DistanceMetric::Cosine.distance(&[1.0, 2.0], &[2.0, 4.0]);
        assert!(d.abs() < 1e-12);
    }

    #[test]
    fn test_cosine_distance_zero_norm() {
        let d = DistanceMetric::Cosine.distance(&[0.0, 0.0], &[1.0, 1.0]);
        assert_eq!(d, 1.0);
    }

    #[test]
    fn test_cluster_error_display() {
        let e = ClusterError::MinClusterSize(1);
        assert_eq!(e.to_string(), "min_cluster_size must be >= 2, got 1");
    }
}
