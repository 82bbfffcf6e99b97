//! Folding the first and last calendar days into the nearest clusters.
//!
//! Day 0 and the trailing days can never be counted by a candidate group,
//! so their weight is given to the clusters whose exemplars look most like
//! them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cluster::ClusterAssignment;
use crate::cluster::matrix::{argmin_first, partial_squared_distance};
use crate::error::Diagnostic;
use crate::features::FeatureMatrix;

/// Virtual groups added for the boundary days: half a group for day 0 and a
/// whole group for the two trailing days.
const FIRST_DAY_SHARE: f64 = 0.5;
const LAST_DAYS_SHARE: f64 = 1.0;

/// Cluster weights after accounting for the boundary days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCorrection {
    /// Cluster standing in for day 0.
    pub first_cluster: Option<usize>,
    /// Cluster standing in for the trailing days.
    pub last_cluster: Option<usize>,
    /// Per-cluster weight; sums to one.
    pub weights: Vec<f64>,
}

impl BoundaryCorrection {
    /// Raw weights with no boundary clusters.
    pub fn passthrough(assignment: &ClusterAssignment) -> Self {
        Self {
            first_cluster: None,
            last_cluster: None,
            weights: assignment.raw_weights(),
        }
    }

    /// Both boundary clusters, when the correction was applied.
    pub fn clusters(&self) -> Option<(usize, usize)> {
        self.first_cluster.zip(self.last_cluster)
    }
}

/// Computes a [`BoundaryCorrection`] for 2-day groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryWeightAdjuster;

impl BoundaryWeightAdjuster {
    /// Assigns the boundary blocks to their nearest exemplars and rescales
    /// the cluster weights over `groups + 1.5` virtual groups.
    ///
    /// Only defined for 2-day groups; otherwise records an
    /// `UnsupportedConfiguration` diagnostic and returns the raw weights.
    pub fn adjust(
        &self,
        features: &FeatureMatrix,
        assignment: &ClusterAssignment,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> BoundaryCorrection {
        let days_per_group = features.days_per_group();
        if days_per_group != 2 {
            Diagnostic::UnsupportedConfiguration {
                feature: "boundary weight adjustment",
                days_per_group,
            }
            .report(diagnostics);
            return BoundaryCorrection::passthrough(assignment);
        }
        if assignment.num_clusters() == 0 {
            return BoundaryCorrection::passthrough(assignment);
        }

        let nearest = |boundary: &[Option<f64>]| {
            argmin_first(
                assignment
                    .means()
                    .iter()
                    .map(|mean| partial_squared_distance(boundary, mean)),
            )
        };
        let first = nearest(features.first_days());
        let last = nearest(features.last_days());

        let mut weights = assignment.partition().column_sums();
        weights[first] += FIRST_DAY_SHARE;
        weights[last] += LAST_DAYS_SHARE;
        let total = assignment.num_groups() as f64 + FIRST_DAY_SHARE + LAST_DAYS_SHARE;
        weights.iter_mut().for_each(|w| *w /= total);

        debug!(first, last, "boundary days assigned");
        BoundaryCorrection {
            first_cluster: Some(first),
            last_cluster: Some(last),
            weights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Partitioning;

    fn features() -> FeatureMatrix {
        let rows = vec![vec![0.0, 0.0], vec![0.2, 0.1], vec![5.0, 5.0], vec![5.2, 4.9]];
        FeatureMatrix::from_rows(rows, 2).with_boundaries(
            vec![Some(4.8), None],
            vec![Some(0.1), Some(-0.1)],
        )
    }

    #[test]
    fn boundary_days_join_nearest_cluster() {
        let fm = features();
        let a = ClusterAssignment::from_exemplars(fm.rows(), vec![0, 2], Partitioning::Hard);
        let mut diags = Vec::new();
        let b = BoundaryWeightAdjuster.adjust(&fm, &a, &mut diags);
        assert!(diags.is_empty());
        assert_eq!(b.clusters(), Some((1, 0)));
        // (2 + 1.0) / 5.5 and (2 + 0.5) / 5.5
        assert!((b.weights[0] - 3.0 / 5.5).abs() < 1e-12);
        assert!((b.weights[1] - 2.5 / 5.5).abs() < 1e-12);
        assert!((b.weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn other_group_lengths_pass_through() {
        let fm = FeatureMatrix::from_rows(vec![vec![0.0], vec![1.0], vec![9.0]], 3);
        let a = ClusterAssignment::from_exemplars(fm.rows(), vec![0, 2], Partitioning::Hard);
        let mut diags = Vec::new();
        let b = BoundaryWeightAdjuster.adjust(&fm, &a, &mut diags);
        assert_eq!(b.clusters(), None);
        assert_eq!(b.weights, a.raw_weights());
        assert_eq!(
            diags,
            vec![Diagnostic::UnsupportedConfiguration {
                feature: "boundary weight adjustment",
                days_per_group: 3,
            }]
        );
    }
}
