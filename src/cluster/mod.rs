//! Exemplar clustering of candidate simulation groups.

pub mod affinity;
pub mod assignment;
pub mod controller;
pub mod matrix;

pub use affinity::AffinityClusterer;
pub use assignment::{ClusterAssignment, Partitioning};
pub use controller::ClusterCountController;
pub use matrix::Matrix;

use tracing::info;

use crate::config::ClusteringConfig;
use crate::error::{ClusterError, ConvergenceStage, Diagnostic};

/// Clusters feature rows according to `config`.
///
/// A single row is its own cluster. Requesting as many clusters as there are
/// rows yields the identity partition. Otherwise affinity propagation runs,
/// under the cluster-count search when `enforce_cluster_count` is set.
///
/// # Errors
///
/// Returns [`ClusterError::EmptyFeatures`] when `rows` is empty.
pub fn form_clusters(
    rows: &[Vec<f64>],
    config: &ClusteringConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<ClusterAssignment, ClusterError> {
    if rows.is_empty() {
        return Err(ClusterError::EmptyFeatures);
    }
    let partitioning = Partitioning::from_config(config);
    if rows.len() == 1 {
        return Ok(ClusterAssignment::from_exemplars(rows, vec![0], partitioning));
    }
    if config.target_clusters == rows.len() {
        info!(groups = rows.len(), "cluster count equals group count; every group is simulated");
        return Ok(ClusterAssignment::identity(rows));
    }

    let clusterer = AffinityClusterer::from_config(config);
    let assignment = if config.enforce_cluster_count {
        ClusterCountController::from_config(config).run(&clusterer, rows, diagnostics)
    } else {
        clusterer.cluster(rows)
    };
    if !assignment.converged() {
        Diagnostic::Convergence {
            stage: ConvergenceStage::AffinityPropagation,
            detail: format!(
                "stopped after {} iterations with {} clusters",
                assignment.iterations(),
                assignment.num_clusters()
            ),
        }
        .report(diagnostics);
    }
    info!(
        groups = rows.len(),
        clusters = assignment.num_clusters(),
        wcss = assignment.wcss(),
        "clustered candidate groups"
    );
    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rows_are_an_error() {
        let mut diags = Vec::new();
        let err = form_clusters(&[], &ClusteringConfig::default(), &mut diags).unwrap_err();
        assert!(matches!(err, ClusterError::EmptyFeatures));
    }

    #[test]
    fn single_row_has_zero_wcss() {
        let mut diags = Vec::new();
        let a = form_clusters(&[vec![1.0, 2.0]], &ClusteringConfig::default(), &mut diags).unwrap();
        assert_eq!(a.num_clusters(), 1);
        assert_eq!(a.wcss(), 0.0);
    }

    #[test]
    fn target_equal_to_rows_is_identity() {
        let rows: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64]).collect();
        let config = ClusteringConfig {
            target_clusters: 5,
            ..ClusteringConfig::default()
        };
        let mut diags = Vec::new();
        let a = form_clusters(&rows, &config, &mut diags).unwrap();
        assert_eq!(a.partition(), &Matrix::identity(5));
    }

    #[test]
    fn non_convergence_is_reported() {
        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let config = ClusteringConfig {
            enforce_cluster_count: false,
            max_iterations: 1,
            ..ClusteringConfig::default()
        };
        let mut diags = Vec::new();
        form_clusters(&rows, &config, &mut diags).unwrap();
        assert!(diags.iter().any(|d| matches!(
            d,
            Diagnostic::Convergence {
                stage: ConvergenceStage::AffinityPropagation,
                ..
            }
        )));
    }
}
