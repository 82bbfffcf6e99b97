//! Bisection over the preference multiplier to reach a requested cluster count.

use tracing::debug;

use crate::cluster::affinity::{AffinityClusterer, Similarities};
use crate::cluster::assignment::ClusterAssignment;
use crate::config::ClusteringConfig;
use crate::error::{ConvergenceStage, Diagnostic};

/// Upper end of the multiplier bracket; at or above it the multiplier doubles.
const MULTIPLIER_CEILING: f64 = 1000.0;
/// Bracket width below which the search gives up.
const MULTIPLIER_RESOLUTION: f64 = 0.01;

/// Searches the preference multiplier so affinity propagation yields
/// `target` clusters, give or take `tolerance`.
#[derive(Debug, Clone)]
pub struct ClusterCountController {
    pub target: usize,
    pub tolerance: usize,
    pub max_iterations: usize,
}

impl ClusterCountController {
    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self {
            target: config.target_clusters,
            tolerance: config.cluster_count_tolerance,
            max_iterations: config.bisection_max_iterations,
        }
    }

    /// Runs the search starting from the clusterer's multiplier.
    ///
    /// Returns the result closest to the target. A `Convergence` diagnostic
    /// is recorded when the target was not reached.
    pub fn run(
        &self,
        clusterer: &AffinityClusterer,
        rows: &[Vec<f64>],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ClusterAssignment {
        let similarities = Similarities::new(rows);
        let mut multiplier = clusterer.preference_multiplier;
        let mut lower = 0.0;
        let mut upper = MULTIPLIER_CEILING;
        let mut best: Option<ClusterAssignment> = None;
        let mut collapsed = false;

        for iteration in 0..self.max_iterations {
            let result = clusterer.cluster_with(rows, &similarities, multiplier);
            let count = result.num_clusters();
            debug!(iteration, multiplier, lower, upper, clusters = count, "cluster count search");

            let within = count.abs_diff(self.target) <= self.tolerance;
            if best
                .as_ref()
                .is_none_or(|b| count.abs_diff(self.target) < b.num_clusters().abs_diff(self.target))
            {
                best = Some(result);
            }
            if within {
                break;
            }
            if upper - lower < MULTIPLIER_RESOLUTION {
                collapsed = true;
                break;
            }
            if count < self.target {
                upper = multiplier;
                multiplier = 0.5 * (lower + multiplier);
            } else {
                lower = multiplier;
                multiplier = if upper < MULTIPLIER_CEILING {
                    0.5 * (upper + multiplier)
                } else {
                    multiplier * 2.0
                };
            }
        }

        let best = match best {
            Some(best) => best,
            None => clusterer.cluster_with(rows, &similarities, multiplier),
        };
        let count = best.num_clusters();
        if count.abs_diff(self.target) > self.tolerance {
            let reason = if collapsed {
                "multiplier bracket collapsed"
            } else {
                "iteration cap reached"
            };
            Diagnostic::Convergence {
                stage: ConvergenceStage::ClusterCount,
                detail: format!(
                    "{reason}; requested {} clusters, kept {count} (multiplier {:.4})",
                    self.target,
                    best.preference_multiplier()
                ),
            }
            .report(diagnostics);
        }
        best
    }
}
