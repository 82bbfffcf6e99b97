//! Affinity propagation over feature rows.
//!
//! Deterministic message passing between rows: responsibilities say how well
//! suited a candidate exemplar is for a row, availabilities how appropriate
//! it is for the row to pick that exemplar. Rows that end up choosing
//! themselves become exemplars.

use tracing::debug;

use crate::cluster::assignment::{ClusterAssignment, Partitioning};
use crate::cluster::matrix::{Matrix, argmax_first, argmin_first, median, pairwise_squared_distances};
use crate::config::ClusteringConfig;

/// Pairwise squared distances of a row set and the median similarity.
#[derive(Debug, Clone)]
pub(crate) struct Similarities {
    distances: Matrix,
    median: f64,
}

impl Similarities {
    pub(crate) fn new(rows: &[Vec<f64>]) -> Self {
        let distances = pairwise_squared_distances(rows);
        let mut similarities: Vec<f64> = distances.as_slice().iter().map(|d| -d).collect();
        let median = median(&mut similarities);
        Self { distances, median }
    }

    /// Self-similarity used on the diagonal for a given multiplier.
    pub(crate) fn preference(&self, multiplier: f64) -> f64 {
        self.median * multiplier
    }
}

/// Affinity propagation clusterer.
#[derive(Debug, Clone)]
pub struct AffinityClusterer {
    /// Weight of the previous message in each update.
    pub damping: f64,
    /// Iteration cap.
    pub max_iterations: usize,
    /// Consecutive unchanged assignments that count as convergence.
    pub convergence_iterations: usize,
    /// Multiplier on the median similarity; larger values give fewer clusters.
    pub preference_multiplier: f64,
    pub partitioning: Partitioning,
}

impl Default for AffinityClusterer {
    fn default() -> Self {
        Self::from_config(&ClusteringConfig::default())
    }
}

impl AffinityClusterer {
    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self {
            damping: config.damping,
            max_iterations: config.max_iterations,
            convergence_iterations: config.convergence_iterations,
            preference_multiplier: config.preference_multiplier,
            partitioning: Partitioning::from_config(config),
        }
    }

    pub fn with_preference_multiplier(mut self, multiplier: f64) -> Self {
        self.preference_multiplier = multiplier;
        self
    }

    /// Clusters `rows` with the configured preference multiplier.
    pub fn cluster(&self, rows: &[Vec<f64>]) -> ClusterAssignment {
        let similarities = Similarities::new(rows);
        self.cluster_with(rows, &similarities, self.preference_multiplier)
    }

    /// Clusters `rows` reusing precomputed similarities.
    pub(crate) fn cluster_with(
        &self,
        rows: &[Vec<f64>],
        similarities: &Similarities,
        multiplier: f64,
    ) -> ClusterAssignment {
        let n = rows.len();
        if n <= 1 {
            return ClusterAssignment::from_exemplars(rows, vec![0], self.partitioning)
                .with_search(true, 0, multiplier);
        }

        let distances = &similarities.distances;
        let preference = similarities.preference(multiplier);
        let mut s = Matrix::zeros(n, n);
        for i in 0..n {
            for k in 0..n {
                s[(i, k)] = if i == k { preference } else { -distances[(i, k)] };
            }
        }

        let mut r = Matrix::zeros(n, n);
        let mut a = Matrix::zeros(n, n);
        let mut assigned = vec![0usize; n];
        let mut stable = 0;
        let mut iterations = 0;
        while iterations < self.max_iterations && stable < self.convergence_iterations {
            update_responsibilities(&s, &a, &mut r, self.damping);
            update_availabilities(&r, &mut a, self.damping);
            let next = choices(&a, &r);
            if next == assigned {
                stable += 1;
            } else {
                stable = 0;
                assigned = next;
            }
            iterations += 1;
        }
        let converged = stable >= self.convergence_iterations;

        let mut exemplars: Vec<usize> = (0..n).filter(|i| assigned[*i] == *i).collect();
        if exemplars.is_empty() {
            let diagonal = (0..n).map(|i| a[(i, i)] + r[(i, i)]);
            exemplars.push(argmax_first(diagonal));
        }
        let refined = refine_exemplars(&exemplars, &assigned, distances);

        debug!(
            iterations,
            converged,
            multiplier,
            clusters = refined.len(),
            "affinity propagation finished"
        );
        ClusterAssignment::from_exemplars(rows, refined, self.partitioning)
            .with_search(converged, iterations, multiplier)
    }
}

/// `R[i,k] = S[i,k] - max_{k' != k} (A[i,k'] + S[i,k'])`, damped.
fn update_responsibilities(s: &Matrix, a: &Matrix, r: &mut Matrix, damping: f64) {
    let n = s.nrows();
    for i in 0..n {
        let mut first = 0;
        let mut first_value = f64::NEG_INFINITY;
        let mut second_value = f64::NEG_INFINITY;
        for k in 0..n {
            let v = a[(i, k)] + s[(i, k)];
            if v > first_value {
                second_value = first_value;
                first_value = v;
                first = k;
            } else if v > second_value {
                second_value = v;
            }
        }
        for k in 0..n {
            let competitor = if k == first { second_value } else { first_value };
            let update = s[(i, k)] - competitor;
            r[(i, k)] = damping * r[(i, k)] + (1.0 - damping) * update;
        }
    }
}

/// Availabilities from the positive responsibilities of each column, damped.
fn update_availabilities(r: &Matrix, a: &mut Matrix, damping: f64) {
    let n = r.nrows();
    for k in 0..n {
        let support: f64 = (0..n)
            .filter(|i| *i != k)
            .map(|i| r[(i, k)].max(0.0))
            .sum();
        for i in 0..n {
            let update = if i == k {
                support
            } else {
                (r[(k, k)] + support - r[(i, k)].max(0.0)).min(0.0)
            };
            a[(i, k)] = damping * a[(i, k)] + (1.0 - damping) * update;
        }
    }
}

/// Per row, the column maximizing `A + R`.
fn choices(a: &Matrix, r: &Matrix) -> Vec<usize> {
    (0..a.nrows())
        .map(|i| argmax_first(a.row(i).iter().zip(r.row(i)).map(|(x, y)| x + y)))
        .collect()
}

/// Moves each exemplar to the member closest to the rest of its cluster.
fn refine_exemplars(exemplars: &[usize], assigned: &[usize], distances: &Matrix) -> Vec<usize> {
    exemplars
        .iter()
        .map(|e| {
            let members: Vec<usize> = (0..assigned.len()).filter(|i| assigned[*i] == *e).collect();
            if members.is_empty() {
                return *e;
            }
            let spread = members
                .iter()
                .map(|m| members.iter().map(|j| distances[(*m, *j)]).sum::<f64>());
            members[argmin_first(spread)]
        })
        .collect()
}
