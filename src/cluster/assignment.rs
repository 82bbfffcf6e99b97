//! Cluster assignment: exemplars, partition matrix and summary statistics.

use serde::{Deserialize, Serialize};

use crate::cluster::matrix::{Matrix, argmin_first, squared_distance};
use crate::config::ClusteringConfig;

/// Distance substituted for exact zeros when computing fuzzy memberships.
const MIN_FUZZY_DISTANCE: f64 = 1e-10;

/// How groups are split between clusters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Partitioning {
    /// Each group belongs entirely to its nearest exemplar.
    Hard,
    /// Fuzzy c-means memberships with exponent `fuzziness`.
    Fuzzy { fuzziness: f64 },
}

impl Partitioning {
    pub fn from_config(config: &ClusteringConfig) -> Self {
        if config.hard_partition {
            Self::Hard
        } else {
            Self::Fuzzy {
                fuzziness: config.fuzziness,
            }
        }
    }
}

/// Result of clustering the candidate groups.
///
/// Clusters are ordered by ascending exemplar index. Serializable so it can
/// be cached and reused for several simulations of the same scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    exemplars: Vec<usize>,
    means: Vec<Vec<f64>>,
    partition: Matrix,
    index: Vec<usize>,
    counts: Vec<usize>,
    wcss: f64,
    converged: bool,
    iterations: usize,
    preference_multiplier: f64,
}

impl ClusterAssignment {
    /// Builds the assignment induced by a set of exemplar rows.
    ///
    /// Exemplars are sorted and deduplicated; every row is assigned to its
    /// nearest exemplar (lowest exemplar index on ties) and the partition
    /// follows `partitioning`. An empty exemplar list falls back to row 0.
    ///
    /// # Panics
    ///
    /// Panics if an exemplar index is out of range.
    pub fn from_exemplars(
        rows: &[Vec<f64>],
        mut exemplars: Vec<usize>,
        partitioning: Partitioning,
    ) -> Self {
        exemplars.sort_unstable();
        exemplars.dedup();
        if exemplars.is_empty() && !rows.is_empty() {
            exemplars.push(0);
        }
        let means: Vec<Vec<f64>> = exemplars.iter().map(|e| rows[*e].clone()).collect();
        let distances: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| means.iter().map(|m| squared_distance(row, m)).collect())
            .collect();
        let index: Vec<usize> = distances
            .iter()
            .map(|d| argmin_first(d.iter().copied()))
            .collect();
        let wcss = index.iter().zip(&distances).map(|(k, d)| d[*k]).sum();

        let k = exemplars.len();
        let partition = match partitioning {
            Partitioning::Hard => {
                let mut p = Matrix::zeros(rows.len(), k);
                for (g, cluster) in index.iter().enumerate() {
                    p[(g, *cluster)] = 1.0;
                }
                p
            }
            Partitioning::Fuzzy { fuzziness } => fuzzy_partition(&distances, k, fuzziness),
        };

        Self {
            counts: count_members(&index, k),
            exemplars,
            means,
            partition,
            index,
            wcss,
            converged: true,
            iterations: 0,
            preference_multiplier: 1.0,
        }
    }

    /// Every group is its own cluster.
    pub fn identity(rows: &[Vec<f64>]) -> Self {
        let n = rows.len();
        Self {
            exemplars: (0..n).collect(),
            means: rows.to_vec(),
            partition: Matrix::identity(n),
            index: (0..n).collect(),
            counts: vec![1; n],
            wcss: 0.0,
            converged: true,
            iterations: 0,
            preference_multiplier: 1.0,
        }
    }

    /// Records how the assignment was reached.
    pub(crate) fn with_search(
        mut self,
        converged: bool,
        iterations: usize,
        preference_multiplier: f64,
    ) -> Self {
        self.converged = converged;
        self.iterations = iterations;
        self.preference_multiplier = preference_multiplier;
        self
    }

    pub fn num_clusters(&self) -> usize {
        self.exemplars.len()
    }

    pub fn num_groups(&self) -> usize {
        self.index.len()
    }

    /// Group index of each cluster's exemplar, ascending.
    pub fn exemplars(&self) -> &[usize] {
        &self.exemplars
    }

    /// Feature row of each cluster's exemplar.
    pub fn means(&self) -> &[Vec<f64>] {
        &self.means
    }

    /// Groups × clusters membership matrix; rows sum to one.
    pub fn partition(&self) -> &Matrix {
        &self.partition
    }

    /// Nearest cluster of each group.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Number of groups whose nearest cluster is each cluster.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Within-cluster sum of squared distances to the nearest exemplar.
    pub fn wcss(&self) -> f64 {
        self.wcss
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Message-passing iterations of the final clustering run.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn preference_multiplier(&self) -> f64 {
        self.preference_multiplier
    }

    /// Partition column sums divided by the number of groups.
    pub fn raw_weights(&self) -> Vec<f64> {
        let n = self.num_groups().max(1) as f64;
        self.partition.column_sums().into_iter().map(|s| s / n).collect()
    }

    /// First counted calendar day of each exemplar group.
    pub fn exemplar_start_days(&self, days_per_group: usize) -> Vec<usize> {
        self.exemplars
            .iter()
            .map(|e| e * days_per_group + 1)
            .collect()
    }
}

fn count_members(index: &[usize], k: usize) -> Vec<usize> {
    let mut counts = vec![0; k];
    for cluster in index {
        counts[*cluster] += 1;
    }
    counts
}

/// Fuzzy c-means memberships from squared distances to each exemplar.
fn fuzzy_partition(distances: &[Vec<f64>], k: usize, fuzziness: f64) -> Matrix {
    let exponent = 2.0 / (fuzziness - 1.0);
    let mut p = Matrix::zeros(distances.len(), k);
    for (g, row) in distances.iter().enumerate() {
        let d: Vec<f64> = row
            .iter()
            .map(|x| if *x == 0.0 { MIN_FUZZY_DISTANCE } else { *x })
            .collect();
        let inverse_sum: f64 = d.iter().map(|x| x.powf(-exponent)).sum();
        for (c, dc) in d.iter().enumerate() {
            p[(g, c)] = 1.0 / (dc.powf(exponent) * inverse_sum);
        }
    }
    p
}
