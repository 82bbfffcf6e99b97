//! Clustering plan for one scenario and the loop that drives a simulator
//! over its exemplar windows.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::cluster::matrix::squared_distance;
use crate::cluster::{self, ClusterAssignment, Matrix};
use crate::config::ScenarioConfig;
use crate::error::{ClusterError, Diagnostic};
use crate::features::{FeatureExtractor, FeatureMatrix};
use crate::series::ScenarioSeries;
use crate::sim::averager::PeriodAverager;
use crate::sim::boundary::{BoundaryCorrection, BoundaryWeightAdjuster};
use crate::sim::layout::DayLayout;
use crate::sim::merge::{ExemplarMerger, MergedGroup, SimulationGroup};
use crate::sim::reconstruct::AnnualReconstructor;

/// Arrays keyed by quantity name.
pub type NamedArrays = BTreeMap<String, Vec<f64>>;

/// Everything a simulator needs to run one window.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRequest {
    pub group: SimulationGroup,
    /// Clusters covered by the window, in calendar order.
    pub clusters: Vec<usize>,
    /// Cluster-average inputs over the whole window, keyed by series name.
    pub inputs: NamedArrays,
    pub steps_per_hour: usize,
}

/// Runs the physical simulation of one window.
///
/// Implementations return one array per output quantity, covering the whole
/// window (`group.total_days()` days). Closures of the form
/// `|request: &SimulationRequest| -> Result<NamedArrays, E>` implement it.
pub trait Simulator {
    type Error: fmt::Display;

    /// Simulates the window described by `request`.
    ///
    /// # Errors
    ///
    /// Any failure; the group's clusters are then substituted.
    fn simulate(&self, request: &SimulationRequest) -> Result<NamedArrays, Self::Error>;
}

impl<F, E> Simulator for F
where
    F: Fn(&SimulationRequest) -> Result<NamedArrays, E>,
    E: fmt::Display,
{
    type Error = E;

    fn simulate(&self, request: &SimulationRequest) -> Result<NamedArrays, E> {
        self(request)
    }
}

/// Reconstructed results of driving a simulator over a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveOutcome {
    /// Full-year array per output quantity.
    pub annual: NamedArrays,
    /// Counted-day results per output quantity and cluster.
    pub cluster_results: BTreeMap<String, Vec<Vec<f64>>>,
    /// Conditions raised while simulating and reconstructing.
    pub diagnostics: Vec<Diagnostic>,
}

/// Clustering of one scenario, ready to drive simulations.
///
/// Built once per scenario; [`ClusterPlan::drive`] can then be called for
/// every plant design to evaluate.
#[derive(Debug, Clone)]
pub struct ClusterPlan {
    layout: DayLayout,
    features: FeatureMatrix,
    assignment: ClusterAssignment,
    boundary: BoundaryCorrection,
    groups: Vec<MergedGroup>,
    cluster_inputs: BTreeMap<String, Vec<Vec<f64>>>,
    diagnostics: Vec<Diagnostic>,
}

impl ClusterPlan {
    /// Extracts features, clusters them and prepares the simulation windows.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the irradiance
    /// series is missing, or no feature can be computed.
    pub fn build(config: &ScenarioConfig, inputs: &ScenarioSeries) -> Result<Self, ClusterError> {
        check_config(config)?;
        let mut diagnostics = Vec::new();
        let features = FeatureExtractor::new(&config.features, config.days.days_per_group)
            .extract(inputs, &mut diagnostics)?;
        let assignment = cluster::form_clusters(features.rows(), &config.clustering, &mut diagnostics)?;
        Self::assemble(config, inputs, features, assignment, diagnostics)
    }

    /// Prepares the simulation windows from cached features and clusters.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the cached
    /// artifacts do not match the configured layout.
    pub fn from_parts(
        config: &ScenarioConfig,
        inputs: &ScenarioSeries,
        features: FeatureMatrix,
        assignment: ClusterAssignment,
    ) -> Result<Self, ClusterError> {
        check_config(config)?;
        if features.days_per_group() != config.days.days_per_group {
            return Err(ClusterError::LengthMismatch {
                what: "feature matrix days per group".to_string(),
                expected: config.days.days_per_group,
                actual: features.days_per_group(),
            });
        }
        Self::assemble(config, inputs, features, assignment, Vec::new())
    }

    fn assemble(
        config: &ScenarioConfig,
        inputs: &ScenarioSeries,
        features: FeatureMatrix,
        assignment: ClusterAssignment,
        mut diagnostics: Vec<Diagnostic>,
    ) -> Result<Self, ClusterError> {
        let layout = config.layout(inputs.irradiance()?.steps_per_hour());
        if assignment.num_groups() != layout.num_groups() {
            return Err(ClusterError::LengthMismatch {
                what: "cluster assignment groups".to_string(),
                expected: layout.num_groups(),
                actual: assignment.num_groups(),
            });
        }
        if assignment.partition().ncols() != assignment.num_clusters() {
            return Err(ClusterError::LengthMismatch {
                what: "cluster partition columns".to_string(),
                expected: assignment.num_clusters(),
                actual: assignment.partition().ncols(),
            });
        }
        if assignment.means().len() != assignment.num_clusters() {
            return Err(ClusterError::LengthMismatch {
                what: "cluster means".to_string(),
                expected: assignment.num_clusters(),
                actual: assignment.means().len(),
            });
        }

        let boundary = if config.days.adjust_boundary_weights {
            BoundaryWeightAdjuster.adjust(&features, &assignment, &mut diagnostics)
        } else {
            BoundaryCorrection::passthrough(&assignment)
        };

        let averager = PeriodAverager::new(layout, &assignment, Some(&boundary));
        let mut cluster_inputs = BTreeMap::new();
        for (kind, series) in inputs.iter() {
            if series.len() == layout.year_len() {
                cluster_inputs.insert(kind.name().to_string(), averager.average(series.values())?);
            } else {
                debug!(series = %kind, "length differs from irradiance; not averaged");
            }
        }

        let starts = assignment.exemplar_start_days(layout.days_per_group);
        let groups = ExemplarMerger::new(layout, config.days.combine_consecutive).merge(
            &starts,
            &boundary.weights,
            &mut diagnostics,
        );

        info!(
            clusters = assignment.num_clusters(),
            simulations = groups.len(),
            simulated_days = groups.iter().map(|g| g.group.total_days()).sum::<usize>(),
            warnings = diagnostics.len(),
            "cluster plan ready"
        );
        Ok(Self {
            layout,
            features,
            assignment,
            boundary,
            groups,
            cluster_inputs,
            diagnostics,
        })
    }

    pub fn layout(&self) -> &DayLayout {
        &self.layout
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn assignment(&self) -> &ClusterAssignment {
        &self.assignment
    }

    pub fn boundary(&self) -> &BoundaryCorrection {
        &self.boundary
    }

    /// Simulation windows with the clusters each one covers.
    pub fn groups(&self) -> &[MergedGroup] {
        &self.groups
    }

    pub fn simulation_groups(&self) -> Vec<SimulationGroup> {
        self.groups.iter().map(|g| g.group).collect()
    }

    /// First counted day of each cluster's exemplar.
    pub fn exemplar_start_days(&self) -> Vec<usize> {
        self.assignment.exemplar_start_days(self.layout.days_per_group)
    }

    /// Cluster weights, boundary-adjusted when enabled.
    pub fn weights(&self) -> &[f64] {
        &self.boundary.weights
    }

    pub fn partition(&self) -> &Matrix {
        self.assignment.partition()
    }

    /// Cluster-average windows of every input series, keyed by series name.
    pub fn cluster_inputs(&self) -> &BTreeMap<String, Vec<Vec<f64>>> {
        &self.cluster_inputs
    }

    /// Conditions raised while building the plan.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Calendar days touched by any exemplar simulation.
    pub fn simulated_days(&self) -> Vec<bool> {
        self.layout.simulated_days(&self.exemplar_start_days())
    }

    pub fn averager(&self) -> PeriodAverager<'_> {
        PeriodAverager::new(self.layout, &self.assignment, Some(&self.boundary))
    }

    pub fn reconstructor(&self) -> AnnualReconstructor<'_> {
        AnnualReconstructor::new(self.layout, &self.assignment, Some(&self.boundary))
    }

    /// Per-day irradiance scaling factors of this plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the features carry no daily irradiance.
    pub fn irradiance_scaling_factors(&self) -> Result<Vec<f64>, ClusterError> {
        self.reconstructor()
            .irradiance_scaling_factors(self.features.daily_irradiance())
    }

    /// Request for simulation window `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn request(&self, index: usize) -> SimulationRequest {
        let merged = &self.groups[index];
        let merger = self.merger();
        SimulationRequest {
            group: merged.group,
            clusters: merged.clusters.clone(),
            inputs: self
                .cluster_inputs
                .iter()
                .map(|(name, averages)| (name.clone(), merger.merged_inputs(merged, averages)))
                .collect(),
            steps_per_hour: self.layout.steps_per_day / crate::series::HOURS_PER_DAY,
        }
    }

    fn merger(&self) -> ExemplarMerger {
        ExemplarMerger::new(self.layout, true)
    }

    /// Simulates every window in order and reconstructs each output quantity.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::AllSimulationsFailed`] if no window could be
    /// simulated.
    pub fn drive<S: Simulator>(&self, simulator: &S) -> Result<DriveOutcome, ClusterError> {
        let results = (0..self.groups.len())
            .map(|i| self.run_group(simulator, i))
            .collect();
        self.collect(results)
    }

    /// Like [`ClusterPlan::drive`], spreading windows over a pool of
    /// `workers` threads.
    ///
    /// Results are identical to the sequential run. A simulator that panics
    /// fails only the window it was simulating.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::AllSimulationsFailed`] if no window could be
    /// simulated, or [`ClusterError::WorkerPool`] if the pool cannot start.
    pub fn drive_parallel<S>(&self, simulator: &S, workers: usize) -> Result<DriveOutcome, ClusterError>
    where
        S: Simulator + Sync,
    {
        let n = self.groups.len();
        let workers = workers.clamp(1, n.max(1));
        if workers == 1 {
            return self.drive(simulator);
        }
        let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
        let results = pool.install(|| {
            (0..n)
                .into_par_iter()
                .map(|i| {
                    panic::catch_unwind(AssertUnwindSafe(|| self.run_group(simulator, i)))
                        .unwrap_or_else(|_| Err("simulation panicked".to_string()))
                })
                .collect()
        });
        self.collect(results)
    }

    fn run_group<S: Simulator>(&self, simulator: &S, index: usize) -> Result<NamedArrays, String> {
        let request = self.request(index);
        debug!(
            start_day = request.group.start_day,
            days = request.group.total_days(),
            clusters = request.clusters.len(),
            "simulating window"
        );
        let outputs = simulator.simulate(&request).map_err(|e| e.to_string())?;
        if outputs.is_empty() {
            return Err("simulator returned no outputs".to_string());
        }
        let expected = request.group.total_days() * self.layout.steps_per_day;
        for (name, values) in &outputs {
            if values.len() != expected {
                return Err(format!(
                    "output \"{name}\" has {} points, expected {expected}",
                    values.len()
                ));
            }
        }
        Ok(outputs)
    }

    fn collect(&self, results: Vec<Result<NamedArrays, String>>) -> Result<DriveOutcome, ClusterError> {
        let Some(names) = results
            .iter()
            .find_map(|r| r.as_ref().ok())
            .map(|outputs| outputs.keys().cloned().collect::<Vec<_>>())
        else {
            return Err(ClusterError::AllSimulationsFailed {
                groups: results.len(),
                last_error: results
                    .iter()
                    .rev()
                    .find_map(|r| r.as_ref().err())
                    .cloned()
                    .unwrap_or_default(),
            });
        };

        let clusters = self.assignment.num_clusters();
        let merger = self.merger();
        let mut per_cluster: BTreeMap<String, Vec<Option<Vec<f64>>>> = names
            .iter()
            .map(|name| (name.clone(), vec![None; clusters]))
            .collect();
        let mut failures = Vec::new();
        for (merged, result) in self.groups.iter().zip(results) {
            let outputs = result.and_then(|outputs| {
                match names.iter().find(|name| !outputs.contains_key(*name)) {
                    Some(missing) => Err(format!("missing output \"{missing}\"")),
                    None => Ok(outputs),
                }
            });
            match outputs {
                Ok(outputs) => {
                    for (name, slots) in per_cluster.iter_mut() {
                        let parts = merger.split_outputs(merged, &outputs[name]);
                        for (k, part) in merged.clusters.iter().zip(parts) {
                            slots[*k] = Some(part);
                        }
                    }
                }
                Err(message) => failures.push((merged, message)),
            }
        }

        let mut diagnostics = Vec::new();
        let simulated: Vec<bool> = match per_cluster.values().next() {
            Some(slots) => slots.iter().map(Option::is_some).collect(),
            None => vec![false; clusters],
        };
        for (merged, message) in failures {
            let substitutes: Vec<usize> = merged
                .clusters
                .iter()
                .map(|k| self.nearest_simulated(*k, &simulated))
                .collect();
            for slots in per_cluster.values_mut() {
                for (k, substitute) in merged.clusters.iter().zip(&substitutes) {
                    slots[*k] = slots[*substitute].clone();
                }
            }
            Diagnostic::SimulationFailed {
                start_day: merged.group.start_day,
                message,
                clusters: merged.clusters.clone(),
                substitutes,
            }
            .report(&mut diagnostics);
        }

        let counted = self.layout.counted_len();
        let reconstructor = self.reconstructor();
        let mut annual = BTreeMap::new();
        let mut cluster_results = BTreeMap::new();
        for (i, (name, slots)) in per_cluster.into_iter().enumerate() {
            let data: Vec<Vec<f64>> = slots
                .into_iter()
                .map(|slot| slot.unwrap_or_else(|| vec![0.0; counted]))
                .collect();
            let (values, gaps) = reconstructor.rebuild(&data)?;
            // Gaps depend on the layout only, so every output has the same ones.
            if i == 0 {
                for gap in gaps {
                    gap.report(&mut diagnostics);
                }
            }
            annual.insert(name.clone(), values);
            cluster_results.insert(name, data);
        }

        info!(
            outputs = annual.len(),
            warnings = diagnostics.len(),
            "annual results reconstructed"
        );
        Ok(DriveOutcome {
            annual,
            cluster_results,
            diagnostics,
        })
    }

    /// Simulated cluster whose exemplar features are closest to cluster `k`.
    fn nearest_simulated(&self, k: usize, simulated: &[bool]) -> usize {
        let means = self.assignment.means();
        let mut best = k;
        let mut best_distance = f64::INFINITY;
        for (candidate, ok) in simulated.iter().enumerate() {
            if !ok {
                continue;
            }
            let distance = squared_distance(&means[k], &means[candidate]);
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }
        best
    }
}

fn check_config(config: &ScenarioConfig) -> Result<(), ClusterError> {
    let errors = config.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ClusterError::InvalidConfig(errors))
    }
}
