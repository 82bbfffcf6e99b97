//! Merging calendar-adjacent exemplars into longer simulations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Diagnostic;
use crate::sim::layout::DayLayout;

/// One physical simulation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationGroup {
    /// First counted calendar day.
    pub start_day: usize,
    pub num_days_counted: usize,
    /// Warm-up days simulated before `start_day`.
    pub num_previous_days: usize,
    /// Days simulated after the counted days.
    pub num_next_days: usize,
}

impl SimulationGroup {
    pub fn total_days(&self) -> usize {
        self.num_previous_days + self.num_days_counted + self.num_next_days
    }
}

/// A simulation window and the clusters it stands for, in calendar order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedGroup {
    pub group: SimulationGroup,
    pub clusters: Vec<usize>,
    /// Adjusted weight of each entry of `clusters`.
    pub weights: Vec<f64>,
}

/// Groups exemplars whose counted days follow each other directly.
#[derive(Debug, Clone, Copy)]
pub struct ExemplarMerger {
    layout: DayLayout,
    combine: bool,
}

impl ExemplarMerger {
    pub fn new(layout: DayLayout, combine: bool) -> Self {
        Self { layout, combine }
    }

    /// Builds the simulation groups for exemplars starting on `start_days`
    /// (ascending, one per cluster).
    ///
    /// Runs of start days exactly `days_per_group` apart share one window.
    /// Merging is only defined for 2-day groups; for other lengths an
    /// `UnsupportedConfiguration` diagnostic is recorded and every exemplar
    /// gets its own window.
    pub fn merge(
        &self,
        start_days: &[usize],
        weights: &[f64],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<MergedGroup> {
        let n = self.layout.days_per_group;
        let mut combine = self.combine;
        if combine && n != 2 {
            Diagnostic::UnsupportedConfiguration {
                feature: "exemplar merging",
                days_per_group: n,
            }
            .report(diagnostics);
            combine = false;
        }

        let mut groups: Vec<MergedGroup> = Vec::new();
        for (k, start) in start_days.iter().enumerate() {
            let weight = weights.get(k).copied().unwrap_or(0.0);
            if let Some(current) = groups.last_mut() {
                let follows = current.group.start_day + current.group.num_days_counted == *start;
                if combine && follows {
                    current.group.num_days_counted += n;
                    current.clusters.push(k);
                    current.weights.push(weight);
                    continue;
                }
            }
            groups.push(MergedGroup {
                group: SimulationGroup {
                    start_day: *start,
                    num_days_counted: n,
                    num_previous_days: self.layout.previous_days,
                    num_next_days: self.layout.next_days,
                },
                clusters: vec![k],
                weights: vec![weight],
            });
        }
        debug!(
            exemplars = start_days.len(),
            simulations = groups.len(),
            "exemplar windows merged"
        );
        groups
    }

    /// Simulation input for a merged window: the previous days of the first
    /// cluster, the counted days of every cluster, the next days of the last.
    pub fn merged_inputs(&self, merged: &MergedGroup, averages: &[Vec<f64>]) -> Vec<f64> {
        let ppd = self.layout.steps_per_day;
        let counted_start = self.layout.previous_days * ppd;
        let counted_end = counted_start + self.layout.counted_len();
        let mut input = Vec::with_capacity(merged.group.total_days() * ppd);
        if let Some(first) = merged.clusters.first() {
            input.extend_from_slice(&averages[*first][..counted_start]);
        }
        for k in &merged.clusters {
            input.extend_from_slice(&averages[*k][counted_start..counted_end]);
        }
        if let Some(last) = merged.clusters.last() {
            input.extend_from_slice(&averages[*last][counted_end..]);
        }
        input
    }

    /// Counted section of each cluster in a merged window's output.
    pub fn split_outputs(&self, merged: &MergedGroup, output: &[f64]) -> Vec<Vec<f64>> {
        let counted = self.layout.counted_len();
        let offset = self.layout.previous_days * self.layout.steps_per_day;
        (0..merged.clusters.len())
            .map(|i| output[offset + i * counted..offset + (i + 1) * counted].to_vec())
            .collect()
    }
}
