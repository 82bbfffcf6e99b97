//! Post-hoc accuracy report comparing a reconstructed year to a reference.

use std::fmt;

use crate::sim::driver::ClusterPlan;

/// Summary of one clustering plan and the error of a reconstructed array.
///
/// The reference is usually a full-year simulation of the same output; any
/// array of the same length works.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionReport {
    pub clusters: usize,
    pub groups: usize,
    /// Number of simulator calls.
    pub simulations: usize,
    /// Calendar days covered by any simulation window.
    pub simulated_days: usize,
    /// Share of the year that was simulated.
    pub simulated_fraction: f64,
    /// Within-cluster sum of squares of the features.
    pub wcss: f64,
    /// Root-mean-square error per point.
    pub rmse: f64,
    /// Mean absolute error per point.
    pub mae: f64,
    pub reference_total: f64,
    pub reconstructed_total: f64,
    /// Error of the annual total relative to the reference (percent).
    pub relative_error_pct: f64,
}

impl ReconstructionReport {
    /// Computes the report for `plan` from a reference and a reconstructed array.
    ///
    /// Only the common prefix is compared when the lengths differ.
    pub fn from_arrays(plan: &ClusterPlan, reference: &[f64], reconstructed: &[f64]) -> Self {
        let simulated_days = plan.simulated_days().iter().filter(|d| **d).count();
        let assignment = plan.assignment();

        let n = reference.len().min(reconstructed.len());
        let mut sq_sum = 0.0;
        let mut abs_sum = 0.0;
        for (r, c) in reference.iter().zip(reconstructed) {
            let err = c - r;
            sq_sum += err * err;
            abs_sum += err.abs();
        }
        let (rmse, mae) = if n > 0 {
            ((sq_sum / n as f64).sqrt(), abs_sum / n as f64)
        } else {
            (0.0, 0.0)
        };

        let reference_total: f64 = reference.iter().sum();
        let reconstructed_total: f64 = reconstructed.iter().sum();
        let relative_error_pct = if reference_total != 0.0 {
            100.0 * (reconstructed_total - reference_total) / reference_total
        } else {
            0.0
        };

        Self {
            clusters: assignment.num_clusters(),
            groups: assignment.num_groups(),
            simulations: plan.groups().len(),
            simulated_days,
            simulated_fraction: simulated_days as f64 / crate::series::DAYS_PER_YEAR as f64,
            wcss: assignment.wcss(),
            rmse,
            mae,
            reference_total,
            reconstructed_total,
            relative_error_pct,
        }
    }
}

impl fmt::Display for ReconstructionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Reconstruction Report ---")?;
        writeln!(f, "Clusters:              {} of {} groups", self.clusters, self.groups)?;
        writeln!(
            f,
            "Simulations:           {} ({} days, {:.1}% of year)",
            self.simulations,
            self.simulated_days,
            100.0 * self.simulated_fraction
        )?;
        writeln!(f, "Feature WCSS:          {:.4}", self.wcss)?;
        writeln!(f, "RMSE:                  {:.4}", self.rmse)?;
        writeln!(f, "MAE:                   {:.4}", self.mae)?;
        writeln!(
            f,
            "Annual total:          {:.2} (reference {:.2})",
            self.reconstructed_total, self.reference_total
        )?;
        write!(f, "Total error:           {:.3}%", self.relative_error_pct)
    }
}
