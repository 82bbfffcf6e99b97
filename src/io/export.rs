//! CSV export of reconstructed annual arrays and cluster summaries.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::error::ClusterError;
use crate::sim::driver::{ClusterPlan, NamedArrays};

/// Column header of the cluster summary export.
const SUMMARY_HEADER: &str = "cluster,exemplar,start_day,members,weight,adjusted_weight";

/// Exports annual arrays to a CSV file at the given path.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_annual_csv(annual: &NamedArrays, steps_per_hour: usize, path: &Path) -> Result<(), ClusterError> {
    let file = File::create(path)?;
    write_annual_csv(annual, steps_per_hour, io::BufWriter::new(file))
}

/// Writes annual arrays as CSV: an `hour` column followed by one column per
/// array, in name order.
///
/// Shorter arrays leave their trailing cells empty.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_annual_csv(annual: &NamedArrays, steps_per_hour: usize, writer: impl Write) -> Result<(), ClusterError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    let step_hours = 1.0 / steps_per_hour.max(1) as f64;

    let mut header = vec!["hour".to_string()];
    header.extend(annual.keys().cloned());
    wtr.write_record(&header)?;

    let rows = annual.values().map(Vec::len).max().unwrap_or(0);
    for i in 0..rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(format!("{:.2}", i as f64 * step_hours));
        for values in annual.values() {
            record.push(values.get(i).map_or_else(String::new, |v| format!("{v:.6}")));
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports the cluster summary of `plan` to a CSV file at the given path.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_cluster_summary_csv(plan: &ClusterPlan, path: &Path) -> Result<(), ClusterError> {
    let file = File::create(path)?;
    write_cluster_summary_csv(plan, io::BufWriter::new(file))
}

/// Writes one row per cluster: exemplar group, first counted day, member
/// count, raw weight and boundary-adjusted weight.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_cluster_summary_csv(plan: &ClusterPlan, writer: impl Write) -> Result<(), ClusterError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(SUMMARY_HEADER.split(','))?;

    let assignment = plan.assignment();
    let raw = assignment.raw_weights();
    let starts = plan.exemplar_start_days();
    for (k, exemplar) in assignment.exemplars().iter().enumerate() {
        wtr.write_record(&[
            k.to_string(),
            exemplar.to_string(),
            starts[k].to_string(),
            assignment.counts()[k].to_string(),
            format!("{:.6}", raw[k]),
            format!("{:.6}", plan.weights()[k]),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
