//! Fatal errors and non-fatal diagnostics raised by the clustering pipeline.

use std::io;

use thiserror::Error;
use tracing::warn;

use crate::config::ConfigError;
use crate::features::Metric;
use crate::series::SeriesKind;

/// Unrecoverable failure of a pipeline stage.
///
/// Degraded-but-usable situations are reported as [`Diagnostic`] values
/// instead; a `ClusterError` always means no result was produced.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A configuration value violated its constraint.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Validation reported one or more configuration errors.
    #[error("{} configuration error(s); first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    InvalidConfig(Vec<ConfigError>),

    /// A series is not a whole number of annual hourly blocks.
    #[error("series of {len} points is not a positive multiple of 8760")]
    SeriesLength {
        /// Number of points supplied.
        len: usize,
    },

    /// An array handed to a pipeline stage has the wrong length.
    #[error("{what} has {actual} points, expected {expected}")]
    LengthMismatch {
        /// Name of the array being checked.
        what: String,
        /// Expected number of points.
        expected: usize,
        /// Number of points supplied.
        actual: usize,
    },

    /// The irradiance series, which defines the scenario year, is absent.
    #[error("scenario has no irradiance series")]
    MissingIrradiance,

    /// There are no candidate groups to cluster.
    #[error("feature matrix has no candidate groups")]
    EmptyFeatures,

    /// Every simulation group failed, so nothing can be reconstructed.
    #[error("all {groups} simulation group(s) failed; last error: {last_error}")]
    AllSimulationsFailed {
        /// Number of groups attempted.
        groups: usize,
        /// Message of the last failure.
        last_error: String,
    },

    /// A CSV cell could not be parsed.
    #[error("column \"{column}\" row {row}: {message}")]
    Parse {
        /// Column header.
        column: String,
        /// 1-based data row.
        row: usize,
        /// Parser message.
        message: String,
    },

    /// Filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// CSV reader or writer failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The simulation worker pool could not be started.
    #[error("worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Cached clustering could not be read or written.
    #[cfg(feature = "cache")]
    #[error("cache error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pipeline stage that may stop short of convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStage {
    /// Affinity propagation message passing.
    AffinityPropagation,
    /// Preference-multiplier bisection for the cluster count.
    ClusterCount,
}

impl std::fmt::Display for ConvergenceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AffinityPropagation => f.write_str("affinity propagation"),
            Self::ClusterCount => f.write_str("cluster count search"),
        }
    }
}

/// Non-fatal condition. The pipeline degrades and continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Diagnostic {
    /// A supplied series does not match the irradiance length.
    #[error(
        "series \"{series}\" has {actual} points but irradiance has {expected}; weight for \"{metric}\" reset to zero"
    )]
    InputLengthMismatch {
        /// Offending series.
        series: SeriesKind,
        /// Metric that was disabled.
        metric: Metric,
        /// Irradiance length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// A weighted metric has no source series.
    #[error("series \"{series}\" was not provided; weight for \"{metric}\" reset to zero")]
    MissingSeries {
        /// Absent series.
        series: SeriesKind,
        /// Metric that was disabled.
        metric: Metric,
    },

    /// An iterative stage stopped before converging.
    #[error("{stage} did not converge: {detail}")]
    Convergence {
        /// Stage that stopped early.
        stage: ConvergenceStage,
        /// What was kept.
        detail: String,
    },

    /// A feature only defined for 2-day groups was requested otherwise.
    #[error("{feature} is only defined for 2-day groups (configured {days_per_group}); skipped")]
    UnsupportedConfiguration {
        /// Skipped feature.
        feature: &'static str,
        /// Configured days per group.
        days_per_group: usize,
    },

    /// Calendar days had no cluster data and were filled from neighbours.
    #[error(
        "days {first_day}..{end_day} had no cluster data; filled with the average of {source_days} {direction} days"
    )]
    CoverageGap {
        /// First uncovered day.
        first_day: usize,
        /// One past the last uncovered day.
        end_day: usize,
        /// Number of days averaged.
        source_days: usize,
        /// `"following"` or `"preceding"`.
        direction: &'static str,
    },

    /// The simulator failed for one group; other clusters' data stood in.
    #[error(
        "simulation starting on day {start_day} failed ({message}); clusters {clusters:?} use data from clusters {substitutes:?}"
    )]
    SimulationFailed {
        /// First counted day of the failed group.
        start_day: usize,
        /// Simulator error text.
        message: String,
        /// Clusters covered by the failed group.
        clusters: Vec<usize>,
        /// Cluster used in place of each entry of `clusters`.
        substitutes: Vec<usize>,
    },
}

impl Diagnostic {
    /// Logs the diagnostic and appends it to `sink`.
    pub(crate) fn report(self, sink: &mut Vec<Diagnostic>) {
        warn!("{self}");
        sink.push(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_appends_to_sink() {
        let mut sink = Vec::new();
        Diagnostic::UnsupportedConfiguration {
            feature: "exemplar merging",
            days_per_group: 3,
        }
        .report(&mut sink);
        assert_eq!(sink.len(), 1);
        assert!(sink[0].to_string().contains("exemplar merging"));
    }

    #[test]
    fn invalid_config_names_first_error() {
        let err = ClusterError::InvalidConfig(vec![ConfigError {
            field: "days.days_per_group".into(),
            message: "must be > 0".into(),
        }]);
        let text = err.to_string();
        assert!(text.starts_with("1 configuration error"));
        assert!(text.contains("days.days_per_group"));
    }

    #[test]
    fn coverage_gap_display() {
        let d = Diagnostic::CoverageGap {
            first_day: 0,
            end_day: 1,
            source_days: 5,
            direction: "following",
        };
        assert_eq!(
            d.to_string(),
            "days 0..1 had no cluster data; filled with the average of 5 following days"
        );
    }
}
