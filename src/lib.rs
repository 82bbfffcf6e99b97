//! Representative-period clustering for annual solar plant simulations.
//!
//! The year is cut into candidate groups of consecutive days, each summarised
//! by a feature vector. Affinity propagation picks exemplar groups; only their
//! windows are simulated, and the weighted exemplar results are spread back
//! over the calendar to rebuild the full annual arrays.

pub mod cluster;
pub mod config;
pub mod error;
/// Per-group feature vectors.
pub mod features;
pub mod io;
pub mod series;
/// Simulation windows, input averaging, driving and reconstruction.
pub mod sim;
pub mod synthetic;

pub use cluster::{ClusterAssignment, form_clusters};
pub use config::ScenarioConfig;
pub use error::{ClusterError, Diagnostic};
pub use features::{FeatureExtractor, FeatureMatrix, Metric};
pub use series::{ScenarioSeries, SeriesKind, TimeSeries};
pub use sim::{ClusterPlan, DriveOutcome, NamedArrays, SimulationRequest, Simulator};
