/// Calendar arithmetic for candidate groups and simulation windows.
pub mod layout;
pub mod boundary;
/// Cluster-average input profiles.
pub mod averager;
pub mod merge;
/// Full-year reconstruction from exemplar results.
pub mod reconstruct;
pub mod driver;
pub mod report;

pub use averager::PeriodAverager;
pub use boundary::{BoundaryCorrection, BoundaryWeightAdjuster};
pub use driver::{ClusterPlan, DriveOutcome, NamedArrays, SimulationRequest, Simulator};
pub use layout::DayLayout;
pub use merge::{ExemplarMerger, MergedGroup, SimulationGroup};
pub use reconstruct::AnnualReconstructor;
pub use report::ReconstructionReport;
