/// CSV import of named annual series.
pub mod import;
/// CSV export of reconstructed arrays and cluster summaries.
pub mod export;
#[cfg(feature = "cache")]
pub mod cache;

pub use export::{
    export_annual_csv, export_cluster_summary_csv, write_annual_csv, write_cluster_summary_csv,
};
pub use import::{read_series, read_series_csv};
