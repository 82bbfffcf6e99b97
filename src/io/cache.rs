//! JSON cache of extracted features and cluster assignments.
//!
//! Clustering a scenario is the expensive step; a cached pair can be fed to
//! [`ClusterPlan::from_parts`](crate::sim::ClusterPlan::from_parts) to drive
//! further plant designs on the same weather.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cluster::ClusterAssignment;
use crate::error::ClusterError;
use crate::features::FeatureMatrix;

/// Features and clusters of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterCache {
    pub features: FeatureMatrix,
    pub assignment: ClusterAssignment,
}

/// Writes `cache` as JSON to any writer.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_cache(cache: &ClusterCache, writer: impl Write) -> Result<(), ClusterError> {
    serde_json::to_writer(writer, cache)?;
    Ok(())
}

/// Reads a cache written by [`write_cache`].
///
/// # Errors
///
/// Returns an error if the input is not a valid cache.
pub fn read_cache(reader: impl Read) -> Result<ClusterCache, ClusterError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Saves `cache` to a JSON file at the given path.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn save_cache(cache: &ClusterCache, path: &Path) -> Result<(), ClusterError> {
    let mut buf = io::BufWriter::new(File::create(path)?);
    write_cache(cache, &mut buf)?;
    buf.flush()?;
    info!(path = %path.display(), clusters = cache.assignment.num_clusters(), "cluster cache saved");
    Ok(())
}

/// Loads a cache from a JSON file at the given path.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or parsed.
pub fn load_cache(path: &Path) -> Result<ClusterCache, ClusterError> {
    read_cache(io::BufReader::new(File::open(path)?))
}
