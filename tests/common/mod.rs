//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use cluster_sim::config::{ScenarioConfig, SyntheticConfig};
use cluster_sim::series::{ScenarioSeries, SeriesKind, TimeSeries};
use cluster_sim::sim::{NamedArrays, SimulationRequest};
use cluster_sim::synthetic;

/// Baseline scenario with a single affinity propagation run (no bisection).
pub fn single_run_config() -> ScenarioConfig {
    let mut config = ScenarioConfig::baseline();
    config.clustering.enforce_cluster_count = false;
    config
}

/// Default synthetic weather year (seed 42, hourly).
pub fn synthetic_year() -> ScenarioSeries {
    synthetic::generate(&SyntheticConfig::default())
}

/// Year alternating between clear and overcast 30-day blocks, with a small
/// weekly ripple inside each block.
pub fn two_regime_year() -> ScenarioSeries {
    let daylight = |h: usize| (7..19).contains(&h);
    ScenarioSeries::new()
        .with(
            SeriesKind::Dni,
            TimeSeries::from_fn(1, |d, h| match (daylight(h), (d / 30) % 2) {
                (false, _) => 0.0,
                (true, 0) => 850.0 + 5.0 * (d % 7) as f64,
                (true, _) => 150.0 + 4.0 * (d % 5) as f64,
            }),
        )
        .with(
            SeriesKind::ClearSky,
            TimeSeries::from_fn(1, |_, h| if daylight(h) { 900.0 } else { 0.0 }),
        )
        .with(SeriesKind::Price, TimeSeries::constant(1.0, 1))
}

/// Returns the averaged inputs of each window unchanged.
pub fn pass_through(request: &SimulationRequest) -> Result<NamedArrays, String> {
    Ok(request.inputs.clone())
}

/// Returns a single `"value"` output holding `value` at every step.
pub fn constant_output(value: f64) -> impl Fn(&SimulationRequest) -> Result<NamedArrays, String> + Sync {
    move |request: &SimulationRequest| {
        let len = request.group.total_days() * 24 * request.steps_per_hour;
        Ok(NamedArrays::from([("value".to_string(), vec![value; len])]))
    }
}

/// Returns a `"day"` output holding the calendar day index of every step.
pub fn calendar_day_output(request: &SimulationRequest) -> Result<NamedArrays, String> {
    let first = request.group.start_day as f64 - request.group.num_previous_days as f64;
    let ppd = 24 * request.steps_per_hour;
    let values = (0..request.group.total_days() * ppd)
        .map(|i| first + (i / ppd) as f64)
        .collect();
    Ok(NamedArrays::from([("day".to_string(), values)]))
}
