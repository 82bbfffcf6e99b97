//! Synthetic weather and price year for demos and tests.
//!
//! Clear-sky irradiance follows a seasonal half-sine between sunrise and
//! sunset. Direct normal irradiance scales it by a daily cloud multiplier
//! evolving as an AR(1) process:
//! ```text
//! m(d) = alpha * m(d-1) + (1 - alpha) * (CLEAR_MEAN + epsilon(d))
//! ```
//! clamped to \[0, 1\]. Generation is deterministic for a given seed.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;

use crate::config::SyntheticConfig;
use crate::series::{
    DAYS_PER_YEAR, HOURS_PER_DAY, SUMMER_SOLSTICE_DAY, ScenarioSeries, SeriesKind, TimeSeries,
};

/// Long-run mean of the cloud multiplier before clamping.
const CLEAR_MEAN: f64 = 0.85;
/// Day length at the solstices is 12 h plus or minus this many hours.
const DAY_LENGTH_SWING_H: f64 = 3.5;
/// Winter clear-sky peak as a fraction of the summer peak.
const WINTER_PEAK_FRACTION: f64 = 0.7;
const MEAN_TEMPERATURE_C: f64 = 16.0;
const SEASONAL_TEMPERATURE_SWING_C: f64 = 9.0;
const DIURNAL_TEMPERATURE_SWING_C: f64 = 5.0;
/// Time-of-delivery price factors.
const PRICE_NIGHT: f64 = 0.8;
const PRICE_DAY: f64 = 1.0;
const PRICE_PEAK: f64 = 1.6;

/// Samples zero-mean Gaussian noise with the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std_dev
}

/// Seasonal phase: 1 at the summer solstice, -1 half a year away.
fn season(day: usize) -> f64 {
    (2.0 * PI * (day as f64 - SUMMER_SOLSTICE_DAY as f64) / DAYS_PER_YEAR as f64).cos()
}

/// Clear-sky irradiance at `hour` (fractional) of `day`.
fn clear_sky(peak: f64, day: usize, hour: f64) -> f64 {
    let s = season(day);
    let length = 12.0 + DAY_LENGTH_SWING_H * s;
    let sunrise = 12.0 - length / 2.0;
    if hour <= sunrise || hour >= sunrise + length {
        return 0.0;
    }
    let scale = WINTER_PEAK_FRACTION + (1.0 - WINTER_PEAK_FRACTION) * (1.0 + s) / 2.0;
    peak * scale * (PI * (hour - sunrise) / length).sin()
}

fn price_factor(hour: f64) -> f64 {
    match hour as usize {
        0..6 => PRICE_NIGHT,
        15..20 => PRICE_PEAK,
        _ => PRICE_DAY,
    }
}

/// Generates one year of dni, clear-sky, temperature, wind speed and price.
pub fn generate(config: &SyntheticConfig) -> ScenarioSeries {
    let sph = config.steps_per_hour.max(1);
    let steps_per_day = sph * HOURS_PER_DAY;
    let alpha = config.cloud_alpha.clamp(0.0, 1.0);
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut clearsky = Vec::with_capacity(DAYS_PER_YEAR * steps_per_day);
    let mut dni = Vec::with_capacity(DAYS_PER_YEAR * steps_per_day);
    let mut tdry = Vec::with_capacity(DAYS_PER_YEAR * steps_per_day);
    let mut wspd = Vec::with_capacity(DAYS_PER_YEAR * steps_per_day);
    let mut price = Vec::with_capacity(DAYS_PER_YEAR * steps_per_day);

    let mut multiplier = 1.0;
    for day in 0..DAYS_PER_YEAR {
        let epsilon = gaussian_noise(&mut rng, config.cloud_noise_std);
        multiplier = (alpha * multiplier + (1.0 - alpha) * (CLEAR_MEAN + epsilon)).clamp(0.0, 1.0);
        let daily_temperature = MEAN_TEMPERATURE_C
            + SEASONAL_TEMPERATURE_SWING_C * season(day)
            + gaussian_noise(&mut rng, 1.5);
        let daily_wind = (config.mean_wind_speed + gaussian_noise(&mut rng, 1.0)).max(0.0);

        for step in 0..steps_per_day {
            let hour = (step as f64 + 0.5) / sph as f64;
            let clear = clear_sky(config.peak_dni, day, hour);
            clearsky.push(clear);
            dni.push(clear * multiplier);
            tdry.push(
                daily_temperature
                    - DIURNAL_TEMPERATURE_SWING_C * (2.0 * PI * (hour - 3.0) / 24.0).cos(),
            );
            let gust = gaussian_noise(&mut rng, 0.5);
            wspd.push((daily_wind * (1.0 + 0.3 * (2.0 * PI * (hour - 15.0) / 24.0).cos()) + gust).max(0.0));
            price.push(price_factor(hour));
        }
    }

    info!(seed = config.seed, steps_per_hour = sph, "synthetic year generated");
    let series = |values: Vec<f64>| {
        TimeSeries::from_fn(sph, |day, step| values[day * steps_per_day + step])
    };
    ScenarioSeries::new()
        .with(SeriesKind::Dni, series(dni))
        .with(SeriesKind::ClearSky, series(clearsky))
        .with(SeriesKind::Tdry, series(tdry))
        .with(SeriesKind::Wspd, series(wspd))
        .with(SeriesKind::Price, series(price))
}
