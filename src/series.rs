//! Annual time series and the named set of series that make up a scenario.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClusterError;

/// Days in a (non-leap) simulation year.
pub const DAYS_PER_YEAR: usize = 365;
/// Hours in a day.
pub const HOURS_PER_DAY: usize = 24;
/// Hours in a simulation year.
pub const HOURS_PER_YEAR: usize = DAYS_PER_YEAR * HOURS_PER_DAY;
/// Day of year used for the summer daylight window.
pub const SUMMER_SOLSTICE_DAY: usize = 172;

/// One physical quantity over exactly one year.
///
/// The length is always `8760 × steps_per_hour` for some positive
/// `steps_per_hour`. Values are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    values: Vec<f64>,
    steps_per_hour: usize,
}

impl TimeSeries {
    /// Wraps a year of values, inferring the step from the length.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::SeriesLength`] unless the length is a positive
    /// multiple of 8760.
    pub fn new(values: Vec<f64>) -> Result<Self, ClusterError> {
        let len = values.len();
        if len == 0 || len % HOURS_PER_YEAR != 0 {
            return Err(ClusterError::SeriesLength { len });
        }
        Ok(Self {
            steps_per_hour: len / HOURS_PER_YEAR,
            values,
        })
    }

    /// A year holding `value` at every step.
    pub fn constant(value: f64, steps_per_hour: usize) -> Self {
        let steps_per_hour = steps_per_hour.max(1);
        Self {
            values: vec![value; HOURS_PER_YEAR * steps_per_hour],
            steps_per_hour,
        }
    }

    /// Builds a year by evaluating `f(day, step_of_day)`.
    pub fn from_fn(steps_per_hour: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let steps_per_hour = steps_per_hour.max(1);
        let ppd = steps_per_hour * HOURS_PER_DAY;
        let mut values = Vec::with_capacity(DAYS_PER_YEAR * ppd);
        for day in 0..DAYS_PER_YEAR {
            for step in 0..ppd {
                values.push(f(day, step));
            }
        }
        Self {
            values,
            steps_per_hour,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn steps_per_hour(&self) -> usize {
        self.steps_per_hour
    }

    /// Points per calendar day.
    pub fn steps_per_day(&self) -> usize {
        self.steps_per_hour * HOURS_PER_DAY
    }

    /// Values of calendar day `day` (0-based).
    ///
    /// # Panics
    ///
    /// Panics if `day >= 365`.
    pub fn day(&self, day: usize) -> &[f64] {
        let ppd = self.steps_per_day();
        &self.values[day * ppd..(day + 1) * ppd]
    }

    /// Largest value, or `f64::NEG_INFINITY` for an empty series.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Physical quantity carried by a scenario series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    /// Direct normal irradiance (W/m²). Required.
    Dni,
    /// Clear-sky direct normal irradiance (W/m²).
    #[serde(rename = "clearsky")]
    ClearSky,
    /// Dry-bulb temperature (°C).
    Tdry,
    /// Wind speed (m/s).
    Wspd,
    /// Electricity price multiplier.
    Price,
    /// Plant availability fraction.
    Availability,
}

impl SeriesKind {
    pub const ALL: [SeriesKind; 6] = [
        Self::Dni,
        Self::ClearSky,
        Self::Tdry,
        Self::Wspd,
        Self::Price,
        Self::Availability,
    ];

    /// Canonical lower-case name, used as CSV header and simulator input key.
    pub fn name(self) -> &'static str {
        match self {
            Self::Dni => "dni",
            Self::ClearSky => "clearsky",
            Self::Tdry => "tdry",
            Self::Wspd => "wspd",
            Self::Price => "price",
            Self::Availability => "availability",
        }
    }

    /// Parses a column header, accepting the common weather-file spellings.
    pub fn from_header(header: &str) -> Option<Self> {
        match header.trim().to_ascii_lowercase().as_str() {
            "dni" | "beam" => Some(Self::Dni),
            "clearsky" | "clear_sky" | "clearsky_dni" => Some(Self::ClearSky),
            "tdry" | "temperature" | "temp" => Some(Self::Tdry),
            "wspd" | "wind_speed" | "windspeed" => Some(Self::Wspd),
            "price" | "ppa" | "tod_factor" => Some(Self::Price),
            "availability" | "sfavail" => Some(Self::Availability),
            _ => None,
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named annual series of one scenario.
///
/// Series are stored as supplied; lengths are reconciled against the
/// irradiance series during feature extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSeries {
    series: BTreeMap<SeriesKind, TimeSeries>,
}

impl ScenarioSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, kind: SeriesKind, series: TimeSeries) -> Self {
        self.series.insert(kind, series);
        self
    }

    pub fn insert(&mut self, kind: SeriesKind, series: TimeSeries) -> Option<TimeSeries> {
        self.series.insert(kind, series)
    }

    pub fn get(&self, kind: SeriesKind) -> Option<&TimeSeries> {
        self.series.get(&kind)
    }

    /// The irradiance series, which fixes the scenario year and step.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::MissingIrradiance`] if no irradiance was supplied.
    pub fn irradiance(&self) -> Result<&TimeSeries, ClusterError> {
        self.get(SeriesKind::Dni).ok_or(ClusterError::MissingIrradiance)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SeriesKind, &TimeSeries)> {
        self.series.iter().map(|(k, s)| (*k, s))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_whole_years() {
        let ts = TimeSeries::new(vec![0.0; HOURS_PER_YEAR * 2]).unwrap();
        assert_eq!(ts.steps_per_hour(), 2);
        assert_eq!(ts.steps_per_day(), 48);
    }

    #[test]
    fn new_rejects_partial_years() {
        assert!(matches!(
            TimeSeries::new(vec![0.0; 100]),
            Err(ClusterError::SeriesLength { len: 100 })
        ));
        assert!(TimeSeries::new(Vec::new()).is_err());
    }

    #[test]
    fn day_slices_calendar_days() {
        let ts = TimeSeries::from_fn(1, |day, _| day as f64);
        assert_eq!(ts.day(0), &[0.0; 24][..]);
        assert_eq!(ts.day(364)[23], 364.0);
        assert_eq!(ts.max(), 364.0);
    }

    #[test]
    fn header_aliases() {
        assert_eq!(SeriesKind::from_header(" DNI "), Some(SeriesKind::Dni));
        assert_eq!(SeriesKind::from_header("Tdry"), Some(SeriesKind::Tdry));
        assert_eq!(SeriesKind::from_header("sfavail"), Some(SeriesKind::Availability));
        assert_eq!(SeriesKind::from_header("hour"), None);
    }

    #[test]
    fn scenario_requires_irradiance() {
        let s = ScenarioSeries::new().with(SeriesKind::Price, TimeSeries::constant(1.0, 1));
        assert!(matches!(s.irradiance(), Err(ClusterError::MissingIrradiance)));
    }
}
