//! Per-group classification features computed from annual hourly series.
//!
//! Each candidate simulation group of `days_per_group` consecutive days
//! becomes one row of a [`FeatureMatrix`]. Columns are weighted averages of a
//! metric over sub-day divisions, for every counted day of the group or for
//! the single day before / after it.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ConfigError, FeaturesConfig};
use crate::error::{ClusterError, Diagnostic};
use crate::series::{DAYS_PER_YEAR, SUMMER_SOLSTICE_DAY, ScenarioSeries, SeriesKind};
use crate::sim::layout::MAX_GROUP_DAYS;

/// Classification metric. Declaration order is column order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Dni,
    #[serde(rename = "clearsky")]
    ClearSky,
    Price,
    DniPrev,
    DniNext,
    PricePrev,
    PriceNext,
    Tdry,
    Wspd,
    Availability,
}

/// Days a metric samples, relative to its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaySpan {
    Counted,
    Previous,
    Next,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Self::Dni,
        Self::ClearSky,
        Self::Price,
        Self::DniPrev,
        Self::DniNext,
        Self::PricePrev,
        Self::PriceNext,
        Self::Tdry,
        Self::Wspd,
        Self::Availability,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Dni => "dni",
            Self::ClearSky => "clearsky",
            Self::Price => "price",
            Self::DniPrev => "dni_prev",
            Self::DniNext => "dni_next",
            Self::PricePrev => "price_prev",
            Self::PriceNext => "price_next",
            Self::Tdry => "tdry",
            Self::Wspd => "wspd",
            Self::Availability => "availability",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Series the metric is computed from.
    pub fn source(self) -> SeriesKind {
        match self {
            Self::Dni | Self::DniPrev | Self::DniNext => SeriesKind::Dni,
            Self::ClearSky => SeriesKind::ClearSky,
            Self::Price | Self::PricePrev | Self::PriceNext => SeriesKind::Price,
            Self::Tdry => SeriesKind::Tdry,
            Self::Wspd => SeriesKind::Wspd,
            Self::Availability => SeriesKind::Availability,
        }
    }

    /// Whether the metric averages over daylight hours unless configured otherwise.
    pub fn default_daylight_only(self) -> bool {
        !matches!(
            self,
            Self::Price | Self::PricePrev | Self::PriceNext | Self::Tdry
        )
    }

    fn span(self) -> DaySpan {
        match self {
            Self::DniPrev | Self::PricePrev => DaySpan::Previous,
            Self::DniNext | Self::PriceNext => DaySpan::Next,
            _ => DaySpan::Counted,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Origin of one feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub metric: Metric,
    /// Day slot within the metric's span (0 for previous/next-day metrics).
    pub day: usize,
    /// Sub-day division index.
    pub division: usize,
}

/// Classification features of every candidate group plus the two boundary blocks.
///
/// Computed once per scenario; serializable so it can be cached across
/// simulations of different plant designs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: Vec<Vec<f64>>,
    first_days: Vec<Option<f64>>,
    last_days: Vec<Option<f64>>,
    columns: Vec<FeatureColumn>,
    days_per_group: usize,
    daily_irradiance: Vec<f64>,
}

impl FeatureMatrix {
    /// Wraps precomputed rows. Boundary rows are left undefined.
    pub fn from_rows(rows: Vec<Vec<f64>>, days_per_group: usize) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        Self {
            rows,
            first_days: vec![None; width],
            last_days: vec![None; width],
            columns: Vec::new(),
            days_per_group,
            daily_irradiance: Vec::new(),
        }
    }

    /// Replaces the boundary rows.
    pub fn with_boundaries(mut self, first_days: Vec<Option<f64>>, last_days: Vec<Option<f64>>) -> Self {
        self.first_days = first_days;
        self.last_days = last_days;
        self
    }

    /// One row per candidate group.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn num_groups(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.rows.first().map_or(self.first_days.len(), Vec::len)
    }

    /// Features of the block starting on day 0.
    pub fn first_days(&self) -> &[Option<f64>] {
        &self.first_days
    }

    /// Features of the block ending on day 364.
    pub fn last_days(&self) -> &[Option<f64>] {
        &self.last_days
    }

    /// Column metadata; empty when built with [`FeatureMatrix::from_rows`].
    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn days_per_group(&self) -> usize {
        self.days_per_group
    }

    /// Daily irradiation (Wh/m² per day) after wind stow, before normalization.
    pub fn daily_irradiance(&self) -> &[f64] {
        &self.daily_irradiance
    }
}

/// Computes a [`FeatureMatrix`] from scenario series.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor<'a> {
    config: &'a FeaturesConfig,
    days_per_group: usize,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(config: &'a FeaturesConfig, days_per_group: usize) -> Self {
        Self {
            config,
            days_per_group,
        }
    }

    /// Extracts the features of every candidate group.
    ///
    /// Metrics whose source series is missing or has a different length than
    /// the irradiance are disabled and reported through `diagnostics`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no irradiance series, `days_per_group` is
    /// outside `[1, 363]`, or every metric ends up disabled.
    pub fn extract(
        &self,
        inputs: &ScenarioSeries,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<FeatureMatrix, ClusterError> {
        let n = self.days_per_group;
        if n == 0 || n > MAX_GROUP_DAYS {
            return Err(ConfigError::new(
                "days.days_per_group",
                format!("must be in [1, {MAX_GROUP_DAYS}]"),
            )
            .into());
        }

        let irradiance = inputs.irradiance()?;
        let npts = irradiance.len();
        let ppd = irradiance.steps_per_day();
        let mut dni = irradiance.values().to_vec();

        let mut weights: BTreeMap<Metric, f64> = Metric::ALL
            .iter()
            .map(|m| (*m, self.config.weight(*m)))
            .collect();
        let mut others: BTreeMap<SeriesKind, Vec<f64>> = BTreeMap::new();
        for kind in SeriesKind::ALL.into_iter().filter(|k| *k != SeriesKind::Dni) {
            let supplied = inputs.get(kind);
            if let Some(series) = supplied.filter(|s| s.len() == npts) {
                others.insert(kind, series.values().to_vec());
                continue;
            }
            for metric in Metric::ALL.into_iter().filter(|m| m.source() == kind) {
                let Some(weight) = weights.get_mut(&metric) else {
                    continue;
                };
                if *weight <= 0.0 {
                    continue;
                }
                *weight = 0.0;
                let diagnostic = match supplied {
                    Some(series) => Diagnostic::InputLengthMismatch {
                        series: kind,
                        metric,
                        expected: npts,
                        actual: series.len(),
                    },
                    None => Diagnostic::MissingSeries {
                        series: kind,
                        metric,
                    },
                };
                diagnostic.report(diagnostics);
            }
        }

        let enabled: Vec<Metric> = Metric::ALL
            .into_iter()
            .filter(|m| weights.get(m).copied().unwrap_or(0.0) > 0.0)
            .collect();
        if enabled.is_empty() {
            return Err(ConfigError::new(
                "features.weights",
                "no metric with a positive weight has a usable series",
            )
            .into());
        }

        let daylight = others
            .get(&SeriesKind::ClearSky)
            .and_then(|cs| summer_daylight_window(cs, ppd))
            .or_else(|| summer_daylight_window(&dni, ppd))
            .unwrap_or(0..ppd);
        debug!(start = daylight.start, end = daylight.end, "summer daylight window");

        if let Some(limit) = self.config.wind_stow_limit {
            match others.get(&SeriesKind::Wspd) {
                Some(wspd) => {
                    for (value, wind) in dni.iter_mut().zip(wspd) {
                        if *wind > limit {
                            *value = 0.0;
                        }
                    }
                }
                None => debug!("wind stow limit set without a wind speed series; skipped"),
            }
        }

        let steps_per_hour = irradiance.steps_per_hour() as f64;
        let daily_irradiance: Vec<f64> = dni
            .chunks(ppd)
            .map(|day| day.iter().sum::<f64>() / steps_per_hour)
            .collect();

        if self.config.normalize {
            let dni_max = series_max(&dni);
            for (kind, values) in others.iter_mut() {
                let scale = if *kind == SeriesKind::ClearSky {
                    dni_max
                } else {
                    series_max(values)
                };
                if scale > 0.0 {
                    values.iter_mut().for_each(|v| *v /= scale);
                }
            }
            if dni_max > 0.0 {
                dni.iter_mut().for_each(|v| *v /= dni_max);
            }
        }
        if enabled.contains(&Metric::ClearSky) {
            if let Some(clearsky) = others.get_mut(&SeriesKind::ClearSky) {
                for (cs, d) in clearsky.iter_mut().zip(&dni) {
                    *cs -= d;
                }
            }
        }

        let mut profiles: BTreeMap<Metric, Vec<Vec<f64>>> = BTreeMap::new();
        for metric in &enabled {
            let values = match metric.source() {
                SeriesKind::Dni => &dni,
                kind => match others.get(&kind) {
                    Some(values) => values,
                    None => continue,
                },
            };
            let window = if self.config.daylight_only(*metric) {
                daylight.clone()
            } else {
                0..ppd
            };
            profiles.insert(
                *metric,
                daily_profiles(values, ppd, window, self.config.divisions(*metric)),
            );
        }

        let row_for = |first_counted: isize| -> Vec<Option<f64>> {
            let mut row = Vec::new();
            for metric in &enabled {
                let (Some(profile), Some(weight)) = (profiles.get(metric), weights.get(metric)) else {
                    continue;
                };
                let divisions = self.config.divisions(*metric);
                for day in span_days(metric.span(), first_counted, n) {
                    let in_year = usize::try_from(day).ok().filter(|d| *d < DAYS_PER_YEAR);
                    for division in 0..divisions {
                        row.push(in_year.map(|d| weight * profile[d][division]));
                    }
                }
            }
            row
        };

        let mut columns = Vec::new();
        for metric in &enabled {
            let slots = if metric.span() == DaySpan::Counted { n } else { 1 };
            for day in 0..slots {
                for division in 0..self.config.divisions(*metric) {
                    columns.push(FeatureColumn {
                        metric: *metric,
                        day,
                        division,
                    });
                }
            }
        }

        let num_groups = MAX_GROUP_DAYS / n;
        let rows: Vec<Vec<f64>> = (0..num_groups)
            .map(|g| {
                row_for((g * n + 1) as isize)
                    .into_iter()
                    .map(|v| v.unwrap_or(0.0))
                    .collect()
            })
            .collect();
        let first_days = row_for(0);
        let last_days = row_for((DAYS_PER_YEAR - n) as isize);

        info!(
            groups = rows.len(),
            columns = columns.len(),
            metrics = enabled.len(),
            "extracted clustering features"
        );

        Ok(FeatureMatrix {
            rows,
            first_days,
            last_days,
            columns,
            days_per_group: n,
            daily_irradiance,
        })
    }
}

/// Calendar days a metric samples for a block whose first counted day is `first`.
fn span_days(span: DaySpan, first: isize, days_per_group: usize) -> Vec<isize> {
    match span {
        DaySpan::Counted => (0..days_per_group as isize).map(|i| first + i).collect(),
        DaySpan::Previous => vec![first - 1],
        DaySpan::Next => vec![first + days_per_group as isize],
    }
}

fn series_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// First to one-past-last positive point of the summer solstice day.
fn summer_daylight_window(values: &[f64], ppd: usize) -> Option<Range<usize>> {
    let day = values.get(SUMMER_SOLSTICE_DAY * ppd..(SUMMER_SOLSTICE_DAY + 1) * ppd)?;
    let first = day.iter().position(|v| *v > 0.0)?;
    let last = day.iter().rposition(|v| *v > 0.0)?;
    Some(first..last + 1)
}

/// Point weights of each of `divisions` equal slices of a `window`-point span.
///
/// Edge points that straddle a slice boundary contribute in proportion to
/// their overlap; weights of each slice sum to one.
pub(crate) fn division_weights(window: usize, divisions: usize) -> Vec<Vec<(usize, f64)>> {
    let width = window as f64 / divisions as f64;
    (0..divisions)
        .map(|i| {
            let start = i as f64 * width;
            let end = (i + 1) as f64 * width;
            (start.floor() as usize..=end.floor() as usize)
                .filter(|p| *p < window)
                .filter_map(|p| {
                    let overlap = end.min((p + 1) as f64) - start.max(p as f64);
                    (overlap > 0.0).then_some((p, overlap / width))
                })
                .collect()
        })
        .collect()
}

/// Division averages of every calendar day, indexed `[day][division]`.
fn daily_profiles(
    values: &[f64],
    ppd: usize,
    window: Range<usize>,
    divisions: usize,
) -> Vec<Vec<f64>> {
    let weights = division_weights(window.len(), divisions);
    values
        .chunks(ppd)
        .map(|day| {
            let span = &day[window.clone()];
            weights
                .iter()
                .map(|points| points.iter().map(|(p, w)| w * span[*p]).sum())
                .collect()
        })
        .collect()
}
