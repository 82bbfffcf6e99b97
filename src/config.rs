//! TOML-based clustering configuration and preset definitions.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::features::Metric;
use crate::series::DAYS_PER_YEAR;
use crate::sim::layout::{DayLayout, MAX_GROUP_DAYS};

/// Only clustering algorithm supported.
pub const AFFINITY_PROPAGATION: &str = "affinity-propagation";

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Affinity propagation and cluster-count control.
    #[serde(default)]
    pub clustering: ClusteringConfig,
    /// Simulation window layout.
    #[serde(default)]
    pub days: DaysConfig,
    /// Feature extraction weights and windows.
    #[serde(default)]
    pub features: FeaturesConfig,
    /// Synthetic weather year used when no input file is given.
    #[serde(default)]
    pub synthetic: SyntheticConfig,
    /// Output files and worker count for the binary.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Affinity propagation and cluster-count control.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusteringConfig {
    /// Algorithm name; only `"affinity-propagation"` is accepted.
    pub algorithm: String,
    /// Requested number of clusters (must be > 0).
    pub target_clusters: usize,
    /// Message-passing iteration cap.
    pub max_iterations: usize,
    /// Consecutive unchanged assignments needed to declare convergence.
    pub convergence_iterations: usize,
    /// Damping factor in `[0.5, 1.0)`.
    pub damping: f64,
    /// Hard (0/1) partition when true, fuzzy memberships otherwise.
    pub hard_partition: bool,
    /// Fuzzy exponent `m` (must be > 1 for fuzzy partitions).
    pub fuzziness: f64,
    /// Bisect the preference multiplier to reach `target_clusters`.
    pub enforce_cluster_count: bool,
    /// Accepted distance from `target_clusters`.
    pub cluster_count_tolerance: usize,
    /// Bisection iteration cap.
    pub bisection_max_iterations: usize,
    /// Multiplier on the median similarity used as preference.
    pub preference_multiplier: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            algorithm: AFFINITY_PROPAGATION.to_string(),
            target_clusters: 40,
            max_iterations: 200,
            convergence_iterations: 10,
            damping: 0.5,
            hard_partition: true,
            fuzziness: 2.0,
            enforce_cluster_count: true,
            cluster_count_tolerance: 1,
            bisection_max_iterations: 50,
            preference_multiplier: 1.0,
        }
    }
}

/// Simulation window layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaysConfig {
    /// Counted days per group.
    pub days_per_group: usize,
    /// Warm-up days simulated before each group.
    pub previous_days: usize,
    /// Days simulated after each group.
    pub next_days: usize,
    /// Fold the first and last calendar days into the nearest clusters.
    pub adjust_boundary_weights: bool,
    /// Merge calendar-adjacent exemplars into one simulation.
    pub combine_consecutive: bool,
}

impl Default for DaysConfig {
    fn default() -> Self {
        Self {
            days_per_group: 2,
            previous_days: 1,
            next_days: 1,
            adjust_boundary_weights: true,
            combine_consecutive: true,
        }
    }
}

/// Feature extraction weights and windows.
///
/// Maps are keyed by metric name (`dni`, `clearsky`, `price`, `dni_prev`,
/// `dni_next`, `price_prev`, `price_next`, `tdry`, `wspd`, `availability`).
/// A `[features.weights]` table replaces the default weights entirely;
/// metrics it omits get weight zero.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeaturesConfig {
    /// Divide each series by its maximum before averaging.
    pub normalize: bool,
    /// Irradiance is zeroed where wind speed exceeds this (m/s).
    pub wind_stow_limit: Option<f64>,
    /// Per-metric weight (>= 0).
    pub weights: BTreeMap<String, f64>,
    /// Per-metric sub-day division count (> 0). Missing metrics use 1.
    pub divisions: BTreeMap<String, usize>,
    /// Per-metric daylight-only flag. Missing metrics use the metric default.
    pub daylight_only: BTreeMap<String, bool>,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        let weights = [
            (Metric::Dni, 1.0),
            (Metric::ClearSky, 1.0),
            (Metric::Price, 1.0),
            (Metric::DniPrev, 1.0),
        ];
        let divisions = [(Metric::Dni, 4), (Metric::ClearSky, 4), (Metric::Price, 4)];
        Self {
            normalize: true,
            wind_stow_limit: None,
            weights: weights.iter().map(|(m, w)| (m.name().to_string(), *w)).collect(),
            divisions: divisions.iter().map(|(m, d)| (m.name().to_string(), *d)).collect(),
            daylight_only: Metric::ALL
                .iter()
                .map(|m| (m.name().to_string(), m.default_daylight_only()))
                .collect(),
        }
    }
}

impl FeaturesConfig {
    /// Weight of `metric`; zero when absent.
    pub fn weight(&self, metric: Metric) -> f64 {
        self.weights.get(metric.name()).copied().unwrap_or(0.0)
    }

    /// Division count of `metric`; one when absent.
    pub fn divisions(&self, metric: Metric) -> usize {
        self.divisions.get(metric.name()).copied().unwrap_or(1)
    }

    /// Whether `metric` averages over the summer daylight window only.
    pub fn daylight_only(&self, metric: Metric) -> bool {
        self.daylight_only
            .get(metric.name())
            .copied()
            .unwrap_or_else(|| metric.default_daylight_only())
    }

    /// Replaces the weights with `weights`; unlisted metrics get zero.
    pub fn set_weights(&mut self, weights: &[(Metric, f64)]) {
        self.weights = weights
            .iter()
            .map(|(m, w)| (m.name().to_string(), *w))
            .collect();
    }
}

/// Synthetic weather year parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticConfig {
    /// Random seed.
    pub seed: u64,
    /// Time steps per hour of the generated series.
    pub steps_per_hour: usize,
    /// Clear-sky irradiance at solar noon on the summer solstice (W/m²).
    pub peak_dni: f64,
    /// AR(1) persistence of the daily cloud multiplier (0.0-1.0).
    pub cloud_alpha: f64,
    /// AR(1) innovation noise standard deviation.
    pub cloud_noise_std: f64,
    /// Mean wind speed (m/s).
    pub mean_wind_speed: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            steps_per_hour: 1,
            peak_dni: 950.0,
            cloud_alpha: 0.6,
            cloud_noise_std: 0.35,
            mean_wind_speed: 4.0,
        }
    }
}

/// Output files and worker count for the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Reconstructed annual arrays CSV path.
    pub annual_csv: Option<String>,
    /// Cluster summary CSV path.
    pub summary_csv: Option<String>,
    /// Simulation worker threads (1 = sequential).
    pub workers: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            annual_csv: None,
            summary_csv: None,
            workers: 1,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"days.days_per_group"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario: 40 two-day clusters with boundary correction.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the fast preset: 20 clusters, coarser features, looser count control.
    pub fn fast() -> Self {
        let mut features = FeaturesConfig::default();
        for metric in [Metric::Dni, Metric::ClearSky, Metric::Price] {
            features.divisions.insert(metric.name().to_string(), 2);
        }
        Self {
            clustering: ClusteringConfig {
                target_clusters: 20,
                cluster_count_tolerance: 2,
                bisection_max_iterations: 25,
                ..ClusteringConfig::default()
            },
            features,
            ..Self::default()
        }
    }

    /// Returns the exact preset: one cluster per group, so every group is simulated.
    pub fn exact() -> Self {
        let days = DaysConfig::default();
        Self {
            clustering: ClusteringConfig {
                target_clusters: MAX_GROUP_DAYS / days.days_per_group,
                ..ClusteringConfig::default()
            },
            days,
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "fast", "exact"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "fast" => Ok(Self::fast()),
            "exact" => Ok(Self::exact()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Day layout for series sampled at `steps_per_hour`.
    pub fn layout(&self, steps_per_hour: usize) -> DayLayout {
        DayLayout::new(
            self.days.days_per_group,
            self.days.previous_days,
            self.days.next_days,
            steps_per_hour,
        )
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let c = &self.clustering;

        if c.algorithm != AFFINITY_PROPAGATION {
            errors.push(ConfigError::new(
                "clustering.algorithm",
                format!("must be \"{AFFINITY_PROPAGATION}\", got \"{}\"", c.algorithm),
            ));
        }
        if c.target_clusters == 0 {
            errors.push(ConfigError::new("clustering.target_clusters", "must be > 0"));
        }
        if c.max_iterations == 0 {
            errors.push(ConfigError::new("clustering.max_iterations", "must be > 0"));
        }
        if c.convergence_iterations == 0 {
            errors.push(ConfigError::new(
                "clustering.convergence_iterations",
                "must be > 0",
            ));
        }
        if !(0.5..1.0).contains(&c.damping) {
            errors.push(ConfigError::new("clustering.damping", "must be in [0.5, 1.0)"));
        }
        if !c.hard_partition && !(c.fuzziness > 1.0) {
            errors.push(ConfigError::new(
                "clustering.fuzziness",
                "must be > 1.0 for fuzzy partitions",
            ));
        }
        if c.bisection_max_iterations == 0 {
            errors.push(ConfigError::new(
                "clustering.bisection_max_iterations",
                "must be > 0",
            ));
        }
        if !(c.preference_multiplier > 0.0) || !c.preference_multiplier.is_finite() {
            errors.push(ConfigError::new(
                "clustering.preference_multiplier",
                "must be a finite value > 0",
            ));
        }

        let d = &self.days;
        if d.days_per_group == 0 || d.days_per_group > MAX_GROUP_DAYS {
            errors.push(ConfigError::new(
                "days.days_per_group",
                format!("must be in [1, {MAX_GROUP_DAYS}]"),
            ));
        }
        if d.previous_days + d.days_per_group + d.next_days > DAYS_PER_YEAR {
            errors.push(ConfigError::new(
                "days.previous_days",
                format!("previous_days + days_per_group + next_days must be <= {DAYS_PER_YEAR}"),
            ));
        }

        let f = &self.features;
        for (name, weight) in &f.weights {
            if Metric::from_name(name).is_none() {
                errors.push(ConfigError::new(
                    format!("features.weights.{name}"),
                    "unknown metric",
                ));
            }
            if !(*weight >= 0.0) || !weight.is_finite() {
                errors.push(ConfigError::new(
                    format!("features.weights.{name}"),
                    "must be a finite value >= 0",
                ));
            }
        }
        if !Metric::ALL.iter().any(|m| f.weight(*m) > 0.0) {
            errors.push(ConfigError::new(
                "features.weights",
                "at least one metric must have a positive weight",
            ));
        }
        for (name, divisions) in &f.divisions {
            if Metric::from_name(name).is_none() {
                errors.push(ConfigError::new(
                    format!("features.divisions.{name}"),
                    "unknown metric",
                ));
            }
            if *divisions == 0 {
                errors.push(ConfigError::new(
                    format!("features.divisions.{name}"),
                    "must be > 0",
                ));
            }
        }
        for name in f.daylight_only.keys() {
            if Metric::from_name(name).is_none() {
                errors.push(ConfigError::new(
                    format!("features.daylight_only.{name}"),
                    "unknown metric",
                ));
            }
        }
        if f.wind_stow_limit.is_some_and(|limit| !(limit > 0.0)) {
            errors.push(ConfigError::new("features.wind_stow_limit", "must be > 0"));
        }

        let s = &self.synthetic;
        if s.steps_per_hour == 0 {
            errors.push(ConfigError::new("synthetic.steps_per_hour", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&s.cloud_alpha) {
            errors.push(ConfigError::new(
                "synthetic.cloud_alpha",
                "must be in [0.0, 1.0]",
            ));
        }
        if s.cloud_noise_std < 0.0 {
            errors.push(ConfigError::new("synthetic.cloud_noise_std", "must be >= 0"));
        }

        if self.output.workers == 0 {
            errors.push(ConfigError::new("output.workers", "must be > 0"));
        }

        errors
    }
}
