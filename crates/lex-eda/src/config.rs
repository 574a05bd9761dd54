//! Configuration for detection, analysis and export.
//!
//! The configuration is a nested document with one section per concern.
//! Every field has a default, so partial documents merge onto the built-in
//! values, and [`AppConfig::load`] falls back to the defaults entirely when
//! the file is missing or malformed.
//!
//! ```yaml
//! general:
//!   max_file_size_mb: 500
//! data_types:
//!   categorical_threshold: 15
//! correlation:
//!   method: spearman
//!   threshold: 0.6
//! ```

use crate::analysis::correlation::CorrelationMethod;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub analysis: AnalysisToggles,
    pub data_types: DetectionConfig,
    pub visualization: VisualizationConfig,
    pub correlation: CorrelationConfig,
    pub preprocessing: PreprocessingConfig,
    pub timeseries: TimeSeriesConfig,
}

/// Resource limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Files larger than this are rejected before parsing.
    pub max_file_size_mb: u64,
    pub max_memory_usage_gb: u64,
    pub timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 3000,
            max_memory_usage_gb: 16,
            timeout_seconds: 120,
        }
    }
}

/// Which analyses a front end should offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisToggles {
    pub basic_stats: bool,
    pub distribution: bool,
    pub correlation: bool,
    pub timeseries: bool,
    pub preprocessing: bool,
}

impl Default for AnalysisToggles {
    fn default() -> Self {
        Self {
            basic_stats: true,
            distribution: true,
            correlation: true,
            timeseries: true,
            preprocessing: true,
        }
    }
}

/// Thresholds controlling semantic type inference at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Run type inference after parsing.
    pub auto_detect: bool,
    /// Explicit chrono patterns, tried in order before format-free parsing.
    pub datetime_formats: Vec<String>,
    /// Maximum distinct values for a text column to become categorical.
    pub categorical_threshold: usize,
    /// Maximum distinct/total ratio for a text column to become categorical.
    pub categorical_max_ratio: f64,
    /// Minimum share of parseable values for format-free datetime detection.
    pub datetime_success_rate: f64,
    /// Minimum share of coercible values for numeric detection.
    pub numeric_success_rate: f64,
    /// Number of leading non-null values inspected per column.
    pub sample_size: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            auto_detect: true,
            datetime_formats: vec![
                "%Y-%m-%d".to_string(),
                "%Y/%m/%d".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y/%m/%d %H:%M:%S".to_string(),
            ],
            categorical_threshold: 10,
            categorical_max_ratio: 0.5,
            datetime_success_rate: 0.7,
            numeric_success_rate: 0.8,
            sample_size: 100,
        }
    }
}

/// Chart defaults. Only `max_categories` affects computed results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub figure_size: [u32; 2],
    pub dpi: u32,
    pub style: String,
    pub color_palette: String,
    /// Categories beyond this many are folded into an "others" bucket.
    pub max_categories: usize,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            figure_size: [10, 6],
            dpi: 100,
            style: "whitegrid".to_string(),
            color_palette: "husl".to_string(),
            max_categories: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub method: CorrelationMethod,
    /// Minimum absolute coefficient for a pair to count as strong.
    pub threshold: f64,
    pub show_heatmap: bool,
    pub show_scatter_matrix: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            method: CorrelationMethod::Pearson,
            threshold: 0.5,
            show_heatmap: true,
            show_scatter_matrix: true,
        }
    }
}

/// Labels offered by front ends when choosing preprocessing methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub missing_value_methods: Vec<String>,
    pub outlier_methods: Vec<String>,
    pub conversion_targets: Vec<String>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        let labels = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            missing_value_methods: labels(&[
                "drop", "mean", "median", "mode", "ffill", "bfill", "custom",
            ]),
            outlier_methods: labels(&["iqr", "zscore", "modified_zscore"]),
            conversion_targets: labels(&[
                "int64", "float64", "text", "datetime", "category", "bool",
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSeriesConfig {
    /// Default forecast horizon in periods of the estimated frequency.
    pub forecast_periods: usize,
    pub moving_average_windows: Vec<usize>,
    pub min_forecast_points: usize,
}

impl Default for TimeSeriesConfig {
    fn default() -> Self {
        Self {
            forecast_periods: 30,
            moving_average_windows: vec![7, 30],
            min_forecast_points: 5,
        }
    }
}

impl AppConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Load a configuration document, falling back to defaults.
    ///
    /// `.json` files are parsed as JSON, anything else as YAML. A missing
    /// file, a parse failure or a document that fails validation yields
    /// [`AppConfig::default`] and a warning; this function never fails.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Config file {} not readable ({}), using defaults",
                    path.display(),
                    e
                );
                return Self::default();
            }
        };

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        };

        match parsed {
            Ok(config) => match config.validate() {
                Ok(()) => {
                    debug!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config in {} ({}), using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to parse {} ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(text: &str) -> crate::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let rates = [
            (
                "data_types.categorical_max_ratio",
                self.data_types.categorical_max_ratio,
            ),
            (
                "data_types.datetime_success_rate",
                self.data_types.datetime_success_rate,
            ),
            (
                "data_types.numeric_success_rate",
                self.data_types.numeric_success_rate,
            ),
            ("correlation.threshold", self.correlation.threshold),
        ];
        for (field, value) in rates {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.general.max_file_size_mb == 0 {
            return Err(ConfigValidationError::ZeroLimit(
                "general.max_file_size_mb".to_string(),
            ));
        }
        if self.data_types.categorical_threshold == 0 {
            return Err(ConfigValidationError::ZeroLimit(
                "data_types.categorical_threshold".to_string(),
            ));
        }
        if self.data_types.sample_size == 0 {
            return Err(ConfigValidationError::ZeroLimit(
                "data_types.sample_size".to_string(),
            ));
        }
        if self.timeseries.moving_average_windows.contains(&0) {
            return Err(ConfigValidationError::ZeroLimit(
                "timeseries.moving_average_windows".to_string(),
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("'{0}' must be greater than zero")]
    ZeroLimit(String),
}

/// Builder for [`AppConfig`] covering the commonly tuned fields.
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    max_file_size_mb: Option<u64>,
    auto_detect: Option<bool>,
    datetime_formats: Option<Vec<String>>,
    categorical_threshold: Option<usize>,
    max_categories: Option<usize>,
    correlation_method: Option<CorrelationMethod>,
    correlation_threshold: Option<f64>,
    forecast_periods: Option<usize>,
}

impl AppConfigBuilder {
    /// Set the upload size limit in megabytes.
    pub fn max_file_size_mb(mut self, limit: u64) -> Self {
        self.max_file_size_mb = Some(limit);
        self
    }

    /// Enable or disable type inference at ingestion.
    pub fn auto_detect(mut self, enable: bool) -> Self {
        self.auto_detect = Some(enable);
        self
    }

    /// Replace the explicit datetime patterns.
    pub fn datetime_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datetime_formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    pub fn categorical_threshold(mut self, threshold: usize) -> Self {
        self.categorical_threshold = Some(threshold);
        self
    }

    pub fn max_categories(mut self, max: usize) -> Self {
        self.max_categories = Some(max);
        self
    }

    pub fn correlation_method(mut self, method: CorrelationMethod) -> Self {
        self.correlation_method = Some(method);
        self
    }

    /// Set the strong-pair threshold (0.0 - 1.0).
    pub fn correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = Some(threshold);
        self
    }

    pub fn forecast_periods(mut self, periods: usize) -> Self {
        self.forecast_periods = Some(periods);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AppConfig` or an error if validation fails.
    pub fn build(self) -> Result<AppConfig, ConfigValidationError> {
        let mut config = AppConfig::default();
        if let Some(limit) = self.max_file_size_mb {
            config.general.max_file_size_mb = limit;
        }
        if let Some(enable) = self.auto_detect {
            config.data_types.auto_detect = enable;
        }
        if let Some(formats) = self.datetime_formats {
            config.data_types.datetime_formats = formats;
        }
        if let Some(threshold) = self.categorical_threshold {
            config.data_types.categorical_threshold = threshold;
        }
        if let Some(max) = self.max_categories {
            config.visualization.max_categories = max;
        }
        if let Some(method) = self.correlation_method {
            config.correlation.method = method;
        }
        if let Some(threshold) = self.correlation_threshold {
            config.correlation.threshold = threshold;
        }
        if let Some(periods) = self.forecast_periods {
            config.timeseries.forecast_periods = periods;
        }

        config.validate()?;
        Ok(config)
    }
}
