//! Stateless analyses over a loaded table.
//!
//! Each analysis is a function of the table and its parameters; none of
//! them modify the table or any session state.

pub mod correlation;
pub mod distribution;
pub mod outliers;
pub mod timeseries;

pub use correlation::{
    CorrelationAnalysis, CorrelationMethod, CorrelationPair, CorrelationStrength,
    TargetCorrelation, analyze_correlation, correlation_with_target,
};
pub use distribution::{
    CategoricalDistribution, Distribution, NumericDistribution, analyze_distribution,
    categorical_distribution, numeric_distribution,
};
pub use outliers::{OutlierBounds, OutlierMethod, OutlierReport, detect_outliers, outlier_mask};
pub use timeseries::{
    Forecast, ForecastPoint, Frequency, ModelKind, TimeSeriesAnalysis, TrendDirection,
    TrendResult, analyze_periodicity, analyze_timeseries, detect_datetime_columns, detect_trend,
    estimate_frequency, forecast, moving_averages, prepare_series,
};
