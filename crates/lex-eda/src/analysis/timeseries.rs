//! Time-series analysis: frequency, trend, moving averages, a simple
//! regression forecast, and calendar periodicity.
//!
//! Timestamps are milliseconds since the epoch throughout; regressions use
//! seconds since the epoch as the explanatory variable.

use crate::config::AppConfig;
use crate::error::{EdaError, Result};
use crate::utils::{
    DtypeCategory, datetime_series, from_epoch_ms, get_dtype_category, is_datetime_dtype,
    is_numeric_dtype, mean, numeric_values, parse_datetime_flexible, quantile_sorted, sort_f64,
    std_dev, string_values, timestamps_ms, to_epoch_ms,
};
use chrono::{Datelike, Duration, Months, NaiveDateTime};
use nalgebra::{DMatrix, DVector};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Column-name fragments that mark a text column as a date candidate.
pub const DATETIME_NAME_KEYWORDS: [&str; 5] = ["date", "time", "timestamp", "日付", "時刻"];

/// Leading non-null values parsed when sniffing a text column.
const DETECTION_SAMPLE: usize = 50;
const DETECTION_SUCCESS_RATE: f64 = 0.6;

/// Minimum observations for a forecast.
pub const MIN_FORECAST_POINTS: usize = 5;
/// Polynomial fits must explain at least this much variance to be chosen.
const POLYNOMIAL_MIN_R2: f64 = 0.3;
/// R² gains below this are floating-point noise.
const R2_TOLERANCE: f64 = 1e-9;
/// Slopes (per second) below this magnitude are flat.
const FLAT_SLOPE: f64 = 1e-10;

/// Singular values below this share of the largest count as zero.
const RANK_TOLERANCE: f64 = 1e-12;

const MS_PER_DAY: f64 = 86_400_000.0;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// The timestamp `steps` periods after `start`.
    ///
    /// Month-based steps keep the day of month, clamped to the month end.
    pub fn advance(self, start: NaiveDateTime, steps: u32) -> Option<NaiveDateTime> {
        match self {
            Frequency::Daily => start.checked_add_signed(Duration::days(i64::from(steps))),
            Frequency::Weekly => start.checked_add_signed(Duration::weeks(i64::from(steps))),
            Frequency::Monthly => start.checked_add_months(Months::new(steps)),
            Frequency::Quarterly => start.checked_add_months(Months::new(steps.checked_mul(3)?)),
            Frequency::Yearly => start.checked_add_months(Months::new(steps.checked_mul(12)?)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    /// Change in value per second.
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverage {
    pub window: usize,
    /// `MA_<window>`.
    pub name: String,
    /// Trailing mean; `None` until the window is full.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    Polynomial,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    pub value: f64,
    pub is_prediction: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub model: ModelKind,
    pub r_squared: f64,
    pub frequency: Frequency,
    pub periods: usize,
    /// Observations followed by predictions.
    pub points: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub key: String,
    pub mean: f64,
    /// Sample standard deviation; NaN for single-value groups.
    pub std: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Periodicity {
    pub monthly: Vec<GroupStats>,
    pub weekday: Vec<GroupStats>,
    pub yearly: Vec<GroupStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesAnalysis {
    pub date_column: String,
    pub value_column: String,
    pub observations: usize,
    pub start: i64,
    pub end: i64,
    pub frequency: Frequency,
    pub trend: TrendResult,
    pub moving_averages: Vec<MovingAverage>,
    /// Absent when there are too few observations.
    pub forecast: Option<Forecast>,
    pub periodicity: Periodicity,
}

// ============================================================================
// Column detection and preparation
// ============================================================================

/// Columns usable as the time axis.
pub fn detect_datetime_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|column| {
            let dtype = column.dtype();
            if is_datetime_dtype(dtype) {
                return true;
            }
            if !matches!(
                get_dtype_category(dtype),
                DtypeCategory::Text | DtypeCategory::Categorical
            ) {
                return false;
            }
            let lower = column.name().to_lowercase();
            DATETIME_NAME_KEYWORDS.iter().any(|k| lower.contains(k))
                || mostly_dates(column.as_materialized_series())
        })
        .map(|column| column.name().to_string())
        .collect()
}

fn mostly_dates(series: &Series) -> bool {
    let Ok(values) = string_values(series) else {
        return false;
    };
    let sample: Vec<String> = values.into_iter().flatten().take(DETECTION_SAMPLE).collect();
    if sample.is_empty() {
        return false;
    }
    let parsed = sample
        .iter()
        .filter(|v| parse_datetime_flexible(v).is_some())
        .count();
    parsed as f64 / sample.len() as f64 >= DETECTION_SUCCESS_RATE
}

/// Select the date and value columns, coerce the date column, drop rows
/// with any missing value, and sort ascending by date.
pub fn prepare_series(df: &DataFrame, date_col: &str, value_cols: &[&str]) -> Result<DataFrame> {
    let timestamps = date_column_ms(df, date_col)?;

    let mut values = Vec::with_capacity(value_cols.len());
    for &name in value_cols {
        let series = df
            .column(name)
            .map_err(|_| EdaError::ColumnNotFound(name.to_string()))?
            .as_materialized_series();
        if !is_numeric_dtype(series.dtype()) {
            return Err(EdaError::type_mismatch(name, "numeric", series.dtype()));
        }
        values.push(numeric_values(series)?);
    }

    let mut rows: Vec<usize> = (0..timestamps.len())
        .filter(|&row| timestamps[row].is_some() && values.iter().all(|col| col[row].is_some()))
        .collect();
    rows.sort_by_key(|&row| timestamps[row]);

    let mut columns = Vec::with_capacity(value_cols.len() + 1);
    columns.push(Column::from(datetime_series(
        date_col.into(),
        rows.iter().map(|&row| timestamps[row]).collect(),
    )?));
    for (name, col) in value_cols.iter().zip(&values) {
        let picked: Vec<Option<f64>> = rows.iter().map(|&row| col[row]).collect();
        columns.push(Column::from(Series::new((*name).into(), picked)));
    }
    Ok(DataFrame::new(columns)?)
}

/// Millisecond timestamps of a date column, parsing text when needed.
fn date_column_ms(df: &DataFrame, date_col: &str) -> Result<Vec<Option<i64>>> {
    let series = df
        .column(date_col)
        .map_err(|_| EdaError::ColumnNotFound(date_col.to_string()))?
        .as_materialized_series();

    match get_dtype_category(series.dtype()) {
        DtypeCategory::Datetime => Ok(timestamps_ms(series)?),
        DtypeCategory::Text | DtypeCategory::Categorical => Ok(string_values(series)?
            .into_iter()
            .map(|v| v.and_then(|s| parse_datetime_flexible(&s)).map(to_epoch_ms))
            .collect()),
        _ => Err(EdaError::type_mismatch(date_col, "datetime", series.dtype())),
    }
}

/// Sorted, complete `(timestamps, values)` pairs for one value column.
pub fn series_points(
    df: &DataFrame,
    date_col: &str,
    value_col: &str,
) -> Result<(Vec<i64>, Vec<f64>)> {
    let prepared = prepare_series(df, date_col, &[value_col])?;
    let timestamps = timestamps_ms(prepared.column(date_col)?.as_materialized_series())?
        .into_iter()
        .flatten()
        .collect();
    let values = numeric_values(prepared.column(value_col)?.as_materialized_series())?
        .into_iter()
        .flatten()
        .collect();
    Ok((timestamps, values))
}

// ============================================================================
// Frequency and moving averages
// ============================================================================

/// Sampling frequency from the median spacing between timestamps.
pub fn estimate_frequency(timestamps: &[i64]) -> Frequency {
    if timestamps.len() < 2 {
        return Frequency::Daily;
    }
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();
    let mut diffs: Vec<f64> = sorted
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / MS_PER_DAY)
        .collect();
    sort_f64(&mut diffs);

    match quantile_sorted(&diffs, 0.5) {
        d if d <= 1.0 => Frequency::Daily,
        d if d <= 7.0 => Frequency::Weekly,
        d if d <= 31.0 => Frequency::Monthly,
        d if d <= 92.0 => Frequency::Quarterly,
        _ => Frequency::Yearly,
    }
}

/// Trailing means for each window that fits in the series.
pub fn moving_averages(values: &[f64], windows: &[usize]) -> Vec<MovingAverage> {
    windows
        .iter()
        .filter(|&&w| w > 0 && values.len() >= w)
        .map(|&window| {
            let mut out = vec![None; values.len()];
            let mut sum: f64 = values[..window - 1].iter().sum();
            for idx in (window - 1)..values.len() {
                sum += values[idx];
                out[idx] = Some(sum / window as f64);
                sum -= values[idx + 1 - window];
            }
            MovingAverage {
                window,
                name: format!("MA_{window}"),
                values: out,
            }
        })
        .collect()
}

// ============================================================================
// Regression
// ============================================================================

/// Least-squares polynomial in `t = (x - center) / scale`, solved by SVD.
#[derive(Debug, Clone)]
struct PolynomialFit {
    center: f64,
    scale: f64,
    /// Ascending powers of `t`.
    coefficients: DVector<f64>,
}

impl PolynomialFit {
    /// `None` when the design matrix is rank deficient.
    fn fit(x: &[f64], y: &[f64], degree: usize) -> Option<Self> {
        let center = mean(x);
        let spread = x.iter().map(|v| (v - center).abs()).fold(0.0, f64::max);
        let scale = if spread > 0.0 { spread } else { 1.0 };

        let design = DMatrix::from_fn(x.len(), degree + 1, |row, col| {
            ((x[row] - center) / scale).powi(col as i32)
        });
        let target = DVector::from_column_slice(y);
        let svd = design.svd(true, true);
        let tolerance = svd.singular_values.max() * RANK_TOLERANCE;
        if svd.rank(tolerance) <= degree {
            return None;
        }
        let coefficients = svd.solve(&target, tolerance).ok()?;
        coefficients.iter().all(|c| c.is_finite()).then_some(PolynomialFit {
            center,
            scale,
            coefficients,
        })
    }

    /// Straight line through `(x, y)`; constant `x` gives a flat line at the mean.
    fn line(x: &[f64], y: &[f64]) -> Self {
        Self::fit(x, y, 1).unwrap_or_else(|| PolynomialFit {
            center: mean(x),
            scale: 1.0,
            coefficients: DVector::from_vec(vec![mean(y), 0.0]),
        })
    }

    fn predict(&self, x: f64) -> f64 {
        let t = (x - self.center) / self.scale;
        self.coefficients
            .as_slice()
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * t + c)
    }

    /// Slope and intercept of a degree-1 fit in the units of `x`.
    fn slope_intercept(&self) -> (f64, f64) {
        let c0 = self.coefficients[0];
        let c1 = self.coefficients.get(1).copied().unwrap_or(0.0);
        let slope = c1 / self.scale;
        (slope, c0 - slope * self.center)
    }
}

fn r_squared(y: &[f64], predicted: impl Iterator<Item = f64>) -> f64 {
    let my = mean(y);
    let ss_tot: f64 = y.iter().map(|v| (v - my).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = y.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    1.0 - ss_res / ss_tot
}

fn epoch_seconds(timestamps: &[i64]) -> Vec<f64> {
    timestamps.iter().map(|&ms| (ms / 1000) as f64).collect()
}

/// Linear trend of values over time.
pub fn detect_trend(timestamps: &[i64], values: &[f64]) -> Result<TrendResult> {
    let n = timestamps.len().min(values.len());
    if n < 2 {
        return Err(EdaError::InsufficientData {
            required: 2,
            found: n,
        });
    }
    let x = epoch_seconds(&timestamps[..n]);
    let y = &values[..n];
    let fit = PolynomialFit::line(&x, y);
    let (slope, intercept) = fit.slope_intercept();

    let direction = if slope.abs() < FLAT_SLOPE {
        TrendDirection::Flat
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    Ok(TrendResult {
        slope,
        intercept,
        r_squared: r_squared(y, x.iter().map(|&v| fit.predict(v))),
        direction,
    })
}

/// Extend the series `periods` steps past its last observation.
///
/// A quadratic model is used when it beats the linear one and explains
/// more than 30% of the variance.
pub fn forecast(
    timestamps: &[i64],
    values: &[f64],
    periods: usize,
    frequency: Frequency,
) -> Result<Forecast> {
    let n = timestamps.len().min(values.len());
    if n < MIN_FORECAST_POINTS {
        return Err(EdaError::InsufficientData {
            required: MIN_FORECAST_POINTS,
            found: n,
        });
    }
    let (timestamps, values) = (&timestamps[..n], &values[..n]);
    let x = epoch_seconds(timestamps);

    let linear = PolynomialFit::line(&x, values);
    let linear_r2 = r_squared(values, x.iter().map(|&v| linear.predict(v)));

    let quadratic = PolynomialFit::fit(&x, values, 2);
    if quadratic.is_none() {
        warn!("Quadratic fit failed, forecasting with a linear model");
    }
    let chosen = quadratic
        .map(|q| {
            let r2 = r_squared(values, x.iter().map(|&v| q.predict(v)));
            (q, r2)
        })
        .filter(|&(_, r2)| r2 > linear_r2 + R2_TOLERANCE && r2 > POLYNOMIAL_MIN_R2);

    let (model, r2, fit) = match chosen {
        Some((q, r2)) => (ModelKind::Polynomial, r2, q),
        None => (ModelKind::Linear, linear_r2, linear),
    };
    debug!("Forecast model {:?} (r2 {:.3}) at {:?}", model, r2, frequency);

    let last = timestamps
        .iter()
        .copied()
        .max()
        .and_then(from_epoch_ms)
        .ok_or(EdaError::InsufficientData {
            required: MIN_FORECAST_POINTS,
            found: 0,
        })?;

    let mut points: Vec<ForecastPoint> = timestamps
        .iter()
        .zip(values)
        .map(|(&timestamp, &value)| ForecastPoint {
            timestamp,
            value,
            is_prediction: false,
        })
        .collect();
    for step in 1..=periods {
        let Some(next) = u32::try_from(step)
            .ok()
            .and_then(|s| frequency.advance(last, s))
        else {
            break;
        };
        let timestamp = to_epoch_ms(next);
        points.push(ForecastPoint {
            timestamp,
            value: fit.predict((timestamp / 1000) as f64),
            is_prediction: true,
        });
    }

    Ok(Forecast {
        model,
        r_squared: r2,
        frequency,
        periods,
        points,
    })
}

// ============================================================================
// Periodicity
// ============================================================================

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Mean, spread and count of values grouped by month, weekday and year.
pub fn analyze_periodicity(timestamps: &[i64], values: &[f64]) -> Periodicity {
    let mut monthly: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    let mut weekday: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    let mut yearly: BTreeMap<i32, Vec<f64>> = BTreeMap::new();

    for (&ms, &value) in timestamps.iter().zip(values) {
        let Some(dt) = from_epoch_ms(ms) else {
            continue;
        };
        monthly.entry(dt.month()).or_default().push(value);
        weekday
            .entry(dt.weekday().num_days_from_monday())
            .or_default()
            .push(value);
        yearly.entry(dt.year()).or_default().push(value);
    }

    Periodicity {
        monthly: monthly
            .iter()
            .map(|(month, group)| group_stats(month.to_string(), group))
            .collect(),
        weekday: weekday
            .iter()
            .map(|(day, group)| group_stats(WEEKDAYS[*day as usize % 7].to_string(), group))
            .collect(),
        yearly: yearly
            .iter()
            .map(|(year, group)| group_stats(year.to_string(), group))
            .collect(),
    }
}

fn group_stats(key: String, group: &[f64]) -> GroupStats {
    GroupStats {
        key,
        mean: mean(group),
        std: std_dev(group, 1),
        count: group.len(),
    }
}

/// Run every time-series analysis for one date/value column pair.
pub fn analyze_timeseries(
    df: &DataFrame,
    date_col: &str,
    value_col: &str,
    config: &AppConfig,
) -> Result<TimeSeriesAnalysis> {
    let (timestamps, values) = series_points(df, date_col, value_col)?;
    let trend = detect_trend(&timestamps, &values)?;
    let frequency = estimate_frequency(&timestamps);

    let settings = &config.timeseries;
    let min_points = settings.min_forecast_points.max(MIN_FORECAST_POINTS);
    let forecast = if timestamps.len() >= min_points {
        Some(forecast(
            &timestamps,
            &values,
            settings.forecast_periods,
            frequency,
        )?)
    } else {
        debug!(
            "Skipping forecast: {} observations, {} required",
            timestamps.len(),
            min_points
        );
        None
    };

    Ok(TimeSeriesAnalysis {
        date_column: date_col.to_string(),
        value_column: value_col.to_string(),
        observations: timestamps.len(),
        start: timestamps.first().copied().unwrap_or_default(),
        end: timestamps.last().copied().unwrap_or_default(),
        frequency,
        trend,
        moving_averages: moving_averages(&values, &settings.moving_average_windows),
        forecast,
        periodicity: analyze_periodicity(&timestamps, &values),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn day_ms(year: i32, month: u32, day: u32) -> i64 {
        to_epoch_ms(
            NaiveDate::from_ymd_opt(year, month, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    fn daily(n: usize) -> Vec<i64> {
        (0..n)
            .map(|i| day_ms(2023, 1, 1) + i as i64 * MS_PER_DAY as i64)
            .collect()
    }

    // ==================== detect_datetime_columns tests ====================

    #[test]
    fn test_detect_datetime_columns() {
        let df = df![
            "order_date" => ["x", "y", "z"],
            "when" => ["2023-01-01", "2023-01-02", "n/a"],
            "label" => ["a", "b", "c"],
            "amount" => [1, 2, 3],
        ]
        .unwrap();
        assert_eq!(detect_datetime_columns(&df), vec!["order_date", "when"]);
    }

    #[test]
    fn test_detect_datetime_columns_japanese_name() {
        let df = df!["売上日付" => ["a", "b"]].unwrap();
        assert_eq!(detect_datetime_columns(&df), vec!["売上日付"]);
    }

    // ==================== prepare_series tests ====================

    #[test]
    fn test_prepare_series_sorts_and_drops_missing() {
        let df = df![
            "date" => [Some("2023-01-03"), Some("2023-01-01"), None, Some("2023-01-02")],
            "value" => [Some(3.0), Some(1.0), Some(9.0), None],
        ]
        .unwrap();
        let prepared = prepare_series(&df, "date", &["value"]).unwrap();
        assert_eq!(prepared.height(), 2);
        let (ts, values) = series_points(&df, "date", "value").unwrap();
        assert_eq!(ts, vec![day_ms(2023, 1, 1), day_ms(2023, 1, 3)]);
        assert_eq!(values, vec![1.0, 3.0]);
    }

    #[test]
    fn test_prepare_series_rejects_text_values() {
        let df = df!["date" => ["2023-01-01"], "v" => ["x"]].unwrap();
        assert!(matches!(
            prepare_series(&df, "date", &["v"]),
            Err(EdaError::TypeMismatch { .. })
        ));
    }

    // ==================== estimate_frequency tests ====================

    #[test]
    fn test_estimate_frequency_buckets() {
        assert_eq!(estimate_frequency(&daily(10)), Frequency::Daily);
        let weekly: Vec<i64> = (0..5).map(|i| day_ms(2023, 1, 1) + i * 7 * 86_400_000).collect();
        assert_eq!(estimate_frequency(&weekly), Frequency::Weekly);
        let monthly: Vec<i64> = (1..=6).map(|m| day_ms(2023, m, 1)).collect();
        assert_eq!(estimate_frequency(&monthly), Frequency::Monthly);
        let quarterly = vec![day_ms(2023, 1, 1), day_ms(2023, 4, 1), day_ms(2023, 7, 1)];
        assert_eq!(estimate_frequency(&quarterly), Frequency::Quarterly);
        let yearly = vec![day_ms(2020, 1, 1), day_ms(2021, 1, 1), day_ms(2022, 1, 1)];
        assert_eq!(estimate_frequency(&yearly), Frequency::Yearly);
        assert_eq!(estimate_frequency(&[0]), Frequency::Daily);
    }

    #[test]
    fn test_monthly_advance_clamps_to_month_end() {
        let jan31 = from_epoch_ms(day_ms(2024, 1, 31)).unwrap();
        let next = Frequency::Monthly.advance(jan31, 1).unwrap();
        assert_eq!(to_epoch_ms(next), day_ms(2024, 2, 29));
        let two = Frequency::Monthly.advance(jan31, 2).unwrap();
        assert_eq!(to_epoch_ms(two), day_ms(2024, 3, 31));
    }

    // ==================== moving_averages tests ====================

    #[test]
    fn test_moving_averages() {
        let result = moving_averages(&[1.0, 2.0, 3.0, 4.0], &[2, 7]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "MA_2");
        assert_eq!(result[0].values, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    // ==================== detect_trend tests ====================

    #[test]
    fn test_detect_trend_directions() {
        let ts = daily(10);
        let up: Vec<f64> = (0..10).map(f64::from).collect();
        let trend = detect_trend(&ts, &up).unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!((trend.r_squared - 1.0).abs() < 1e-9);

        let down: Vec<f64> = up.iter().map(|v| -v).collect();
        assert_eq!(
            detect_trend(&ts, &down).unwrap().direction,
            TrendDirection::Decreasing
        );

        let flat = vec![5.0; 10];
        assert_eq!(detect_trend(&ts, &flat).unwrap().direction, TrendDirection::Flat);
    }

    #[test]
    fn test_detect_trend_needs_two_points() {
        assert!(matches!(
            detect_trend(&[0], &[1.0]),
            Err(EdaError::InsufficientData { required: 2, found: 1 })
        ));
    }

    // ==================== forecast tests ====================

    #[test]
    fn test_forecast_linear_series() {
        let ts = daily(10);
        let values: Vec<f64> = (0..10).map(|i| 2.0 * f64::from(i) + 1.0).collect();
        let result = forecast(&ts, &values, 3, Frequency::Daily).unwrap();

        assert_eq!(result.model, ModelKind::Linear);
        assert_eq!(result.points.len(), 13);
        assert_eq!(result.points.iter().filter(|p| p.is_prediction).count(), 3);
        assert!(!result.points[9].is_prediction);
        let first = result.points[10];
        assert_eq!(first.timestamp, ts[9] + 86_400_000);
        assert!((first.value - 21.0).abs() < 1e-6);
    }

    #[test]
    fn test_forecast_prefers_quadratic_on_curved_series() {
        let ts = daily(20);
        let values: Vec<f64> = (0..20).map(|i| f64::from(i * i)).collect();
        let result = forecast(&ts, &values, 2, Frequency::Daily).unwrap();
        assert_eq!(result.model, ModelKind::Polynomial);
        assert!((result.points[20].value - 400.0).abs() < 1e-3);
    }

    #[test]
    fn test_quadratic_fit_on_epoch_scale_timestamps() {
        let ts: Vec<i64> = (0..30).map(|i| day_ms(2024, 1, 1) + i * 3_600_000).collect();
        let x = epoch_seconds(&ts);
        let y: Vec<f64> = (0..30)
            .map(|i| 0.5 * f64::from(i * i) - 3.0 * f64::from(i) + 7.0)
            .collect();
        let fit = PolynomialFit::fit(&x, &y, 2).unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            assert!((fit.predict(*xi) - yi).abs() < 1e-6);
        }
    }

    #[test]
    fn test_rank_deficient_fits() {
        let x = vec![1.7e9; 6];
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert!(PolynomialFit::fit(&x, &y, 2).is_none());

        let line = PolynomialFit::line(&x, &y);
        let (slope, intercept) = line.slope_intercept();
        assert_eq!(slope, 0.0);
        assert!((intercept - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_forecast_identical_timestamps_fall_back_to_linear() {
        let ts = vec![day_ms(2024, 3, 1); 6];
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let result = forecast(&ts, &values, 2, Frequency::Daily).unwrap();
        assert_eq!(result.model, ModelKind::Linear);
        assert!((result.points[6].value - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_forecast_needs_five_points() {
        let err = forecast(&daily(4), &[1.0, 2.0, 3.0, 4.0], 3, Frequency::Daily).unwrap_err();
        assert!(matches!(err, EdaError::InsufficientData { required: 5, found: 4 }));
    }

    // ==================== analyze_periodicity tests ====================

    #[test]
    fn test_analyze_periodicity_groups() {
        let ts = vec![day_ms(2023, 1, 2), day_ms(2023, 1, 9), day_ms(2024, 2, 6)];
        let result = analyze_periodicity(&ts, &[1.0, 3.0, 10.0]);
        assert_eq!(result.monthly.len(), 2);
        assert_eq!(result.monthly[0].key, "1");
        assert_eq!(result.monthly[0].mean, 2.0);
        assert_eq!(result.weekday[0].key, "Monday");
        assert_eq!(result.weekday[0].count, 2);
        assert_eq!(result.weekday[1].key, "Tuesday");
        assert!(result.yearly[1].std.is_nan());
    }

    // ==================== analyze_timeseries tests ====================

    #[test]
    fn test_analyze_timeseries_bundle() {
        let dates: Vec<String> = (0..40)
            .map(|i| {
                (NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + Duration::days(i))
                    .format("%Y-%m-%d")
                    .to_string()
            })
            .collect();
        let values: Vec<f64> = (0..40).map(f64::from).collect();
        let df = df!["date" => dates, "sales" => values].unwrap();

        let analysis = analyze_timeseries(&df, "date", "sales", &AppConfig::default()).unwrap();
        assert_eq!(analysis.observations, 40);
        assert_eq!(analysis.frequency, Frequency::Daily);
        assert_eq!(analysis.trend.direction, TrendDirection::Increasing);
        assert_eq!(analysis.moving_averages.len(), 2);
        let forecast = analysis.forecast.unwrap();
        assert_eq!(forecast.points.len(), 70);
    }
}
