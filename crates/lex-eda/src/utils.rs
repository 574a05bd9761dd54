//! Shared utilities for the analysis core.
//!
//! This module contains the helpers used across ingestion, profiling,
//! analysis and preprocessing: dtype classification, value extraction from
//! polars series, order statistics, and string parsing for numbers,
//! booleans and dates.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::cmp::Ordering;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for analysis purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Date or datetime types
    Datetime,
    /// Boolean type
    Boolean,
    /// Free text
    Text,
    /// Dictionary-encoded categories
    Categorical,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a date or datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if is_datetime_dtype(dtype) {
        DtypeCategory::Datetime
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String) {
        DtypeCategory::Text
    } else if matches!(dtype, DataType::Categorical(_, _)) {
        DtypeCategory::Categorical
    } else {
        DtypeCategory::Other
    }
}

/// Short, stable name for a dtype used in reports and records.
pub fn dtype_name(dtype: &DataType) -> String {
    match dtype {
        DataType::Boolean => "bool".to_string(),
        DataType::String => "str".to_string(),
        DataType::Categorical(_, _) => "category".to_string(),
        DataType::Datetime(_, _) => "datetime".to_string(),
        DataType::Date => "date".to_string(),
        other if is_numeric_dtype(other) => format!("{other:?}").to_lowercase(),
        other => format!("{other}"),
    }
}

/// The dtype used for categorical columns.
pub fn categorical_dtype() -> DataType {
    DataType::from_categories(Categories::global())
}

/// The dtype used for datetime columns.
pub const DATETIME_DTYPE: DataType = DataType::Datetime(TimeUnit::Milliseconds, None);

// =============================================================================
// Value Extraction
// =============================================================================

/// Numeric values of a series, nulls preserved. Non-numeric casts fail.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Non-null numeric values of a series, in row order.
pub fn non_null_numeric(series: &Series) -> PolarsResult<Vec<f64>> {
    Ok(numeric_values(series)?.into_iter().flatten().collect())
}

/// String rendering of every value, nulls preserved.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Millisecond timestamps of a date/datetime series, nulls preserved.
pub fn timestamps_ms(series: &Series) -> PolarsResult<Vec<Option<i64>>> {
    let casted = series.cast(&DATETIME_DTYPE)?;
    Ok(casted.datetime()?.physical().into_iter().collect())
}

/// Build a datetime series from millisecond timestamps.
pub fn datetime_series(name: PlSmallStr, values: Vec<Option<i64>>) -> PolarsResult<Series> {
    Series::new(name, values).cast(&DATETIME_DTYPE)
}

/// Collect up to `max_samples` non-null values rendered as strings.
pub fn collect_sample_values(series: &Series, max_samples: usize) -> Vec<String> {
    string_values(series)
        .map(|values| values.into_iter().flatten().take(max_samples).collect())
        .unwrap_or_default()
}

// =============================================================================
// Row Utilities
// =============================================================================

/// Drop duplicate rows, keeping the first occurrence (or the last when
/// `keep_last` is set) in the original row order.
///
/// Equality follows polars grouping: nulls match nulls, NaN matches NaN
/// and `-0.0` matches `0.0`.
pub fn unique_rows(df: &DataFrame, keep_last: bool) -> PolarsResult<DataFrame> {
    if df.width() == 0 {
        return Ok(df.clone());
    }
    let keep = if keep_last {
        UniqueKeepStrategy::Last
    } else {
        UniqueKeepStrategy::First
    };
    df.unique_stable(None, keep, None)
}

// =============================================================================
// Order Statistics
// =============================================================================

/// Sort floats ascending; NaN compares equal so the sort never panics.
pub fn sort_f64(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
}

/// Linearly interpolated quantile of sorted values.
pub fn quantile_sorted(values: &[f64], quantile: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let pos = quantile.clamp(0.0, 1.0) * (values.len() as f64 - 1.0);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return values[lower];
    }
    let weight = pos - lower as f64;
    values[lower] + (values[upper] - values[lower]) * weight
}

/// Median absolute deviation around `median`.
pub fn median_absolute_deviation(values: &[f64], median: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
    sort_f64(&mut deviations);
    quantile_sorted(&deviations, 0.5)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with `ddof` delta degrees of freedom.
pub fn std_dev(values: &[f64], ddof: usize) -> f64 {
    let n = values.len();
    if n <= ddof {
        return f64::NAN;
    }
    let m = mean(values);
    let ss = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    (ss / (n - ddof) as f64).sqrt()
}

/// Adjusted Fisher-Pearson sample skewness (G1).
///
/// `None` below three values; zero for constant data.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let m = mean(values);
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / nf;
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / nf;
    if m2 <= f64::EPSILON * m.abs().max(1.0) {
        return Some(0.0);
    }
    Some((nf * (nf - 1.0)).sqrt() / (nf - 2.0) * m3 / m2.powf(1.5))
}

/// Bias-corrected sample excess kurtosis (G2).
///
/// `None` below four values; zero for constant data.
pub fn kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 4 {
        return None;
    }
    let nf = n as f64;
    let m = mean(values);
    let s2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    let s4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>();
    if s2 <= f64::EPSILON * m.abs().max(1.0) {
        return Some(0.0);
    }
    let adj = (nf + 1.0) * nf * (nf - 1.0) / ((nf - 2.0) * (nf - 3.0));
    let correction = 3.0 * (nf - 1.0).powi(2) / ((nf - 2.0) * (nf - 3.0));
    Some(adj * s4 / (s2 * s2) - correction)
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Tokens read as missing on ingestion.
pub const NULL_SENTINELS: [&str; 6] = ["", "None", "null", "NULL", "nan", "NaN"];

/// Check if a trimmed string is a null sentinel.
pub fn is_null_sentinel(s: &str) -> bool {
    NULL_SENTINELS.contains(&s.trim())
}

/// Parse a string as a number the way coercion does: trimmed, plain
/// decimal or scientific notation. NaN is never a successful parse.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Common boolean true representations.
pub const BOOLEAN_TRUE_VALUES: [&str; 5] = ["true", "t", "yes", "y", "1"];

/// Common boolean false representations.
pub const BOOLEAN_FALSE_VALUES: [&str; 5] = ["false", "f", "no", "n", "0"];

/// Parse a boolean token, case-insensitive.
pub fn parse_boolean_string(s: &str) -> Option<bool> {
    let lower = s.trim().to_ascii_lowercase();
    if BOOLEAN_TRUE_VALUES.contains(&lower.as_str()) {
        Some(true)
    } else if BOOLEAN_FALSE_VALUES.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}

// =============================================================================
// Datetime Parsing Utilities
// =============================================================================

static DATETIME_FORMATS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%d.%m.%Y %H:%M:%S",
        "%d.%m.%Y %H:%M",
    ]
});

static DATE_FORMATS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%Y.%m.%d",
        "%m/%d/%Y",
        "%d.%m.%Y",
        "%b %d, %Y",
        "%B %d, %Y",
        "%b %d %Y",
        "%d %b %Y",
        "%d %B %Y",
    ]
});

static COMPACT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(19|20)\d{6}$").expect("Invalid regex: YYYYMMDD"));

/// Parse a string with one explicit chrono pattern.
///
/// Patterns without time fields parse to midnight.
pub fn parse_datetime_with_format(s: &str, format: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    NaiveDateTime::parse_from_str(trimmed, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse a string as a date or datetime without a known format.
///
/// Accepts RFC 3339 and the common ISO, slash, dotted and month-name
/// layouts. Plain numbers are never dates, except eight-digit `YYYYMMDD`
/// values in the 1900-2099 range.
pub fn parse_datetime_flexible(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if trimmed.is_empty() || !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        if COMPACT_DATE.is_match(trimmed) {
            return NaiveDate::parse_from_str(trimmed, "%Y%m%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0));
        }
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Milliseconds since the epoch of a naive (UTC) datetime.
#[inline]
pub fn to_epoch_ms(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

/// Naive datetime of a millisecond timestamp.
pub fn from_epoch_ms(ms: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Render a millisecond timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp_ms.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_dtype_category() {
        assert_eq!(get_dtype_category(&DataType::Int64), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::Date), DtypeCategory::Datetime);
        assert_eq!(get_dtype_category(&DataType::Boolean), DtypeCategory::Boolean);
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::Text);
        assert_eq!(
            get_dtype_category(&categorical_dtype()),
            DtypeCategory::Categorical
        );
    }

    #[test]
    fn test_dtype_name() {
        assert_eq!(dtype_name(&DataType::Int64), "int64");
        assert_eq!(dtype_name(&DataType::Float64), "float64");
        assert_eq!(dtype_name(&DataType::String), "str");
        assert_eq!(dtype_name(&DATETIME_DTYPE), "datetime");
    }

    #[test]
    fn test_quantile_sorted_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        assert_eq!(quantile_sorted(&values, 0.25), 2.25);
        assert_eq!(quantile_sorted(&values, 0.5), 3.5);
        assert_eq!(quantile_sorted(&values, 0.75), 4.75);
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn test_median_absolute_deviation() {
        let values = [1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0];
        assert_eq!(median_absolute_deviation(&values, 2.0), 1.0);
        assert_eq!(median_absolute_deviation(&[5.0, 5.0, 5.0], 5.0), 0.0);
    }

    #[test]
    fn test_std_dev_ddof() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&values, 0) - 2.0).abs() < 1e-12);
        assert!((std_dev(&values, 1) - 2.138_089_935).abs() < 1e-6);
        assert!(std_dev(&[1.0], 1).is_nan());
    }

    #[test]
    fn test_skewness_and_kurtosis() {
        let symmetric = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(skewness(&symmetric).unwrap().abs() < 1e-12);
        assert!((kurtosis(&symmetric).unwrap() - -1.2).abs() < 1e-9);
        assert_eq!(skewness(&[1.0, 2.0]), None);
        assert_eq!(kurtosis(&[3.0, 3.0, 3.0, 3.0]), Some(0.0));
        assert!(skewness(&[1.0, 2.0, 3.0, 10.0]).unwrap() > 0.0);
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("42"), Some(42.0));
        assert_eq!(parse_numeric_string(" -1.5e3 "), Some(-1500.0));
        assert_eq!(parse_numeric_string("NaN"), None);
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string("12 apples"), None);
    }

    #[test]
    fn test_parse_boolean_string() {
        assert_eq!(parse_boolean_string("Yes"), Some(true));
        assert_eq!(parse_boolean_string("0"), Some(false));
        assert_eq!(parse_boolean_string("maybe"), None);
    }

    #[test]
    fn test_null_sentinels() {
        assert!(is_null_sentinel("None"));
        assert!(is_null_sentinel("  "));
        assert!(!is_null_sentinel("none"));
    }

    #[test]
    fn test_parse_datetime_flexible() {
        let expected = NaiveDate::from_ymd_opt(2023, 1, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime_flexible("2023-01-05"), Some(expected));
        assert_eq!(parse_datetime_flexible("2023/01/05"), Some(expected));
        assert_eq!(parse_datetime_flexible("01/05/2023"), Some(expected));
        assert_eq!(parse_datetime_flexible("Jan 5, 2023"), Some(expected));
        assert_eq!(parse_datetime_flexible("20230105"), Some(expected));
        assert!(parse_datetime_flexible("2023-01-05T10:30:00Z").is_some());
        assert!(parse_datetime_flexible("2023-01-05 10:30:00").is_some());
        assert_eq!(parse_datetime_flexible("hello"), None);
        assert_eq!(parse_datetime_flexible("42"), None);
        assert_eq!(parse_datetime_flexible("3.14"), None);
    }

    #[test]
    fn test_parse_datetime_with_format() {
        assert!(parse_datetime_with_format("2023-01-05", "%Y-%m-%d").is_some());
        assert!(parse_datetime_with_format("2023-01-05 08:00:00", "%Y-%m-%d %H:%M:%S").is_some());
        assert!(parse_datetime_with_format("05/01/2023", "%Y-%m-%d").is_none());
    }

    #[test]
    fn test_epoch_round_trip() {
        let dt = parse_datetime_flexible("2024-02-29 12:00:00").unwrap();
        assert_eq!(from_epoch_ms(to_epoch_ms(dt)), Some(dt));
        assert_eq!(format_timestamp(to_epoch_ms(dt)), "2024-02-29 12:00:00");
    }

    #[test]
    fn test_value_extraction() {
        let series = Series::new("x".into(), &[Some(1i64), None, Some(3)]);
        assert_eq!(
            numeric_values(&series).unwrap(),
            vec![Some(1.0), None, Some(3.0)]
        );
        assert_eq!(non_null_numeric(&series).unwrap(), vec![1.0, 3.0]);

        let text = Series::new("s".into(), &[Some("a"), None, Some("b")]);
        assert_eq!(collect_sample_values(&text, 5), vec!["a", "b"]);
    }

    #[test]
    fn test_unique_rows_keep_first_and_last() {
        let df = df![
            "a" => [1i64, 2, 1, 3, 2],
            "b" => ["x", "y", "x", "z", "q"],
        ]
        .unwrap();
        let column_a = |keep_last: bool| -> Vec<i64> {
            let unique = unique_rows(&df, keep_last).unwrap();
            unique.column("a").unwrap().i64().unwrap().into_no_null_iter().collect()
        };
        // The repeated (1, "x") row stays at its first or its last position.
        assert_eq!(column_a(false), vec![1, 2, 3, 2]);
        assert_eq!(column_a(true), vec![2, 1, 3, 2]);
    }

    #[test]
    fn test_unique_rows_float_edge_values() {
        let zeros = df!["x" => [0.0f64, -0.0]].unwrap();
        assert_eq!(unique_rows(&zeros, false).unwrap().height(), 1);

        let nans = df!["x" => [f64::NAN, f64::NAN, 1.0]].unwrap();
        assert_eq!(unique_rows(&nans, false).unwrap().height(), 2);
    }

    #[test]
    fn test_unique_rows_null_is_not_text() {
        let df = df!["a" => [Some("null"), None, None]].unwrap();
        let unique = unique_rows(&df, false).unwrap();
        assert_eq!(unique.height(), 2);
        assert_eq!(unique.column("a").unwrap().null_count(), 1);
    }

    #[test]
    fn test_datetime_series_round_trip() {
        let ms = vec![Some(0i64), None, Some(86_400_000)];
        let series = datetime_series("d".into(), ms.clone()).unwrap();
        assert_eq!(series.dtype(), &DATETIME_DTYPE);
        assert_eq!(timestamps_ms(&series).unwrap(), ms);
    }
}
