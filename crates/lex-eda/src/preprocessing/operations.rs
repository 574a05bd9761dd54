//! Table transformations. Each returns a new table plus its record and
//! never mutates the input.

use super::record::{OperationKind, OperationRecord, Shape};
use crate::analysis::outliers::{OutlierMethod, outlier_mask};
use crate::error::{EdaError, Result};
use crate::profiler::statistics::value_counts;
use crate::profiler::type_inference::{coerce_numeric, convert_to_datetime};
use crate::utils::{
    categorical_dtype, collect_sample_values, dtype_name, format_timestamp,
    is_datetime_dtype, is_numeric_dtype, non_null_numeric, numeric_values, parse_boolean_string,
    parse_datetime_flexible, parse_numeric_string, quantile_sorted, sort_f64, string_values,
    timestamps_ms, to_epoch_ms, unique_rows,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// =============================================================================
// Parameters
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValueMethod {
    DropRows,
    Mean,
    Median,
    Mode,
    ForwardFill,
    BackwardFill,
    /// Fill with a user-supplied value, coerced to the column's type.
    Custom(String),
}

impl MissingValueMethod {
    pub fn label(&self) -> &'static str {
        match self {
            MissingValueMethod::DropRows => "drop",
            MissingValueMethod::Mean => "mean",
            MissingValueMethod::Median => "median",
            MissingValueMethod::Mode => "mode",
            MissingValueMethod::ForwardFill => "ffill",
            MissingValueMethod::BackwardFill => "bfill",
            MissingValueMethod::Custom(_) => "custom",
        }
    }
}

impl FromStr for MissingValueMethod {
    type Err = EdaError;

    /// Accepts the labels plus `custom:<value>`.
    fn from_str(s: &str) -> Result<Self> {
        if let Some((head, value)) = s.split_once(':')
            && head.trim().eq_ignore_ascii_case("custom")
        {
            return Ok(MissingValueMethod::Custom(value.to_string()));
        }
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "drop" | "drop_rows" | "dropna" => Ok(MissingValueMethod::DropRows),
            "mean" => Ok(MissingValueMethod::Mean),
            "median" => Ok(MissingValueMethod::Median),
            "mode" => Ok(MissingValueMethod::Mode),
            "ffill" | "forward_fill" => Ok(MissingValueMethod::ForwardFill),
            "bfill" | "backward_fill" => Ok(MissingValueMethod::BackwardFill),
            _ => Err(EdaError::UnknownMethod {
                family: "missing value".to_string(),
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionTarget {
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "float64")]
    Float64,
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "datetime")]
    Datetime,
    #[serde(rename = "category")]
    Categorical,
    #[serde(rename = "bool")]
    Boolean,
}

impl ConversionTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversionTarget::Int64 => "int64",
            ConversionTarget::Float64 => "float64",
            ConversionTarget::Text => "text",
            ConversionTarget::Datetime => "datetime",
            ConversionTarget::Categorical => "category",
            ConversionTarget::Boolean => "bool",
        }
    }
}

impl fmt::Display for ConversionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionTarget {
    type Err = EdaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int64" | "int" | "integer" => Ok(ConversionTarget::Int64),
            "float64" | "float" | "numeric" => Ok(ConversionTarget::Float64),
            "text" | "str" | "string" => Ok(ConversionTarget::Text),
            "datetime" | "datetime64" | "date" => Ok(ConversionTarget::Datetime),
            "category" | "categorical" => Ok(ConversionTarget::Categorical),
            "bool" | "boolean" => Ok(ConversionTarget::Boolean),
            _ => Err(EdaError::UnsupportedTarget(s.to_string())),
        }
    }
}

/// Which occurrence of a duplicated row survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicateKeep {
    #[default]
    #[serde(rename = "keep_first")]
    First,
    #[serde(rename = "keep_last")]
    Last,
}

impl fmt::Display for DuplicateKeep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DuplicateKeep::First => "keep_first",
            DuplicateKeep::Last => "keep_last",
        })
    }
}

impl FromStr for DuplicateKeep {
    type Err = EdaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "keep_first" => Ok(DuplicateKeep::First),
            "last" | "keep_last" => Ok(DuplicateKeep::Last),
            _ => Err(EdaError::UnknownMethod {
                family: "duplicate".to_string(),
                name: s.to_string(),
            }),
        }
    }
}

/// A column with missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValueInfo {
    pub column: String,
    pub missing_count: usize,
    pub missing_percentage: f64,
    pub dtype: String,
    pub sample_values: Vec<String>,
}

// =============================================================================
// Fill Values
// =============================================================================

/// A fill value already coerced to the column's type.
#[derive(Debug, Clone, PartialEq)]
enum FillValue {
    Number(f64),
    Text(String),
    Bool(bool),
    /// Milliseconds since the epoch.
    Timestamp(i64),
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillValue::Number(v) => write!(f, "{v}"),
            FillValue::Text(s) => f.write_str(s),
            FillValue::Bool(b) => write!(f, "{b}"),
            FillValue::Timestamp(ms) => f.write_str(&format_timestamp(*ms)),
        }
    }
}

fn coerce_custom_value(series: &Series, raw: &str) -> Result<FillValue> {
    let dtype = series.dtype();
    let invalid = || EdaError::InvalidCustomValue {
        column: series.name().to_string(),
        value: raw.to_string(),
        dtype: dtype_name(dtype),
    };

    if is_numeric_dtype(dtype) {
        parse_numeric_string(raw)
            .map(FillValue::Number)
            .ok_or_else(invalid)
    } else if is_datetime_dtype(dtype) {
        parse_datetime_flexible(raw.trim())
            .map(|dt| FillValue::Timestamp(to_epoch_ms(dt)))
            .ok_or_else(invalid)
    } else if matches!(dtype, DataType::Boolean) {
        parse_boolean_string(raw)
            .map(FillValue::Bool)
            .ok_or_else(invalid)
    } else {
        Ok(FillValue::Text(raw.to_string()))
    }
}

fn numeric_statistic(series: &Series, method: &MissingValueMethod) -> Result<FillValue> {
    if !is_numeric_dtype(series.dtype()) {
        return Err(EdaError::type_mismatch(
            series.name().as_str(),
            "numeric",
            series.dtype(),
        ));
    }
    let mut values: Vec<f64> = non_null_numeric(series)?
        .into_iter()
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Err(EdaError::NoValidValues(series.name().to_string()));
    }
    let value = match method {
        MissingValueMethod::Median => {
            sort_f64(&mut values);
            quantile_sorted(&values, 0.5)
        }
        _ => crate::utils::mean(&values),
    };
    Ok(FillValue::Number(value))
}

/// Most frequent value of a sorted slice; ties go to the smallest.
fn sorted_mode<T: PartialEq + Copy>(sorted: &[T]) -> Option<T> {
    let mut best: Option<(T, usize)> = None;
    let mut idx = 0;
    while idx < sorted.len() {
        let value = sorted[idx];
        let run = sorted[idx..].iter().take_while(|v| **v == value).count();
        if best.is_none_or(|(_, count)| run > count) {
            best = Some((value, run));
        }
        idx += run;
    }
    best.map(|(value, _)| value)
}

fn mode_value(series: &Series) -> Result<FillValue> {
    let dtype = series.dtype();
    let mode = if is_numeric_dtype(dtype) {
        let mut values = non_null_numeric(series)?;
        sort_f64(&mut values);
        sorted_mode(&values).map(FillValue::Number)
    } else if is_datetime_dtype(dtype) {
        let mut values: Vec<i64> = timestamps_ms(series)?.into_iter().flatten().collect();
        values.sort_unstable();
        sorted_mode(&values).map(FillValue::Timestamp)
    } else if matches!(dtype, DataType::Boolean) {
        let mut values: Vec<bool> = series.bool()?.into_iter().flatten().collect();
        values.sort_unstable();
        sorted_mode(&values).map(FillValue::Bool)
    } else {
        value_counts(series)?
            .into_iter()
            .next()
            .map(|top| FillValue::Text(top.value))
    };
    mode.ok_or_else(|| EdaError::NoValidValues(series.name().to_string()))
}

/// Replace the nulls of `series` with `value`.
///
/// Integer columns stay integer when the fill value is integral;
/// categorical columns stay categorical.
fn fill_series(series: &Series, value: &FillValue) -> Result<Series> {
    let name = series.name().clone();
    let dtype = series.dtype();
    let filled = match value {
        FillValue::Number(v) if dtype.is_integer() && v.fract() == 0.0 => {
            let fill = *v as i64;
            let values: Vec<Option<i64>> = series
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .map(|x| Some(x.unwrap_or(fill)))
                .collect();
            Series::new(name, values)
        }
        FillValue::Number(v) => {
            let values: Vec<Option<f64>> = numeric_values(series)?
                .into_iter()
                .map(|x| Some(x.unwrap_or(*v)))
                .collect();
            Series::new(name, values)
        }
        FillValue::Bool(b) => {
            let values: Vec<Option<bool>> = series
                .bool()?
                .into_iter()
                .map(|x| Some(x.unwrap_or(*b)))
                .collect();
            Series::new(name, values)
        }
        FillValue::Timestamp(ms) => {
            let values = timestamps_ms(series)?
                .into_iter()
                .map(|x| Some(x.unwrap_or(*ms)))
                .collect();
            crate::utils::datetime_series(name, values)?
        }
        FillValue::Text(s) => {
            let values: Vec<Option<String>> = string_values(series)?
                .into_iter()
                .map(|x| Some(x.unwrap_or_else(|| s.clone())))
                .collect();
            let text = Series::new(name, values);
            if matches!(dtype, DataType::Categorical(_, _)) {
                text.cast(&categorical_dtype())?
            } else {
                text
            }
        }
    };
    Ok(filled)
}

// =============================================================================
// Operations
// =============================================================================

fn shape(df: &DataFrame) -> Shape {
    (df.height(), df.width())
}

fn get_series<'a>(df: &'a DataFrame, column: &str) -> Result<&'a Series> {
    Ok(df
        .column(column)
        .map_err(|_| EdaError::ColumnNotFound(column.to_string()))?
        .as_materialized_series())
}

fn keep_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), keep);
    Ok(df.filter(&mask)?)
}

/// Drop or fill the missing values of one column.
pub fn handle_missing_values(
    df: &DataFrame,
    column: &str,
    method: &MissingValueMethod,
) -> Result<(DataFrame, OperationRecord)> {
    let series = get_series(df, column)?;
    let original_missing_count = series.null_count();

    let (filled, fill_value) = match method {
        MissingValueMethod::DropRows => return drop_missing_rows(df, column, series),
        MissingValueMethod::ForwardFill => {
            (series.fill_null(FillNullStrategy::Forward(None))?, None)
        }
        MissingValueMethod::BackwardFill => {
            (series.fill_null(FillNullStrategy::Backward(None))?, None)
        }
        MissingValueMethod::Mean | MissingValueMethod::Median => {
            let value = numeric_statistic(series, method)?;
            (fill_series(series, &value)?, Some(value))
        }
        MissingValueMethod::Mode => {
            let value = mode_value(series)?;
            (fill_series(series, &value)?, Some(value))
        }
        MissingValueMethod::Custom(raw) => {
            let value = coerce_custom_value(series, raw)?;
            (fill_series(series, &value)?, Some(value))
        }
    };

    let final_missing_count = filled.null_count();
    debug!(
        column,
        method = method.label(),
        filled = original_missing_count - final_missing_count,
        "Filled missing values"
    );

    let mut result = df.clone();
    result.replace(column, filled)?;
    let record = OperationRecord::now(OperationKind::MissingValueHandling {
        column: column.to_string(),
        method: method.label().to_string(),
        original_missing_count,
        final_missing_count,
        processed_count: original_missing_count - final_missing_count,
        fill_value: fill_value.map(|v| v.to_string()),
        rows_removed: None,
    });
    Ok((result, record))
}

fn drop_missing_rows(
    df: &DataFrame,
    column: &str,
    series: &Series,
) -> Result<(DataFrame, OperationRecord)> {
    let original_missing_count = series.null_count();
    let keep: Vec<bool> = series
        .is_not_null()
        .into_iter()
        .map(|v| v.unwrap_or(false))
        .collect();
    let result = keep_rows(df, &keep)?;
    let record = OperationRecord::now(OperationKind::MissingValueHandling {
        column: column.to_string(),
        method: MissingValueMethod::DropRows.label().to_string(),
        original_missing_count,
        final_missing_count: 0,
        processed_count: original_missing_count,
        fill_value: None,
        rows_removed: Some(df.height() - result.height()),
    });
    Ok((result, record))
}

/// Remove the rows whose value in `column` is an outlier.
pub fn remove_outliers(
    df: &DataFrame,
    column: &str,
    method: OutlierMethod,
) -> Result<(DataFrame, OperationRecord)> {
    let (mask, bounds) = outlier_mask(df, column, method)?;
    let keep: Vec<bool> = mask.iter().map(|is_outlier| !is_outlier).collect();
    let result = keep_rows(df, &keep)?;

    let record = OperationRecord::now(OperationKind::OutlierRemoval {
        column: column.to_string(),
        method,
        outlier_count: mask.iter().filter(|m| **m).count(),
        rows_removed: df.height() - result.height(),
        original_shape: shape(df),
        final_shape: shape(&result),
        bounds,
    });
    Ok((result, record))
}

/// Convert one column to `target`.
///
/// Values that cannot be converted become null and are counted as
/// conversion errors in the record.
pub fn convert_type(
    df: &DataFrame,
    column: &str,
    target: ConversionTarget,
) -> Result<(DataFrame, OperationRecord)> {
    let series = get_series(df, column)?;
    let converted = convert_series(series, target)?;
    let conversion_errors = converted.null_count().saturating_sub(series.null_count());

    let record = OperationRecord::now(OperationKind::TypeConversion {
        column: column.to_string(),
        original_type: dtype_name(series.dtype()),
        target_type: target,
        final_type: dtype_name(converted.dtype()),
        conversion_errors,
    });

    let mut result = df.clone();
    result.replace(column, converted)?;
    Ok((result, record))
}

fn convert_series(series: &Series, target: ConversionTarget) -> Result<Series> {
    let name = series.name().clone();
    let dtype = series.dtype();
    let converted = match target {
        ConversionTarget::Float64 => as_float(series)?,
        ConversionTarget::Int64 => {
            let floats = as_float(series)?;
            let values: Vec<Option<i64>> = floats
                .f64()?
                .into_iter()
                .map(|v| {
                    v.filter(|x| x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64)
                        .map(|x| x as i64)
                })
                .collect();
            Series::new(name, values)
        }
        ConversionTarget::Text => series.cast(&DataType::String)?,
        ConversionTarget::Datetime => convert_to_datetime(series, &[], 1.0)?,
        ConversionTarget::Categorical => {
            series.cast(&DataType::String)?.cast(&categorical_dtype())?
        }
        ConversionTarget::Boolean => match dtype {
            DataType::Boolean => series.clone(),
            dtype if is_numeric_dtype(dtype) => {
                let values: Vec<Option<bool>> = numeric_values(series)?
                    .into_iter()
                    .map(|v| match v {
                        Some(x) if x == 1.0 => Some(true),
                        Some(x) if x == 0.0 => Some(false),
                        _ => None,
                    })
                    .collect();
                Series::new(name, values)
            }
            _ => {
                let values: Vec<Option<bool>> = string_values(series)?
                    .into_iter()
                    .map(|v| v.as_deref().and_then(parse_boolean_string))
                    .collect();
                Series::new(name, values)
            }
        },
    };
    Ok(converted)
}

fn as_float(series: &Series) -> Result<Series> {
    match series.dtype() {
        DataType::Boolean => Ok(series.cast(&DataType::Float64)?),
        dtype if is_datetime_dtype(dtype) => {
            let values: Vec<Option<f64>> = timestamps_ms(series)?
                .into_iter()
                .map(|v| v.map(|ms| ms as f64))
                .collect();
            Ok(Series::new(series.name().clone(), values))
        }
        _ => coerce_numeric(series),
    }
}

/// Drop duplicate rows, keeping the first or last occurrence in place.
pub fn remove_duplicates(
    df: &DataFrame,
    keep: DuplicateKeep,
) -> Result<(DataFrame, OperationRecord)> {
    let result = unique_rows(df, keep == DuplicateKeep::Last)?;
    let record = OperationRecord::now(OperationKind::DuplicateRemoval {
        method: keep,
        rows_removed: df.height() - result.height(),
        original_shape: shape(df),
        final_shape: shape(&result),
    });
    Ok((result, record))
}

/// Columns that contain at least one missing value, in column order.
pub fn detect_missing_values(df: &DataFrame) -> Vec<MissingValueInfo> {
    let height = df.height();
    df.get_columns()
        .iter()
        .map(|c| c.as_materialized_series())
        .filter(|s| s.null_count() > 0)
        .map(|s| MissingValueInfo {
            column: s.name().to_string(),
            missing_count: s.null_count(),
            missing_percentage: s.null_count() as f64 / height.max(1) as f64 * 100.0,
            dtype: dtype_name(s.dtype()),
            sample_values: collect_sample_values(s, 5),
        })
        .collect()
}
