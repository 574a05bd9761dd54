//! Semantic type inference for freshly parsed columns.
//!
//! Only text columns are candidates for reclassification. Rules run in a
//! fixed priority order and the first match wins:
//! datetime, then categorical, then numeric. Columns that match nothing
//! keep the type the parser gave them.

use crate::config::DetectionConfig;
use crate::error::Result;
use crate::types::{ColumnInference, InferenceRule, SemanticType};
use crate::utils::{
    DATETIME_DTYPE, categorical_dtype, datetime_series, dtype_name, is_numeric_dtype,
    parse_datetime_flexible, parse_datetime_with_format, parse_numeric_string, to_epoch_ms,
};
use polars::prelude::*;
use tracing::debug;

/// Infer the semantic type of one column without converting it.
pub fn infer_column(series: &Series, config: &DetectionConfig) -> ColumnInference {
    let column = series.name().to_string();
    let original_dtype = dtype_name(series.dtype());

    let decided = if series.dtype() == &DataType::String {
        infer_text_column(series, config)
    } else {
        None
    };

    let (semantic_type, rule, confidence) = decided
        .unwrap_or_else(|| (parsed_semantic_type(series.dtype()), InferenceRule::Unchanged, 1.0));

    ColumnInference {
        column,
        original_dtype,
        semantic_type,
        rule,
        confidence,
    }
}

/// Infer every column and convert the ones that were reclassified.
pub fn infer_and_convert(
    mut df: DataFrame,
    config: &DetectionConfig,
) -> Result<(DataFrame, Vec<ColumnInference>)> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let mut inferences = Vec::with_capacity(names.len());

    for name in &names {
        let series = df.column(name)?.as_materialized_series().clone();
        let inference = infer_column(&series, config);

        let converted = match (&inference.rule, inference.semantic_type) {
            (InferenceRule::Unchanged, _) => None,
            (_, SemanticType::Datetime) => Some(convert_to_datetime(
                &series,
                &config.datetime_formats,
                config.datetime_success_rate,
            )?),
            (_, SemanticType::Categorical) => Some(series.cast(&categorical_dtype())?),
            (_, SemanticType::Float) => Some(coerce_numeric(&series)?),
            _ => None,
        };

        if let Some(converted) = converted {
            debug!(
                "Column '{}': {} -> {} ({:?}, confidence {:.2})",
                name,
                inference.original_dtype,
                inference.semantic_type,
                inference.rule,
                inference.confidence
            );
            df.replace(name, converted)?;
        }
        inferences.push(inference);
    }

    Ok((df, inferences))
}

fn infer_text_column(
    series: &Series,
    config: &DetectionConfig,
) -> Option<(SemanticType, InferenceRule, f64)> {
    let str_series = series.str().ok()?;

    let present: Vec<&str> = str_series
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "None")
        .collect();

    if let Some(found) = detect_datetime(&present, config) {
        return Some(found);
    }

    let unique_count = series.drop_nulls().n_unique().ok()?;
    let total = series.len();
    if unique_count > 0
        && unique_count <= config.categorical_threshold
        && (unique_count as f64) <= total as f64 * config.categorical_max_ratio
    {
        return Some((
            SemanticType::Categorical,
            InferenceRule::Cardinality,
            unique_count as f64 / total as f64,
        ));
    }

    let sample: Vec<&str> = str_series
        .into_iter()
        .flatten()
        .take(config.sample_size)
        .collect();
    if sample.is_empty() {
        return None;
    }
    let parsed = sample
        .iter()
        .filter(|v| parse_numeric_string(v).is_some())
        .count();
    let rate = parsed as f64 / sample.len() as f64;
    if rate >= config.numeric_success_rate {
        return Some((SemanticType::Float, InferenceRule::NumericCoercion, rate));
    }

    None
}

fn detect_datetime(
    present: &[&str],
    config: &DetectionConfig,
) -> Option<(SemanticType, InferenceRule, f64)> {
    if present.is_empty() {
        return None;
    }
    let sample = &present[..present.len().min(config.sample_size)];

    for format in &config.datetime_formats {
        if sample
            .iter()
            .all(|v| parse_datetime_with_format(v, format).is_some())
        {
            return Some((
                SemanticType::Datetime,
                InferenceRule::ExplicitFormat(format.clone()),
                1.0,
            ));
        }
    }

    let parsed = sample
        .iter()
        .filter(|v| parse_datetime_flexible(v).is_some())
        .count();
    let rate = parsed as f64 / sample.len() as f64;
    (rate >= config.datetime_success_rate)
        .then_some((SemanticType::Datetime, InferenceRule::FormatFree, rate))
}

fn parsed_semantic_type(dtype: &DataType) -> SemanticType {
    match dtype {
        DataType::Float32 | DataType::Float64 => SemanticType::Float,
        d if is_numeric_dtype(d) => SemanticType::Integer,
        DataType::Boolean => SemanticType::Boolean,
        DataType::Datetime(_, _) | DataType::Date => SemanticType::Datetime,
        DataType::Categorical(_, _) => SemanticType::Categorical,
        _ => SemanticType::Text,
    }
}

/// Convert a column to datetime.
///
/// Each explicit pattern is tried over the whole column and the first one
/// that parses at least `min_success_rate` of the non-null values wins;
/// otherwise values are parsed format-free. Unparseable values become null.
pub(crate) fn convert_to_datetime(
    series: &Series,
    formats: &[String],
    min_success_rate: f64,
) -> Result<Series> {
    if crate::utils::is_datetime_dtype(series.dtype()) {
        return Ok(series.cast(&DATETIME_DTYPE)?);
    }

    let text = series.cast(&DataType::String)?;
    let values: Vec<Option<&str>> = text
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !crate::utils::is_null_sentinel(s)))
        .collect();
    let non_null = values.iter().flatten().count();

    if non_null > 0 {
        for format in formats {
            let parsed: Vec<Option<i64>> = values
                .iter()
                .map(|v| v.and_then(|s| parse_datetime_with_format(s, format)).map(to_epoch_ms))
                .collect();
            let success = parsed.iter().flatten().count() as f64 / non_null as f64;
            if success >= min_success_rate {
                return Ok(datetime_series(series.name().clone(), parsed)?);
            }
        }
    }

    let parsed: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.and_then(parse_datetime_flexible).map(to_epoch_ms))
        .collect();
    Ok(datetime_series(series.name().clone(), parsed)?)
}

/// Coerce a text column to Float64; unparseable values become null.
pub(crate) fn coerce_numeric(series: &Series) -> Result<Series> {
    if is_numeric_dtype(series.dtype()) {
        return Ok(series.cast(&DataType::Float64)?);
    }
    let text = series.cast(&DataType::String)?;
    let values: Vec<Option<f64>> = text
        .str()?
        .into_iter()
        .map(|v| v.and_then(parse_numeric_string))
        .collect();
    Ok(Series::new(series.name().clone(), values))
}
