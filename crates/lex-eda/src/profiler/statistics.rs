//! Descriptive statistics for individual columns.

use crate::types::{CategoricalSummary, NumericSummary, ValueCount};
use crate::utils::{kurtosis, mean, quantile_sorted, skewness, sort_f64, std_dev};
use polars::prelude::*;

/// Describe a numeric column: count, moments, quartiles and sign counts.
///
/// Infinite values are counted separately and excluded from the moments.
pub(crate) fn numeric_summary(name: &str, values: &[f64]) -> NumericSummary {
    let infinite_count = values.iter().filter(|v| v.is_infinite()).count();
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sort_f64(&mut finite);

    NumericSummary {
        column: name.to_string(),
        count: finite.len(),
        mean: mean(&finite),
        std: std_dev(&finite, 1),
        min: finite.first().copied().unwrap_or(f64::NAN),
        q25: quantile_sorted(&finite, 0.25),
        median: quantile_sorted(&finite, 0.5),
        q75: quantile_sorted(&finite, 0.75),
        max: finite.last().copied().unwrap_or(f64::NAN),
        skewness: skewness(&finite),
        kurtosis: kurtosis(&finite),
        zero_count: values.iter().filter(|v| **v == 0.0).count(),
        negative_count: values.iter().filter(|v| **v < 0.0).count(),
        infinite_count,
    }
}

/// Summarize a text-like column: cardinality and most frequent value.
pub(crate) fn categorical_summary(series: &Series) -> PolarsResult<CategoricalSummary> {
    let total = series.len();
    let missing_count = series.null_count();
    let unique_count = series.drop_nulls().n_unique()?;
    let mode = value_counts(series)?.into_iter().next();

    Ok(CategoricalSummary {
        column: series.name().to_string(),
        missing_count,
        unique_count,
        unique_percentage: if total > 0 {
            unique_count as f64 / total as f64 * 100.0
        } else {
            0.0
        },
        mode_count: mode.as_ref().map_or(0, |top| top.count),
        mode: mode.map(|top| top.value),
    })
}

/// Value counts of the non-null values, rendered as text.
///
/// Sorted by count descending, then value ascending.
pub(crate) fn value_counts(series: &Series) -> PolarsResult<Vec<ValueCount>> {
    let text = series.cast(&DataType::String)?.drop_nulls();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let counts_df = text.value_counts(false, false, "count".into(), false)?;
    let values = counts_df.column(text.name())?.str()?;
    let counts = counts_df.column("count")?.cast(&DataType::UInt64)?;

    let mut entries: Vec<ValueCount> = values
        .into_iter()
        .zip(counts.u64()?)
        .filter_map(|(value, count)| {
            Some(ValueCount {
                value: value?.to_string(),
                count: count? as usize,
            })
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    Ok(entries)
}
