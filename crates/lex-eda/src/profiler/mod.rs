//! Dataset profiling.
//!
//! This module provides:
//! - Semantic type inference for freshly loaded columns
//! - Dataset-level summaries (shape, dtypes, missing values, duplicates)
//! - Per-column descriptive statistics

pub(crate) mod statistics;
pub mod type_inference;

use crate::error::{EdaError, Result};
use crate::types::{
    ColumnDetail, ColumnInfo, DatasetProfile, DtypeSummary, DuplicateSummary, FileInfo,
    MissingColumn, MissingSummary, ShapeInfo,
};
use crate::utils::{
    DtypeCategory, dtype_name, get_dtype_category, non_null_numeric, unique_rows,
};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

pub use type_inference::{infer_and_convert, infer_column};

pub(crate) use statistics::{categorical_summary, numeric_summary, value_counts};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Number of most frequent values shown for non-numeric columns.
const TOP_VALUES: usize = 10;

/// Data profiler producing the basic-statistics view of a table.
pub struct DataProfiler;

impl DataProfiler {
    /// Profile an entire dataset.
    pub fn profile(df: &DataFrame) -> Result<DatasetProfile> {
        let shape = Self::shape(df);
        let dtypes = Self::dtype_summary(df);
        let missing = Self::missing_summary(df);
        let duplicates = Self::duplicate_summary(df)?;

        let mut numeric_summaries = Vec::with_capacity(dtypes.numeric_columns.len());
        for name in &dtypes.numeric_columns {
            let series = df.column(name)?.as_materialized_series();
            numeric_summaries.push(numeric_summary(name, &non_null_numeric(series)?));
        }

        let mut categorical_summaries = Vec::with_capacity(dtypes.categorical_columns.len());
        for name in &dtypes.categorical_columns {
            let series = df.column(name)?.as_materialized_series();
            categorical_summaries.push(categorical_summary(series)?);
        }

        debug!(
            "Profiled {} rows x {} columns ({} numeric, {} categorical)",
            shape.rows,
            shape.columns,
            numeric_summaries.len(),
            categorical_summaries.len()
        );

        Ok(DatasetProfile {
            shape,
            dtypes,
            missing,
            duplicates,
            numeric_summaries,
            categorical_summaries,
        })
    }

    fn shape(df: &DataFrame) -> ShapeInfo {
        ShapeInfo {
            rows: df.height(),
            columns: df.width(),
            memory_usage_mb: memory_usage_mb(df),
        }
    }

    fn dtype_summary(df: &DataFrame) -> DtypeSummary {
        let mut counts = BTreeMap::new();
        let mut numeric_columns = Vec::new();
        let mut categorical_columns = Vec::new();
        let mut datetime_columns = Vec::new();

        for column in df.get_columns() {
            let name = column.name().to_string();
            *counts.entry(dtype_name(column.dtype())).or_insert(0) += 1;
            match get_dtype_category(column.dtype()) {
                DtypeCategory::Numeric => numeric_columns.push(name),
                DtypeCategory::Datetime => datetime_columns.push(name),
                DtypeCategory::Text | DtypeCategory::Categorical | DtypeCategory::Boolean => {
                    categorical_columns.push(name)
                }
                DtypeCategory::Other => {}
            }
        }

        DtypeSummary {
            counts,
            numeric_columns,
            categorical_columns,
            datetime_columns,
        }
    }

    fn missing_summary(df: &DataFrame) -> MissingSummary {
        let rows = df.height();
        let mut per_column: Vec<MissingColumn> = df
            .get_columns()
            .iter()
            .map(|column| MissingColumn {
                column: column.name().to_string(),
                missing_count: column.null_count(),
                missing_percentage: percentage(column.null_count(), rows),
            })
            .collect();
        // Stable sort keeps column order among equal counts.
        per_column.sort_by(|a, b| b.missing_count.cmp(&a.missing_count));

        let total_missing: usize = per_column.iter().map(|c| c.missing_count).sum();
        MissingSummary {
            total_missing,
            missing_percentage: percentage(total_missing, rows * df.width()),
            columns_with_missing: per_column.iter().filter(|c| c.missing_count > 0).count(),
            per_column,
        }
    }

    fn duplicate_summary(df: &DataFrame) -> Result<DuplicateSummary> {
        let unique_count = unique_rows(df, false)?.height();
        let duplicate_count = df.height() - unique_count;
        Ok(DuplicateSummary {
            duplicate_count,
            duplicate_percentage: percentage(duplicate_count, df.height()),
            unique_count,
        })
    }
}

/// Detail view of a single column.
pub fn column_info(df: &DataFrame, column: &str) -> Result<ColumnInfo> {
    let series = df
        .column(column)
        .map_err(|_| EdaError::ColumnNotFound(column.to_string()))?
        .as_materialized_series();

    let top = value_counts(series)?;
    let unique_count = top.len();
    let detail = if get_dtype_category(series.dtype()) == DtypeCategory::Numeric {
        ColumnDetail::Numeric(numeric_summary(column, &non_null_numeric(series)?))
    } else {
        ColumnDetail::Values {
            top_values: top.into_iter().take(TOP_VALUES).collect(),
        }
    };

    Ok(ColumnInfo {
        name: column.to_string(),
        dtype: dtype_name(series.dtype()),
        non_null_count: series.len() - series.null_count(),
        null_count: series.null_count(),
        unique_count,
        detail,
    })
}

/// Summary of a loaded table for display next to the file name.
pub fn file_info(df: &DataFrame, file_name: &str) -> FileInfo {
    FileInfo {
        file_name: file_name.to_string(),
        rows: df.height(),
        columns: df.width(),
        memory_usage_mb: memory_usage_mb(df),
        dtypes: df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), dtype_name(c.dtype())))
            .collect(),
    }
}

fn memory_usage_mb(df: &DataFrame) -> f64 {
    df.estimated_size() as f64 / BYTES_PER_MB
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
