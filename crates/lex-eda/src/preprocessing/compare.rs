//! Before/after comparison of two tables.

use super::record::Shape;
use crate::utils::dtype_name;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnChange {
    pub column: String,
    pub null_count_before: usize,
    pub null_count_after: usize,
    /// `after - before`; negative when nulls were filled.
    pub null_count_change: i64,
    pub dtype_before: String,
    pub dtype_after: String,
    pub dtype_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableComparison {
    pub shape_before: Shape,
    pub shape_after: Shape,
    /// `after - before` row count.
    pub rows_changed: i64,
    pub memory_before_bytes: usize,
    pub memory_after_bytes: usize,
    /// Columns present in both tables.
    pub columns: Vec<ColumnChange>,
    pub columns_added: Vec<String>,
    pub columns_removed: Vec<String>,
}

/// Compare a table with a transformed version of itself.
pub fn compare_tables(before: &DataFrame, after: &DataFrame) -> TableComparison {
    let mut columns = Vec::new();
    let mut columns_removed = Vec::new();

    for column in before.get_columns() {
        let name = column.name().as_str();
        let Ok(other) = after.column(name) else {
            columns_removed.push(name.to_string());
            continue;
        };
        let dtype_before = dtype_name(column.dtype());
        let dtype_after = dtype_name(other.dtype());
        columns.push(ColumnChange {
            column: name.to_string(),
            null_count_before: column.null_count(),
            null_count_after: other.null_count(),
            null_count_change: other.null_count() as i64 - column.null_count() as i64,
            dtype_changed: dtype_before != dtype_after,
            dtype_before,
            dtype_after,
        });
    }

    let columns_added = after
        .get_column_names_str()
        .into_iter()
        .filter(|name| before.column(name).is_err())
        .map(str::to_string)
        .collect();

    TableComparison {
        shape_before: (before.height(), before.width()),
        shape_after: (after.height(), after.width()),
        rows_changed: after.height() as i64 - before.height() as i64,
        memory_before_bytes: before.estimated_size(),
        memory_after_bytes: after.estimated_size(),
        columns,
        columns_added,
        columns_removed,
    }
}
