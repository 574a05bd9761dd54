//! Audit records for committed preprocessing operations.

use super::operations::{ConversionTarget, DuplicateKeep};
use crate::analysis::outliers::{OutlierBounds, OutlierMethod};
use serde::{Deserialize, Serialize};

/// `(rows, columns)`.
pub type Shape = (usize, usize);

/// One committed operation and when it ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    #[serde(flatten)]
    pub kind: OperationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationKind {
    MissingValueHandling {
        column: String,
        method: String,
        original_missing_count: usize,
        final_missing_count: usize,
        processed_count: usize,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        fill_value: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        rows_removed: Option<usize>,
    },
    OutlierRemoval {
        column: String,
        method: OutlierMethod,
        outlier_count: usize,
        rows_removed: usize,
        original_shape: Shape,
        final_shape: Shape,
        bounds: OutlierBounds,
    },
    #[serde(rename = "data_type_conversion")]
    TypeConversion {
        column: String,
        original_type: String,
        target_type: ConversionTarget,
        final_type: String,
        /// Values that became null during conversion.
        conversion_errors: usize,
    },
    DuplicateRemoval {
        method: DuplicateKeep,
        rows_removed: usize,
        original_shape: Shape,
        final_shape: Shape,
    },
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::MissingValueHandling { .. } => "missing_value_handling",
            OperationKind::OutlierRemoval { .. } => "outlier_removal",
            OperationKind::TypeConversion { .. } => "data_type_conversion",
            OperationKind::DuplicateRemoval { .. } => "duplicate_removal",
        }
    }
}

impl OperationRecord {
    /// Stamp an operation with the current local time.
    pub fn now(kind: OperationKind) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            kind,
        }
    }

    /// Human-readable lines for the history report.
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();
        match &self.kind {
            OperationKind::MissingValueHandling {
                column,
                method,
                processed_count,
                fill_value,
                rows_removed,
                ..
            } => {
                lines.push(format!("Column: {column}"));
                lines.push(format!("Method: {method}"));
                lines.push(format!("Processed: {processed_count}"));
                if let Some(rows) = rows_removed {
                    lines.push(format!("Rows removed: {rows}"));
                }
                if let Some(value) = fill_value {
                    lines.push(format!("Fill value: {value}"));
                }
            }
            OperationKind::OutlierRemoval {
                column,
                method,
                outlier_count,
                ..
            } => {
                lines.push(format!("Column: {column}"));
                lines.push(format!("Method: {method}"));
                lines.push(format!("Removed: {outlier_count}"));
            }
            OperationKind::TypeConversion {
                column,
                original_type,
                target_type,
                conversion_errors,
                ..
            } => {
                lines.push(format!("Column: {column}"));
                lines.push(format!("Conversion: {original_type} -> {target_type}"));
                if *conversion_errors > 0 {
                    lines.push(format!("Conversion errors: {conversion_errors}"));
                }
            }
            OperationKind::DuplicateRemoval {
                method,
                rows_removed,
                ..
            } => {
                lines.push(format!("Method: {method}"));
                lines.push(format!("Removed: {rows_removed}"));
            }
        }
        lines.into_iter().map(|line| line + "\n").collect()
    }
}
