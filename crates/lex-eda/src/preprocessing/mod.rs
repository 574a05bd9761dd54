//! Table transformations with an undoable history.
//!
//! Operations are pure functions of a table; [`Preprocessor`] applies them
//! to its newest snapshot and commits the result only when the operation
//! succeeds, so a failed operation leaves the history untouched.

pub mod compare;
pub mod history;
pub mod operations;
pub mod record;

pub use compare::{ColumnChange, TableComparison, compare_tables};
pub use history::History;
pub use operations::{
    ConversionTarget, DuplicateKeep, MissingValueInfo, MissingValueMethod, convert_type,
    detect_missing_values, handle_missing_values, remove_duplicates, remove_outliers,
};
pub use record::{OperationKind, OperationRecord, Shape};

use crate::analysis::outliers::OutlierMethod;
use crate::error::Result;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A preprocessing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    HandleMissing {
        column: String,
        method: MissingValueMethod,
    },
    RemoveOutliers {
        column: String,
        method: OutlierMethod,
    },
    ConvertType {
        column: String,
        target: ConversionTarget,
    },
    RemoveDuplicates {
        #[serde(default)]
        keep: DuplicateKeep,
    },
}

impl Operation {
    /// Run against `df` without committing anything.
    pub fn run(&self, df: &DataFrame) -> Result<(DataFrame, OperationRecord)> {
        match self {
            Operation::HandleMissing { column, method } => {
                handle_missing_values(df, column, method)
            }
            Operation::RemoveOutliers { column, method } => remove_outliers(df, column, *method),
            Operation::ConvertType { column, target } => convert_type(df, column, *target),
            Operation::RemoveDuplicates { keep } => remove_duplicates(df, *keep),
        }
    }
}

/// Applies operations to a loaded table and tracks their history.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    history: History,
}

impl Preprocessor {
    pub fn new(df: DataFrame) -> Self {
        Self {
            history: History::new(df),
        }
    }

    /// Apply `operation` to the current table and commit the result.
    pub fn apply(&mut self, operation: &Operation) -> Result<OperationRecord> {
        debug!(?operation, "Applying operation");
        let (df, record) = operation.run(self.history.current())?;
        self.history.push(df, record.clone());
        Ok(record)
    }

    pub fn undo(&mut self) -> Option<OperationRecord> {
        self.history.undo()
    }

    pub fn reset(&mut self) {
        self.history.reset();
    }

    pub fn current(&self) -> &DataFrame {
        self.history.current()
    }

    pub fn original(&self) -> &DataFrame {
        self.history.original()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Columns of the current table that still have missing values.
    pub fn missing_values(&self) -> Vec<MissingValueInfo> {
        detect_missing_values(self.current())
    }

    /// Compare the current table against the original.
    pub fn comparison(&self) -> TableComparison {
        compare_tables(self.original(), self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EdaError;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn table() -> DataFrame {
        df![
            "age" => [Some(20.0), None, Some(40.0), Some(40.0)],
            "city" => ["a", "b", "c", "c"],
        ]
        .unwrap()
    }

    #[test]
    fn test_apply_commits_and_undo_restores() {
        let mut pre = Preprocessor::new(table());
        let record = pre
            .apply(&Operation::HandleMissing {
                column: "age".to_string(),
                method: MissingValueMethod::Median,
            })
            .unwrap();
        assert_eq!(record.kind.name(), "missing_value_handling");
        pre.apply(&Operation::RemoveDuplicates {
            keep: DuplicateKeep::First,
        })
        .unwrap();
        assert_eq!(pre.history().len(), 3);
        assert_eq!(pre.current().height(), 3);

        pre.undo();
        assert_eq!(pre.history().len(), 2);
        assert_eq!(pre.current().height(), 4);
        assert_eq!(pre.current().column("age").unwrap().null_count(), 0);
    }

    #[test]
    fn test_failed_operation_leaves_history_untouched() {
        let mut pre = Preprocessor::new(table());
        let err = pre
            .apply(&Operation::HandleMissing {
                column: "city".to_string(),
                method: MissingValueMethod::Mean,
            })
            .unwrap_err();
        assert!(matches!(err, EdaError::TypeMismatch { .. }));
        assert_eq!(pre.history().len(), 1);
    }

    #[test]
    fn test_comparison_against_original() {
        let mut pre = Preprocessor::new(table());
        pre.apply(&Operation::RemoveDuplicates {
            keep: DuplicateKeep::Last,
        })
        .unwrap();
        assert_eq!(pre.comparison().rows_changed, -1);
        assert_eq!(pre.missing_values().len(), 1);
    }

    #[test]
    fn test_operation_deserializes() {
        let op: Operation = serde_json::from_str(
            r#"{"operation": "convert_type", "column": "age", "target": "int64"}"#,
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::ConvertType {
                column: "age".to_string(),
                target: ConversionTarget::Int64,
            }
        );
    }
}
