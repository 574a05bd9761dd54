//! Snapshot history with undo and reset.

use super::record::OperationRecord;
use polars::prelude::DataFrame;
use tracing::info;

const REPORT_TITLE: &str = "Preprocessing History Report";

/// The original table plus one snapshot per committed operation.
///
/// Snapshots are full tables; polars shares unchanged column buffers
/// between clones so this stays cheap for column-local operations.
#[derive(Debug, Clone)]
pub struct History {
    original: DataFrame,
    steps: Vec<(DataFrame, OperationRecord)>,
}

impl History {
    pub fn new(original: DataFrame) -> Self {
        Self {
            original,
            steps: Vec::new(),
        }
    }

    /// The newest snapshot.
    pub fn current(&self) -> &DataFrame {
        self.steps
            .last()
            .map(|(df, _)| df)
            .unwrap_or(&self.original)
    }

    pub fn original(&self) -> &DataFrame {
        &self.original
    }

    /// Commit a new snapshot produced by `record`.
    pub fn push(&mut self, df: DataFrame, record: OperationRecord) {
        info!(
            operation = record.kind.name(),
            rows = df.height(),
            columns = df.width(),
            "Operation committed"
        );
        self.steps.push((df, record));
    }

    /// Drop the newest snapshot. Returns its record, or `None` when only
    /// the original remains.
    pub fn undo(&mut self) -> Option<OperationRecord> {
        let (_, record) = self.steps.pop()?;
        info!(operation = record.kind.name(), "Operation undone");
        Some(record)
    }

    /// Discard every operation, keeping the original.
    pub fn reset(&mut self) {
        if !self.steps.is_empty() {
            info!(discarded = self.steps.len(), "History reset");
        }
        self.steps.clear();
    }

    /// Number of snapshots, the original included.
    pub fn len(&self) -> usize {
        self.steps.len() + 1
    }

    /// Never true: the original is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn can_undo(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &OperationRecord> {
        self.steps.iter().map(|(_, record)| record)
    }

    /// Plain-text audit trail of the committed operations.
    pub fn report(&self) -> String {
        let mut out = format!("{REPORT_TITLE}\n{}\n\n", "=".repeat(50));
        if self.steps.is_empty() {
            out.push_str("No operations applied.\n");
            return out;
        }
        for (idx, record) in self.records().enumerate() {
            out.push_str(&format!("Step {}: {}\n", idx + 1, record.kind.name()));
            out.push_str(&format!("Time: {}\n", record.timestamp));
            out.push_str(&record.describe());
            out.push_str(&format!("\n{}\n\n", "-".repeat(30)));
        }
        out
    }
}
