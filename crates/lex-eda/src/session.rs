//! Per-user session state.
//!
//! A [`Session`] owns the loaded table, its preprocessing history and any
//! cached analysis results. Everything is single-threaded; callers that
//! share a session across threads wrap it themselves.

use crate::config::AppConfig;
use crate::error::{EdaError, Result};
use crate::ingest::{self, LoadSummary, LoadedTable};
use crate::preprocessing::{History, Operation, OperationRecord, Preprocessor};
use polars::prelude::DataFrame;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct Session {
    file_name: Option<String>,
    loaded: Option<LoadSummary>,
    preprocessor: Option<Preprocessor>,
    analysis_results: HashMap<String, serde_json::Value>,
    selected_datetime_column: Option<String>,
    analysis_started: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Load a file from disk, replacing whatever was loaded before.
    pub fn load_file(
        &mut self,
        path: impl AsRef<Path>,
        config: &AppConfig,
    ) -> Result<&LoadSummary> {
        let table = ingest::load_file(path, config)?;
        Ok(self.install(table))
    }

    /// Load an in-memory table under `name`, skipping detection.
    pub fn load_table(&mut self, df: DataFrame, name: impl Into<String>) -> &LoadSummary {
        self.install(LoadedTable {
            df,
            file_name: name.into(),
            encoding: None,
            delimiter: None,
            inferences: Vec::new(),
            warnings: Vec::new(),
        })
    }

    fn install(&mut self, table: LoadedTable) -> &LoadSummary {
        self.clear();
        info!(
            file = %table.file_name,
            rows = table.df.height(),
            columns = table.df.width(),
            "Session table loaded"
        );
        self.file_name = Some(table.file_name.clone());
        let summary = table.summary();
        self.preprocessor = Some(Preprocessor::new(table.df));
        self.loaded.insert(summary)
    }

    /// Forget the loaded table and every cached result.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // ========================================================================
    // TABLE ACCESS
    // ========================================================================

    pub fn is_loaded(&self) -> bool {
        self.preprocessor.is_some()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn load_summary(&self) -> Option<&LoadSummary> {
        self.loaded.as_ref()
    }

    fn preprocessor(&self) -> Result<&Preprocessor> {
        self.preprocessor.as_ref().ok_or(EdaError::NoDataLoaded)
    }

    fn preprocessor_mut(&mut self) -> Result<&mut Preprocessor> {
        self.preprocessor.as_mut().ok_or(EdaError::NoDataLoaded)
    }

    /// The table after every committed operation.
    pub fn current(&self) -> Result<&DataFrame> {
        Ok(self.preprocessor()?.current())
    }

    /// The table as loaded.
    pub fn original(&self) -> Result<&DataFrame> {
        Ok(self.preprocessor()?.original())
    }

    pub fn history(&self) -> Result<&History> {
        Ok(self.preprocessor()?.history())
    }

    // ========================================================================
    // PREPROCESSING
    // ========================================================================

    /// Apply an operation to the current table.
    ///
    /// Cached analysis results describe the previous table and are dropped
    /// once the operation commits.
    pub fn apply(&mut self, operation: &Operation) -> Result<OperationRecord> {
        let record = self.preprocessor_mut()?.apply(operation)?;
        self.invalidate_results();
        Ok(record)
    }

    /// Revert the newest operation; `Ok(None)` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<Option<OperationRecord>> {
        let record = self.preprocessor_mut()?.undo();
        if record.is_some() {
            self.invalidate_results();
        }
        Ok(record)
    }

    /// Return to the table as loaded.
    pub fn reset(&mut self) -> Result<()> {
        self.preprocessor_mut()?.reset();
        self.invalidate_results();
        Ok(())
    }

    // ========================================================================
    // ANALYSIS STATE
    // ========================================================================

    /// Cache an analysis result under `name`.
    pub fn store_result<T: Serialize>(
        &mut self,
        name: impl Into<String>,
        result: &T,
    ) -> Result<()> {
        self.preprocessor()?;
        let value = serde_json::to_value(result)?;
        self.analysis_results.insert(name.into(), value);
        self.analysis_started = true;
        Ok(())
    }

    pub fn result(&self, name: &str) -> Option<&serde_json::Value> {
        self.analysis_results.get(name)
    }

    /// A cached result decoded back into its type.
    pub fn result_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.analysis_results
            .get(name)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(EdaError::from)
    }

    pub fn analysis_started(&self) -> bool {
        self.analysis_started
    }

    /// Remember the datetime column chosen for time series analysis.
    pub fn select_datetime_column(&mut self, column: &str) -> Result<()> {
        let df = self.current()?;
        if df.column(column).is_err() {
            return Err(EdaError::ColumnNotFound(column.to_string()));
        }
        self.selected_datetime_column = Some(column.to_string());
        Ok(())
    }

    pub fn selected_datetime_column(&self) -> Option<&str> {
        self.selected_datetime_column.as_deref()
    }

    fn invalidate_results(&mut self) {
        if !self.analysis_results.is_empty() {
            debug!(count = self.analysis_results.len(), "Dropping cached analysis results");
            self.analysis_results.clear();
        }
    }
}
