//! Exploratory Data Analysis Core
//!
//! Load a CSV or Excel file, understand it, clean it step by step and
//! export the results. Built on Polars.
//!
//! # Overview
//!
//! - **Ingestion**: encoding and delimiter detection, size limits, Excel
//!   workbooks (first sheet)
//! - **Type Inference**: datetime, numeric, categorical and boolean columns
//!   recognized from text and converted in place
//! - **Profiling**: shape, dtype mix, missing values, duplicates, per-column
//!   statistics
//! - **Analysis**: distributions, outliers (IQR, Z-score, modified Z-score),
//!   correlation (Pearson, Spearman, Kendall) and time series (frequency,
//!   trend, moving averages, forecast, periodicity)
//! - **Preprocessing**: missing values, outlier removal, type conversion and
//!   duplicate removal with a full undo/reset history
//! - **Reporting**: CSV exports and a plain-text history report
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_eda::{AppConfig, Session, DataProfiler, Operation, MissingValueMethod};
//! use lex_eda::analysis::{analyze_correlation, CorrelationMethod};
//!
//! let config = AppConfig::load("config.yaml");
//! let mut session = Session::new();
//! let summary = session.load_file("data/sales.csv", &config)?;
//! println!("Delimiter: {:?}", summary.delimiter);
//!
//! let profile = DataProfiler::profile(session.current()?)?;
//! println!("{} rows, {} duplicates", profile.shape.rows, profile.duplicates.duplicate_count);
//!
//! session.apply(&Operation::HandleMissing {
//!     column: "age".to_string(),
//!     method: MissingValueMethod::Median,
//! })?;
//!
//! let correlation = analyze_correlation(session.current()?, CorrelationMethod::Spearman, 0.5)?;
//! for pair in &correlation.strong_pairs {
//!     println!("{} ~ {}: {:.2}", pair.column_x, pair.column_y, pair.coefficient);
//! }
//!
//! session.undo()?;
//! ```
//!
//! # Configuration
//!
//! [`AppConfig`] is read from YAML or JSON; a missing or invalid file
//! falls back to defaults. Use the builder for programmatic overrides:
//!
//! ```rust,ignore
//! let config = AppConfig::builder()
//!     .max_file_size_mb(50)
//!     .categorical_threshold(20)
//!     .forecast_periods(12)
//!     .build()?;
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod ingest;
pub mod preprocessing;
pub mod profiler;
pub mod reporting;
pub mod session;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use analysis::{
    CorrelationAnalysis, CorrelationMethod, Distribution, OutlierMethod, OutlierReport,
    TimeSeriesAnalysis,
};
pub use config::{AppConfig, AppConfigBuilder, ConfigValidationError};
pub use error::{EdaError, Result, ResultExt};
pub use ingest::{
    Delimiter, DetectedEncoding, LoadSummary, LoadedTable, load_csv_bytes, load_file,
};
pub use preprocessing::{
    ConversionTarget, DuplicateKeep, History, MissingValueMethod, Operation, OperationKind,
    OperationRecord, Preprocessor, TableComparison,
};
pub use profiler::DataProfiler;
pub use session::Session;
pub use types::{
    ColumnInference, ColumnInfo, DatasetProfile, FileInfo, InferenceRule, SemanticType,
};
pub use utils::{DtypeCategory, get_dtype_category, is_numeric_dtype};
