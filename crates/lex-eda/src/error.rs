//! Error types for the exploratory analysis core.
//!
//! Three families of failure are distinguished:
//! - ingestion errors (unsupported extension, undecodable bytes, oversized
//!   files) abort a load;
//! - domain-precondition errors (too few columns, too few points, wrong
//!   column type) are returned to the caller and never touch session state;
//! - wrapped library errors (polars, io, serde).
//!
//! Errors serialize as `{ "code", "message" }` so front ends can branch on
//! the code without parsing messages.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for analysis and preprocessing operations.
#[derive(Error, Debug)]
pub enum EdaError {
    /// The file extension is not one of the supported table formats.
    #[error("Unsupported file format: '{0}'")]
    UnsupportedExtension(String),

    /// Bytes could not be decoded with the detected encoding.
    #[error("Failed to decode file as {encoding}: {reason}")]
    Decode { encoding: String, reason: String },

    /// The file exceeds the configured upload limit.
    #[error("File is {size_mb:.1} MB, exceeding the {limit_mb} MB limit")]
    FileTooLarge { size_mb: f64, limit_mb: u64 },

    /// Excel workbook could not be read.
    #[error("Failed to read workbook: {0}")]
    Excel(String),

    /// Fewer columns of the required kind than the analysis needs.
    #[error("Insufficient columns: {required} {kind} columns required, found {found}")]
    InsufficientColumns {
        kind: String,
        required: usize,
        found: usize,
    },

    /// Not enough rows or points to compute a result.
    #[error("Insufficient data: {required} points required, found {found}")]
    InsufficientData { required: usize, found: usize },

    /// Column was not found in the table.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Column has the wrong type for the requested operation.
    #[error("Column '{column}' has type {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    /// A user-supplied fill value could not be coerced to the column type.
    #[error("Cannot use '{value}' as a fill value for column '{column}' of type {dtype}")]
    InvalidCustomValue {
        column: String,
        value: String,
        dtype: String,
    },

    /// Requested conversion target is not supported.
    #[error("Unsupported conversion target: '{0}'")]
    UnsupportedTarget(String),

    /// A method name could not be decoded.
    #[error("Unknown {family} method: '{name}'")]
    UnknownMethod { family: String, name: String },

    /// No non-null values to compute a statistic from.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// No table loaded in the session.
    #[error("No data loaded")]
    NoDataLoaded,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EdaError>,
    },
}

impl EdaError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EdaError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a type mismatch error.
    pub(crate) fn type_mismatch(
        column: impl Into<String>,
        expected: impl Into<String>,
        actual: impl std::fmt::Display,
    ) -> Self {
        EdaError::TypeMismatch {
            column: column.into(),
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }

    /// Get error code for front-end handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedExtension(_) => "UNSUPPORTED_EXTENSION",
            Self::Decode { .. } => "DECODE_ERROR",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::Excel(_) => "EXCEL_ERROR",
            Self::InsufficientColumns { .. } => "INSUFFICIENT_COLUMNS",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::InvalidCustomValue { .. } => "INVALID_CUSTOM_VALUE",
            Self::UnsupportedTarget(_) => "UNSUPPORTED_TARGET",
            Self::UnknownMethod { .. } => "UNKNOWN_METHOD",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::NoDataLoaded => "NO_DATA_LOADED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Yaml(_) => "YAML_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the error aborts a file load (as opposed to a single analysis).
    pub fn is_ingestion_error(&self) -> bool {
        match self {
            Self::UnsupportedExtension(_)
            | Self::Decode { .. }
            | Self::FileTooLarge { .. }
            | Self::Excel(_) => true,
            Self::WithContext { source, .. } => source.is_ingestion_error(),
            _ => false,
        }
    }

    /// Whether the error is an unmet precondition of an analysis or operation.
    ///
    /// These are shown inline and leave the session untouched.
    pub fn is_precondition(&self) -> bool {
        match self {
            Self::InsufficientColumns { .. }
            | Self::InsufficientData { .. }
            | Self::ColumnNotFound(_)
            | Self::TypeMismatch { .. }
            | Self::InvalidCustomValue { .. }
            | Self::UnsupportedTarget(_)
            | Self::UnknownMethod { .. }
            | Self::NoValidValues(_)
            | Self::NoDataLoaded => true,
            Self::WithContext { source, .. } => source.is_precondition(),
            _ => false,
        }
    }
}

impl Serialize for EdaError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EdaError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, EdaError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EdaError::Polars(e).with_context(context))
    }
}
