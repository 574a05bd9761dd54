use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Type inference
// ============================================================================

/// Semantic type of a column as seen by the analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Integer,
    Float,
    Text,
    Categorical,
    Datetime,
    Boolean,
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::Text => "text",
            SemanticType::Categorical => "categorical",
            SemanticType::Datetime => "datetime",
            SemanticType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Which inference rule classified a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "pattern", rename_all = "snake_case")]
pub enum InferenceRule {
    /// Every sampled value parsed with this explicit pattern.
    ExplicitFormat(String),
    /// Format-free parsing reached the success threshold.
    FormatFree,
    /// Few distinct values relative to the threshold and row count.
    Cardinality,
    /// Enough sampled values coerced to numbers.
    NumericCoercion,
    /// No rule matched; the parsed type is kept.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInference {
    pub column: String,
    pub original_dtype: String,
    pub semantic_type: SemanticType,
    pub rule: InferenceRule,
    /// Success rate or ratio that justified the decision (1.0 when unchanged).
    pub confidence: f64,
}

// ============================================================================
// Dataset profile
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_name: String,
    pub rows: usize,
    pub columns: usize,
    pub memory_usage_mb: f64,
    pub dtypes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub shape: ShapeInfo,
    pub dtypes: DtypeSummary,
    pub missing: MissingSummary,
    pub duplicates: DuplicateSummary,
    pub numeric_summaries: Vec<NumericSummary>,
    pub categorical_summaries: Vec<CategoricalSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeInfo {
    pub rows: usize,
    pub columns: usize,
    pub memory_usage_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtypeSummary {
    /// Number of columns per dtype name.
    pub counts: BTreeMap<String, usize>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub datetime_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingSummary {
    pub total_missing: usize,
    /// Missing cells as a percentage of all cells.
    pub missing_percentage: f64,
    /// Sorted by missing count, descending.
    pub per_column: Vec<MissingColumn>,
    pub columns_with_missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingColumn {
    pub column: String,
    pub missing_count: usize,
    pub missing_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSummary {
    pub duplicate_count: usize,
    pub duplicate_percentage: f64,
    pub unique_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub zero_count: usize,
    pub negative_count: usize,
    pub infinite_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    pub column: String,
    pub missing_count: usize,
    pub unique_count: usize,
    pub unique_percentage: f64,
    pub mode: Option<String>,
    pub mode_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Per-column detail shown when a single column is inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub non_null_count: usize,
    pub null_count: usize,
    pub unique_count: usize,
    pub detail: ColumnDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnDetail {
    Numeric(NumericSummary),
    /// Ten most frequent values.
    Values { top_values: Vec<ValueCount> },
}
