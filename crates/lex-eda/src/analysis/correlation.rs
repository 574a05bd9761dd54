//! Pairwise correlation between numeric columns.

use crate::error::{EdaError, Result};
use crate::utils::{is_numeric_dtype, numeric_values};
use anofox_statistics::correlation::{pearson, spearman};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
    Kendall,
}

impl CorrelationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CorrelationMethod::Pearson => "pearson",
            CorrelationMethod::Spearman => "spearman",
            CorrelationMethod::Kendall => "kendall",
        }
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrelationMethod {
    type Err = EdaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pearson" => Ok(CorrelationMethod::Pearson),
            "spearman" => Ok(CorrelationMethod::Spearman),
            "kendall" => Ok(CorrelationMethod::Kendall),
            _ => Err(EdaError::UnknownMethod {
                family: "correlation".to_string(),
                name: s.to_string(),
            }),
        }
    }
}

/// Qualitative label for the magnitude of a coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl CorrelationStrength {
    pub fn from_coefficient(r: f64) -> Self {
        match r.abs() {
            a if a < 0.3 => CorrelationStrength::VeryWeak,
            a if a < 0.5 => CorrelationStrength::Weak,
            a if a < 0.7 => CorrelationStrength::Moderate,
            a if a < 0.9 => CorrelationStrength::Strong,
            _ => CorrelationStrength::VeryStrong,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub column_x: String,
    pub column_y: String,
    pub coefficient: f64,
    pub strength: CorrelationStrength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationAnalysis {
    pub method: CorrelationMethod,
    pub columns: Vec<String>,
    /// Square matrix in `columns` order; NaN where a column is constant.
    pub matrix: Vec<Vec<f64>>,
    /// Two-sided p-values, Pearson only.
    pub p_values: Option<Vec<Vec<f64>>>,
    /// Pairs with `|r| >= threshold`, strongest first.
    pub strong_pairs: Vec<CorrelationPair>,
    pub rows_used: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCorrelation {
    pub column: String,
    pub coefficient: f64,
    pub strength: CorrelationStrength,
}

/// Correlate every pair of numeric columns.
///
/// Rows with a missing value in any numeric column are dropped first.
pub fn analyze_correlation(
    df: &DataFrame,
    method: CorrelationMethod,
    threshold: f64,
) -> Result<CorrelationAnalysis> {
    let mut columns = Vec::new();
    let mut data = Vec::new();
    for column in df.get_columns() {
        if is_numeric_dtype(column.dtype()) {
            columns.push(column.name().to_string());
            data.push(numeric_values(column.as_materialized_series())?);
        }
    }

    if columns.len() < 2 {
        return Err(EdaError::InsufficientColumns {
            kind: "numeric".to_string(),
            required: 2,
            found: columns.len(),
        });
    }

    let vectors = complete_rows(&data);
    let rows_used = vectors.first().map_or(0, Vec::len);
    if rows_used == 0 {
        return Err(EdaError::InsufficientData {
            required: 1,
            found: 0,
        });
    }
    debug!(
        "Correlating {} columns over {} complete rows ({})",
        columns.len(),
        rows_used,
        method
    );

    let size = columns.len();
    let mut matrix = vec![vec![f64::NAN; size]; size];
    let mut p_matrix = vec![vec![f64::NAN; size]; size];
    for i in 0..size {
        for j in i..size {
            let (r, p) = if i == j {
                if is_constant(&vectors[i]) {
                    (f64::NAN, f64::NAN)
                } else {
                    (1.0, 0.0)
                }
            } else {
                pair_statistics(method, &vectors[i], &vectors[j])
            };
            matrix[i][j] = r;
            matrix[j][i] = r;
            p_matrix[i][j] = p;
            p_matrix[j][i] = p;
        }
    }
    let p_values = (method == CorrelationMethod::Pearson).then_some(p_matrix);

    let mut strong_pairs = Vec::new();
    for i in 0..size {
        for j in (i + 1)..size {
            let r = matrix[i][j];
            if r.is_finite() && r.abs() >= threshold {
                strong_pairs.push(CorrelationPair {
                    column_x: columns[i].clone(),
                    column_y: columns[j].clone(),
                    coefficient: r,
                    strength: CorrelationStrength::from_coefficient(r),
                });
            }
        }
    }
    strong_pairs.sort_by(|a, b| {
        b.coefficient
            .abs()
            .partial_cmp(&a.coefficient.abs())
            .unwrap_or(Ordering::Equal)
    });

    Ok(CorrelationAnalysis {
        method,
        columns,
        matrix,
        p_values,
        strong_pairs,
        rows_used,
    })
}

/// Coefficients of every other column against `column`, strongest first.
pub fn correlation_with_target(
    analysis: &CorrelationAnalysis,
    column: &str,
) -> Result<Vec<TargetCorrelation>> {
    let idx = analysis
        .columns
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| EdaError::ColumnNotFound(column.to_string()))?;

    let mut result: Vec<TargetCorrelation> = analysis
        .columns
        .iter()
        .enumerate()
        .filter(|(other, _)| *other != idx)
        .map(|(other, name)| {
            let r = analysis.matrix[idx][other];
            TargetCorrelation {
                column: name.clone(),
                coefficient: r,
                strength: CorrelationStrength::from_coefficient(r),
            }
        })
        .collect();

    // NaN coefficients sort last.
    result.sort_by(|a, b| {
        let (x, y) = (a.coefficient.abs(), b.coefficient.abs());
        match (x.is_nan(), y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        }
    });
    Ok(result)
}

/// Keep rows where every column has a finite value.
fn complete_rows(data: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
    let height = data.first().map_or(0, Vec::len);
    let keep: Vec<usize> = (0..height)
        .filter(|&row| {
            data.iter()
                .all(|col| col[row].is_some_and(|v| v.is_finite()))
        })
        .collect();
    data.iter()
        .map(|col| keep.iter().filter_map(|&row| col[row]).collect())
        .collect()
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Coefficient and two-sided p-value for one pair of columns.
///
/// Fewer than three rows, constant columns and pairs the test rejects
/// yield NaN for both.
fn pair_statistics(method: CorrelationMethod, x: &[f64], y: &[f64]) -> (f64, f64) {
    if x.len() < 3 || is_constant(x) || is_constant(y) {
        return (f64::NAN, f64::NAN);
    }
    let result = match method {
        CorrelationMethod::Pearson => pearson(x, y, Some(0.95)),
        CorrelationMethod::Spearman => spearman(x, y, Some(0.95)),
        CorrelationMethod::Kendall => return (kendall_tau_b(x, y), f64::NAN),
    };
    match result {
        Ok(result) => (result.estimate.clamp(-1.0, 1.0), result.p_value),
        Err(e) => {
            debug!("Correlation test rejected pair ({}): {:?}", method, e);
            (f64::NAN, f64::NAN)
        }
    }
}

/// Kendall's tau-b, which corrects for ties in either variable.
pub fn kendall_tau_b(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }

    let (mut concordant, mut discordant) = (0i64, 0i64);
    let (mut ties_x, mut ties_y) = (0i64, 0i64);
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];
            match (dx == 0.0, dy == 0.0) {
                (true, true) => {
                    ties_x += 1;
                    ties_y += 1;
                }
                (true, false) => ties_x += 1,
                (false, true) => ties_y += 1,
                (false, false) => {
                    if (dx > 0.0) == (dy > 0.0) {
                        concordant += 1;
                    } else {
                        discordant += 1;
                    }
                }
            }
        }
    }

    let total = (n * (n - 1) / 2) as i64;
    let denominator = (((total - ties_x) * (total - ties_y)) as f64).sqrt();
    if denominator == 0.0 {
        return f64::NAN;
    }
    (concordant - discordant) as f64 / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn linear_df() -> DataFrame {
        df![
            "x" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "y" => [2.0, 4.0, 6.0, 8.0, 10.0],
            "z" => [5.0, 3.0, 4.0, 1.0, 2.0],
        ]
        .unwrap()
    }

    // ==================== analyze_correlation tests ====================

    #[test]
    fn test_perfect_linear_correlation_is_strong() {
        let analysis = analyze_correlation(&linear_df(), CorrelationMethod::Pearson, 0.5).unwrap();
        assert!((analysis.matrix[0][1] - 1.0).abs() < 1e-9);
        let top = &analysis.strong_pairs[0];
        assert_eq!((top.column_x.as_str(), top.column_y.as_str()), ("x", "y"));
        assert_eq!(top.strength, CorrelationStrength::VeryStrong);
    }

    #[test]
    fn test_pearson_p_values() {
        let df = df![
            "x" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            "y" => [1.2, 1.9, 3.4, 3.8, 5.1, 6.3, 6.8, 8.4],
        ]
        .unwrap();
        let analysis = analyze_correlation(&df, CorrelationMethod::Pearson, 0.5).unwrap();
        let p = analysis.p_values.as_ref().unwrap();
        assert!(p[0][1] > 0.0 && p[0][1] < 0.001, "p = {}", p[0][1]);
        assert_eq!(p[0][1], p[1][0]);
        assert_eq!(p[0][0], 0.0);

        let spearman = analyze_correlation(&df, CorrelationMethod::Spearman, 0.5).unwrap();
        assert!(spearman.p_values.is_none());
    }

    #[test]
    fn test_single_numeric_column_is_rejected() {
        let df = df!["x" => [1.0, 2.0], "label" => ["a", "b"]].unwrap();
        let err = analyze_correlation(&df, CorrelationMethod::Pearson, 0.5).unwrap_err();
        assert!(matches!(
            err,
            EdaError::InsufficientColumns {
                required: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_rows_with_missing_values_are_dropped() {
        let df = df![
            "a" => [Some(1.0), None, Some(3.0), Some(4.0)],
            "b" => [Some(1.0), Some(9.0), None, Some(4.0)],
        ]
        .unwrap();
        let analysis = analyze_correlation(&df, CorrelationMethod::Pearson, 0.5).unwrap();
        assert_eq!(analysis.rows_used, 2);
        // Two rows are too few for a coefficient.
        assert!(analysis.matrix[0][1].is_nan());
        assert!(analysis.strong_pairs.is_empty());
    }

    #[test]
    fn test_no_complete_rows() {
        let df = df![
            "a" => [Some(1.0), None],
            "b" => [None, Some(2.0)],
        ]
        .unwrap();
        assert!(matches!(
            analyze_correlation(&df, CorrelationMethod::Pearson, 0.5),
            Err(EdaError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_constant_column_never_strong() {
        let df = df![
            "a" => [1.0, 2.0, 3.0],
            "c" => [7.0, 7.0, 7.0],
        ]
        .unwrap();
        let analysis = analyze_correlation(&df, CorrelationMethod::Spearman, 0.0).unwrap();
        assert!(analysis.matrix[0][1].is_nan());
        assert!(analysis.matrix[1][1].is_nan());
        assert!(analysis.strong_pairs.is_empty());
        assert!(analysis.p_values.is_none());
    }

    #[test]
    fn test_spearman_and_kendall_monotone() {
        let df = df![
            "x" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "y" => [1.0, 4.0, 9.0, 16.0, 100.0],
        ]
        .unwrap();
        let spearman = analyze_correlation(&df, CorrelationMethod::Spearman, 0.5).unwrap();
        assert!((spearman.matrix[0][1] - 1.0).abs() < 1e-9);
        // Monotone but far from linear.
        let pearson = analyze_correlation(&df, CorrelationMethod::Pearson, 0.5).unwrap();
        assert!(pearson.matrix[0][1] < 0.95);
        let kendall = analyze_correlation(&df, CorrelationMethod::Kendall, 0.5).unwrap();
        assert!((kendall.matrix[0][1] - 1.0).abs() < 1e-12);
    }

    // ==================== helper tests ====================

    #[test]
    fn test_kendall_tau_b_with_ties() {
        let tau = kendall_tau_b(&[1.0, 2.0, 2.0, 3.0], &[1.0, 2.0, 3.0, 4.0]);
        // 5 concordant, 0 discordant, one tie in x: 5 / sqrt(5 * 6).
        assert!((tau - 5.0 / 30f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_strength_labels() {
        assert_eq!(CorrelationStrength::from_coefficient(-0.95), CorrelationStrength::VeryStrong);
        assert_eq!(CorrelationStrength::from_coefficient(0.72), CorrelationStrength::Strong);
        assert_eq!(CorrelationStrength::from_coefficient(0.5), CorrelationStrength::Moderate);
        assert_eq!(CorrelationStrength::from_coefficient(0.1), CorrelationStrength::VeryWeak);
    }

    // ==================== correlation_with_target tests ====================

    #[test]
    fn test_correlation_with_target() {
        let analysis = analyze_correlation(&linear_df(), CorrelationMethod::Pearson, 0.5).unwrap();
        let against = correlation_with_target(&analysis, "x").unwrap();
        assert_eq!(against.len(), 2);
        assert_eq!(against[0].column, "y");
        assert!(correlation_with_target(&analysis, "missing").is_err());
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("Kendall".parse::<CorrelationMethod>().unwrap(), CorrelationMethod::Kendall);
        assert!("cosine".parse::<CorrelationMethod>().is_err());
        let json = serde_json::to_string(&CorrelationMethod::Spearman).unwrap();
        assert_eq!(json, "\"spearman\"");
    }
}
