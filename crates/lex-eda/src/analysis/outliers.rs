//! Univariate outlier detection.

use crate::error::{EdaError, Result};
use crate::utils::{
    is_numeric_dtype, mean, median_absolute_deviation, numeric_values, quantile_sorted, sort_f64,
    std_dev,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Multiplier applied to the interquartile range.
pub const IQR_FACTOR: f64 = 1.5;
/// Absolute z-score above which a value is an outlier.
pub const Z_SCORE_THRESHOLD: f64 = 3.0;
/// Absolute modified z-score above which a value is an outlier.
pub const MODIFIED_Z_THRESHOLD: f64 = 3.5;
/// Scales the MAD to be consistent with the standard deviation.
const MODIFIED_Z_CONSTANT: f64 = 0.6745;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    Iqr,
    #[serde(rename = "zscore")]
    ZScore,
    #[serde(rename = "modified_zscore")]
    ModifiedZScore,
}

impl OutlierMethod {
    pub const ALL: [OutlierMethod; 3] = [
        OutlierMethod::Iqr,
        OutlierMethod::ZScore,
        OutlierMethod::ModifiedZScore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutlierMethod::Iqr => "iqr",
            OutlierMethod::ZScore => "zscore",
            OutlierMethod::ModifiedZScore => "modified_zscore",
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutlierMethod {
    type Err = EdaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" | "z_score" => Ok(OutlierMethod::ZScore),
            "modified_zscore" | "modified_z_score" => Ok(OutlierMethod::ModifiedZScore),
            _ => Err(EdaError::UnknownMethod {
                family: "outlier".to_string(),
                name: s.to_string(),
            }),
        }
    }
}

/// What separates outliers from inliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutlierBounds {
    /// Values outside `[lower, upper]` are outliers.
    Range { lower: f64, upper: f64 },
    /// Values whose absolute score exceeds the threshold are outliers.
    Threshold { threshold: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub column: String,
    pub method: OutlierMethod,
    pub outlier_count: usize,
    /// Outliers as a percentage of the non-null values.
    pub outlier_percentage: f64,
    pub bounds: OutlierBounds,
    pub outlier_values: Vec<f64>,
    pub total_count: usize,
}

/// Per-value scoring rule resolved from the data.
enum Rule {
    Range { lower: f64, upper: f64 },
    Score { center: f64, scale: f64, factor: f64, threshold: f64 },
    /// Degenerate spread: nothing is an outlier.
    Never { threshold: f64 },
}

impl Rule {
    fn fit(values: &[f64], method: OutlierMethod) -> Self {
        match method {
            OutlierMethod::Iqr => {
                let mut sorted = values.to_vec();
                sort_f64(&mut sorted);
                let q1 = quantile_sorted(&sorted, 0.25);
                let q3 = quantile_sorted(&sorted, 0.75);
                let iqr = q3 - q1;
                Rule::Range {
                    lower: q1 - IQR_FACTOR * iqr,
                    upper: q3 + IQR_FACTOR * iqr,
                }
            }
            OutlierMethod::ZScore => {
                let std = std_dev(values, 0);
                if std.is_nan() || std == 0.0 {
                    Rule::Never {
                        threshold: Z_SCORE_THRESHOLD,
                    }
                } else {
                    Rule::Score {
                        center: mean(values),
                        scale: std,
                        factor: 1.0,
                        threshold: Z_SCORE_THRESHOLD,
                    }
                }
            }
            OutlierMethod::ModifiedZScore => {
                let mut sorted = values.to_vec();
                sort_f64(&mut sorted);
                let median = quantile_sorted(&sorted, 0.5);
                let mad = median_absolute_deviation(&sorted, median);
                if mad.is_nan() || mad == 0.0 {
                    Rule::Never {
                        threshold: MODIFIED_Z_THRESHOLD,
                    }
                } else {
                    Rule::Score {
                        center: median,
                        scale: mad,
                        factor: MODIFIED_Z_CONSTANT,
                        threshold: MODIFIED_Z_THRESHOLD,
                    }
                }
            }
        }
    }

    fn is_outlier(&self, value: f64) -> bool {
        match *self {
            Rule::Range { lower, upper } => value < lower || value > upper,
            Rule::Score {
                center,
                scale,
                factor,
                threshold,
            } => (factor * (value - center) / scale).abs() > threshold,
            Rule::Never { .. } => false,
        }
    }

    fn bounds(&self) -> OutlierBounds {
        match *self {
            Rule::Range { lower, upper } => OutlierBounds::Range { lower, upper },
            Rule::Score { threshold, .. } | Rule::Never { threshold } => {
                OutlierBounds::Threshold { threshold }
            }
        }
    }
}

/// Outliers among a slice of values.
pub fn find_outliers(values: &[f64], method: OutlierMethod) -> (Vec<f64>, OutlierBounds) {
    let rule = Rule::fit(values, method);
    let outliers = values
        .iter()
        .copied()
        .filter(|v| rule.is_outlier(*v))
        .collect();
    (outliers, rule.bounds())
}

/// Detect outliers in one numeric column.
pub fn detect_outliers(
    df: &DataFrame,
    column: &str,
    method: OutlierMethod,
) -> Result<OutlierReport> {
    let values: Vec<f64> = column_values(df, column)?.into_iter().flatten().collect();
    if values.is_empty() {
        return Err(EdaError::NoValidValues(column.to_string()));
    }

    let (outlier_values, bounds) = find_outliers(&values, method);
    Ok(OutlierReport {
        column: column.to_string(),
        method,
        outlier_count: outlier_values.len(),
        outlier_percentage: outlier_values.len() as f64 / values.len() as f64 * 100.0,
        bounds,
        outlier_values,
        total_count: values.len(),
    })
}

/// Per-row outlier flags for a numeric column; nulls are never outliers.
pub fn outlier_mask(
    df: &DataFrame,
    column: &str,
    method: OutlierMethod,
) -> Result<(Vec<bool>, OutlierBounds)> {
    let values = column_values(df, column)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return Err(EdaError::NoValidValues(column.to_string()));
    }

    let rule = Rule::fit(&present, method);
    let mask = values
        .iter()
        .map(|v| v.is_some_and(|v| rule.is_outlier(v)))
        .collect();
    Ok((mask, rule.bounds()))
}

fn column_values(df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(column)
        .map_err(|_| EdaError::ColumnNotFound(column.to_string()))?
        .as_materialized_series();
    if !is_numeric_dtype(series.dtype()) {
        return Err(EdaError::type_mismatch(column, "numeric", series.dtype()));
    }
    Ok(numeric_values(series)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ==================== find_outliers tests ====================

    #[test]
    fn test_iqr_flags_extreme_value() {
        let (outliers, bounds) =
            find_outliers(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0], OutlierMethod::Iqr);
        assert_eq!(outliers, vec![100.0]);
        assert_eq!(
            bounds,
            OutlierBounds::Range {
                lower: 2.25 - 1.5 * 2.5,
                upper: 4.75 + 1.5 * 2.5
            }
        );
    }

    #[test]
    fn test_iqr_no_outliers() {
        let (outliers, _) = find_outliers(&[1.0, 2.0, 3.0, 4.0, 5.0], OutlierMethod::Iqr);
        assert!(outliers.is_empty());
    }

    #[test]
    fn test_zscore_uses_population_std() {
        let mut values = vec![10.0; 20];
        values.push(100.0);
        let (outliers, bounds) = find_outliers(&values, OutlierMethod::ZScore);
        assert_eq!(outliers, vec![100.0]);
        assert_eq!(bounds, OutlierBounds::Threshold { threshold: 3.0 });
    }

    #[test]
    fn test_zscore_constant_values() {
        let (outliers, _) = find_outliers(&[7.0, 7.0, 7.0], OutlierMethod::ZScore);
        assert!(outliers.is_empty());
    }

    #[test]
    fn test_modified_zscore_zero_mad() {
        let (outliers, bounds) =
            find_outliers(&[5.0, 5.0, 5.0, 5.0], OutlierMethod::ModifiedZScore);
        assert!(outliers.is_empty());
        assert_eq!(bounds, OutlierBounds::Threshold { threshold: 3.5 });
    }

    #[test]
    fn test_modified_zscore_flags_extreme_value() {
        let (outliers, _) = find_outliers(
            &[1.0, 2.0, 3.0, 4.0, 5.0, 100.0],
            OutlierMethod::ModifiedZScore,
        );
        assert_eq!(outliers, vec![100.0]);
    }

    // ==================== detect_outliers tests ====================

    #[test]
    fn test_detect_outliers_report() {
        let df = df![
            "x" => [Some(1.0), Some(2.0), None, Some(3.0), Some(4.0), Some(5.0), Some(100.0)],
        ]
        .unwrap();
        let report = detect_outliers(&df, "x", OutlierMethod::Iqr).unwrap();
        assert_eq!(report.outlier_count, 1);
        assert_eq!(report.total_count, 6);
        assert!((report.outlier_percentage - 100.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_detect_outliers_errors() {
        let df = df![
            "text" => ["a", "b"],
            "empty" => [None::<f64>, None],
        ]
        .unwrap();
        assert!(matches!(
            detect_outliers(&df, "missing", OutlierMethod::Iqr),
            Err(EdaError::ColumnNotFound(_))
        ));
        assert!(matches!(
            detect_outliers(&df, "text", OutlierMethod::Iqr),
            Err(EdaError::TypeMismatch { .. })
        ));
        assert!(matches!(
            detect_outliers(&df, "empty", OutlierMethod::Iqr),
            Err(EdaError::NoValidValues(_))
        ));
    }

    #[test]
    fn test_outlier_mask_skips_nulls() {
        let df = df![
            "x" => [Some(1.0), None, Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(100.0)],
        ]
        .unwrap();
        let (mask, _) = outlier_mask(&df, "x", OutlierMethod::Iqr).unwrap();
        assert_eq!(mask, vec![false, false, false, false, false, false, true]);
    }

    // ==================== OutlierMethod tests ====================

    #[test]
    fn test_method_from_str() {
        assert_eq!("IQR".parse::<OutlierMethod>().unwrap(), OutlierMethod::Iqr);
        assert_eq!("z-score".parse::<OutlierMethod>().unwrap(), OutlierMethod::ZScore);
        assert_eq!(
            "modified-zscore".parse::<OutlierMethod>().unwrap(),
            OutlierMethod::ModifiedZScore
        );
        assert!("grubbs".parse::<OutlierMethod>().is_err());
    }
}
