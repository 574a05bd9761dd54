//! Distribution summaries for numeric and categorical columns.

use super::outliers::{OutlierMethod, find_outliers};
use crate::config::AppConfig;
use crate::error::{EdaError, Result};
use crate::profiler::value_counts;
use crate::utils::{
    DtypeCategory, get_dtype_category, kurtosis, mean, non_null_numeric, quantile_sorted,
    skewness, sort_f64, std_dev,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Label of the bucket aggregating categories beyond the display limit.
pub const OTHERS_LABEL: &str = "others";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub method: OutlierMethod,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericDistribution {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
    pub iqr: f64,
    pub histogram: Vec<HistogramBin>,
    pub outliers: Vec<OutlierSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub value: String,
    pub count: usize,
    pub percentage: f64,
    pub cumulative_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalDistribution {
    pub column: String,
    pub total_count: usize,
    pub unique_count: usize,
    pub categories: Vec<CategoryShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    Numeric(NumericDistribution),
    Categorical(CategoricalDistribution),
}

/// Sturges' rule for the number of histogram bins.
pub fn sturges_bins(n: usize) -> usize {
    if n < 2 {
        return 1;
    }
    ((n as f64).log2().ceil() as usize) + 1
}

/// Equal-width histogram over sorted values.
///
/// Constant data yields a single bin holding every value.
pub fn histogram(sorted: &[f64], bins: usize) -> Vec<HistogramBin> {
    let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    if (max - min).abs() < f64::EPSILON {
        return vec![HistogramBin {
            start: min,
            end: max,
            count: sorted.len(),
        }];
    }

    let bin_count = bins.max(1);
    let width = (max - min) / bin_count as f64;
    let mut counts = vec![0usize; bin_count];
    for value in sorted {
        let index = (((value - min) / width) as usize).min(bin_count - 1);
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| HistogramBin {
            start: min + idx as f64 * width,
            end: min + (idx as f64 + 1.0) * width,
            count,
        })
        .collect()
}

/// Describe the distribution of a numeric series.
///
/// `bins` defaults to Sturges' rule.
pub fn numeric_distribution(series: &Series, bins: Option<usize>) -> Result<NumericDistribution> {
    let column = series.name().to_string();
    let mut values: Vec<f64> = non_null_numeric(series)?
        .into_iter()
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Err(EdaError::NoValidValues(column));
    }
    sort_f64(&mut values);

    let q25 = quantile_sorted(&values, 0.25);
    let q75 = quantile_sorted(&values, 0.75);
    let bins = bins.unwrap_or_else(|| sturges_bins(values.len()));

    let outliers = OutlierMethod::ALL
        .iter()
        .map(|&method| {
            let (found, _) = find_outliers(&values, method);
            OutlierSummary {
                method,
                count: found.len(),
                percentage: found.len() as f64 / values.len() as f64 * 100.0,
            }
        })
        .collect();

    Ok(NumericDistribution {
        column,
        count: values.len(),
        mean: mean(&values),
        median: quantile_sorted(&values, 0.5),
        std: std_dev(&values, 1),
        skewness: skewness(&values),
        kurtosis: kurtosis(&values),
        min: values[0],
        max: values[values.len() - 1],
        q25,
        q75,
        iqr: q75 - q25,
        histogram: histogram(&values, bins),
        outliers,
    })
}

/// Value shares of a categorical series, most frequent first.
///
/// At most `max_categories` values are listed; the remainder is folded
/// into a trailing `"others"` entry.
pub fn categorical_distribution(
    series: &Series,
    max_categories: usize,
) -> Result<CategoricalDistribution> {
    let counts = value_counts(series)?;
    let total: usize = counts.iter().map(|c| c.count).sum();
    let unique_count = counts.len();

    let mut shown: Vec<(String, usize)> = counts
        .iter()
        .take(max_categories)
        .map(|c| (c.value.clone(), c.count))
        .collect();
    let rest: usize = counts.iter().skip(max_categories).map(|c| c.count).sum();
    if rest > 0 {
        shown.push((OTHERS_LABEL.to_string(), rest));
    }

    let mut cumulative = 0usize;
    let categories = shown
        .into_iter()
        .map(|(value, count)| {
            cumulative += count;
            CategoryShare {
                value,
                count,
                percentage: share(count, total),
                cumulative_percentage: share(cumulative, total),
            }
        })
        .collect();

    Ok(CategoricalDistribution {
        column: series.name().to_string(),
        total_count: total,
        unique_count,
        categories,
    })
}

/// Distribution of one column, numeric or categorical by its dtype.
pub fn analyze_distribution(
    df: &DataFrame,
    column: &str,
    bins: Option<usize>,
    config: &AppConfig,
) -> Result<Distribution> {
    let series = df
        .column(column)
        .map_err(|_| EdaError::ColumnNotFound(column.to_string()))?
        .as_materialized_series();

    match get_dtype_category(series.dtype()) {
        DtypeCategory::Numeric => Ok(Distribution::Numeric(numeric_distribution(series, bins)?)),
        DtypeCategory::Text | DtypeCategory::Categorical | DtypeCategory::Boolean => {
            Ok(Distribution::Categorical(categorical_distribution(
                series,
                config.visualization.max_categories,
            )?))
        }
        _ => Err(EdaError::type_mismatch(
            column,
            "numeric or categorical",
            series.dtype(),
        )),
    }
}

fn share(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ==================== histogram tests ====================

    #[test]
    fn test_sturges_bins() {
        assert_eq!(sturges_bins(0), 1);
        assert_eq!(sturges_bins(8), 4);
        assert_eq!(sturges_bins(100), 8);
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        let bins = histogram(&values, 3);
        assert_eq!(bins.len(), 3);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 10);
        assert_eq!(bins[2].end, 9.0);
    }

    #[test]
    fn test_histogram_constant_values() {
        let bins = histogram(&[4.0, 4.0, 4.0], 5);
        assert_eq!(
            bins,
            vec![HistogramBin {
                start: 4.0,
                end: 4.0,
                count: 3
            }]
        );
    }

    // ==================== numeric_distribution tests ====================

    #[test]
    fn test_numeric_distribution() {
        let series = Series::new("x".into(), &[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
        let dist = numeric_distribution(&series, None).unwrap();
        assert_eq!(dist.count, 6);
        assert_eq!(dist.median, 3.5);
        assert_eq!(dist.iqr, 2.5);
        assert_eq!(dist.histogram.len(), sturges_bins(6));
        let iqr = dist
            .outliers
            .iter()
            .find(|o| o.method == OutlierMethod::Iqr)
            .unwrap();
        assert_eq!(iqr.count, 1);
    }

    #[test]
    fn test_numeric_distribution_all_null() {
        let series = Series::new("x".into(), &[None::<f64>, None]);
        assert!(matches!(
            numeric_distribution(&series, None),
            Err(EdaError::NoValidValues(_))
        ));
    }

    // ==================== categorical_distribution tests ====================

    #[test]
    fn test_categorical_distribution_others_bucket() {
        let series = Series::new("c".into(), &["a", "a", "a", "b", "b", "c", "d", "e"]);
        let dist = categorical_distribution(&series, 2).unwrap();
        let labels: Vec<&str> = dist.categories.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", OTHERS_LABEL]);
        assert_eq!(dist.categories[2].count, 3);
        assert_eq!(dist.categories[0].percentage, 37.5);
        assert_eq!(dist.categories[2].cumulative_percentage, 100.0);
        assert_eq!(dist.unique_count, 5);
    }

    #[test]
    fn test_categorical_distribution_no_others_when_all_fit() {
        let series = Series::new("c".into(), &["a", "b"]);
        let dist = categorical_distribution(&series, 20).unwrap();
        assert_eq!(dist.categories.len(), 2);
    }

    // ==================== analyze_distribution tests ====================

    #[test]
    fn test_analyze_distribution_dispatch() {
        let df = df![
            "n" => [1i64, 2, 3],
            "t" => ["x", "y", "x"],
        ]
        .unwrap();
        let config = AppConfig::default();
        assert!(matches!(
            analyze_distribution(&df, "n", None, &config).unwrap(),
            Distribution::Numeric(_)
        ));
        assert!(matches!(
            analyze_distribution(&df, "t", None, &config).unwrap(),
            Distribution::Categorical(_)
        ));
        assert!(matches!(
            analyze_distribution(&df, "z", None, &config),
            Err(EdaError::ColumnNotFound(_))
        ));
    }
}
