use crate::analysis::correlation::CorrelationAnalysis;
use crate::analysis::timeseries::ForecastPoint;
use crate::error::Result;
use crate::preprocessing::History;
use crate::utils::format_timestamp;
use polars::prelude::*;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Write a table as comma-separated text with a header row.
pub fn write_table_csv<W: Write>(df: &DataFrame, writer: W) -> Result<()> {
    // The writer needs a mutable frame; columns are shared, not copied.
    let mut df = df.clone();
    CsvWriter::new(writer)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut df)?;
    Ok(())
}

pub fn export_table_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = create_file(path)?;
    write_table_csv(df, file)?;
    info!(path = %path.display(), rows = df.height(), "Table exported");
    Ok(())
}

/// Write a correlation matrix: an empty corner cell, then one row per
/// column. NaN coefficients are written as empty cells.
pub fn write_correlation_csv<W: Write>(analysis: &CorrelationAnalysis, writer: W) -> Result<()> {
    let mut columns = Vec::with_capacity(analysis.columns.len() + 1);
    columns.push(Column::new("".into(), analysis.columns.clone()));
    for (idx, name) in analysis.columns.iter().enumerate() {
        let values: Vec<Option<f64>> = analysis
            .matrix
            .iter()
            .map(|row| row.get(idx).copied().filter(|r| !r.is_nan()))
            .collect();
        columns.push(Column::new(name.as_str().into(), values));
    }
    let df = DataFrame::new(columns)?;
    write_table_csv(&df, writer)
}

/// Write observed and forecast points as `timestamp,value,is_prediction`.
pub fn write_timeseries_csv<W: Write>(points: &[ForecastPoint], writer: W) -> Result<()> {
    let timestamps: Vec<String> = points.iter().map(|p| format_timestamp(p.timestamp)).collect();
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let flags: Vec<bool> = points.iter().map(|p| p.is_prediction).collect();

    let df = DataFrame::new(vec![
        Column::new("timestamp".into(), timestamps),
        Column::new("value".into(), values),
        Column::new("is_prediction".into(), flags),
    ])?;
    write_table_csv(&df, writer)
}

/// Plain-text audit trail of a preprocessing history.
pub fn history_report(history: &History) -> String {
    history.report()
}

pub fn export_history_report(history: &History, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut file = create_file(path)?;
    file.write_all(history_report(history).as_bytes())?;
    info!(path = %path.display(), steps = history.len() - 1, "History report exported");
    Ok(())
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::correlation::CorrelationMethod;
    use pretty_assertions::assert_eq;

    fn as_text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_write_table_csv() {
        let df = df![
            "name" => ["a", "b,c"],
            "value" => [1i64, 2],
        ]
        .unwrap();
        let mut buffer = Vec::new();
        write_table_csv(&df, &mut buffer).unwrap();
        assert_eq!(as_text(buffer), "name,value\na,1\n\"b,c\",2\n");
    }

    #[test]
    fn test_write_correlation_csv() {
        let analysis = CorrelationAnalysis {
            method: CorrelationMethod::Pearson,
            columns: vec!["x".to_string(), "y".to_string()],
            matrix: vec![vec![1.0, 0.5], vec![0.5, f64::NAN]],
            p_values: None,
            strong_pairs: Vec::new(),
            rows_used: 10,
        };
        let mut buffer = Vec::new();
        write_correlation_csv(&analysis, &mut buffer).unwrap();
        // The empty corner name is quoted so it reads back as a string.
        assert_eq!(as_text(buffer), "\"\",x,y\nx,1.0,0.5\ny,0.5,\n");
    }

    #[test]
    fn test_write_timeseries_csv() {
        let points = vec![
            ForecastPoint {
                timestamp: 0,
                value: 1.5,
                is_prediction: false,
            },
            ForecastPoint {
                timestamp: 86_400_000,
                value: 2.0,
                is_prediction: true,
            },
        ];
        let mut buffer = Vec::new();
        write_timeseries_csv(&points, &mut buffer).unwrap();
        let text = as_text(buffer);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,value,is_prediction");
        assert_eq!(lines[1], "1970-01-01 00:00:00,1.5,false");
        assert!(lines[2].starts_with("1970-01-02 00:00:00,2"));
        assert!(lines[2].ends_with(",true"));
    }
}
