//! Table readers for delimited text and Excel workbooks.

use super::delimiter::Delimiter;
use crate::error::{EdaError, Result};
use crate::utils::{NULL_SENTINELS, datetime_series, is_null_sentinel, to_epoch_ms};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::io::Cursor;

/// Rows sampled by the CSV parser to infer column dtypes.
const INFER_SCHEMA_ROWS: usize = 10_000;

/// Parse UTF-8 delimited text into a DataFrame.
///
/// The first row is the header; null sentinels are read as missing.
pub fn read_csv_text(text: String, delimiter: Delimiter) -> Result<DataFrame> {
    let null_values = NullValues::AllColumns(
        NULL_SENTINELS
            .iter()
            .map(|s| PlSmallStr::from_str(s))
            .collect(),
    );

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(delimiter.as_byte())
                .with_quote_char(Some(b'"'))
                .with_null_values(Some(null_values)),
        )
        .into_reader_with_file_handle(Cursor::new(text.into_bytes()))
        .finish()?;
    Ok(df)
}

// ============================================================================
// Excel
// ============================================================================

/// One worksheet cell, independent of the workbook library.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Cell {
    fn is_missing(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Float(v) => v.is_nan(),
            Cell::Text(s) => is_null_sentinel(s),
            _ => false,
        }
    }

    fn render(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        Some(match self {
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => v.to_string(),
            Cell::Bool(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Cell::Empty => return None,
        })
    }
}

/// Build a typed column from worksheet cells.
///
/// All-integral numbers give Int64, other numbers Float64, all-boolean
/// cells Boolean, all-datetime cells Datetime; anything mixed is String.
pub(crate) fn column_from_cells(name: &str, cells: &[Cell]) -> Result<Column> {
    let present: Vec<&Cell> = cells.iter().filter(|c| !c.is_missing()).collect();
    let name = PlSmallStr::from_str(name);

    let all = |pred: fn(&Cell) -> bool| !present.is_empty() && present.iter().all(|c| pred(c));

    let series = if all(|c| matches!(c, Cell::Int(_)) || is_integral_float(c)) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Cell::Int(v) => Some(*v),
                Cell::Float(v) if !c.is_missing() => Some(*v as i64),
                _ => None,
            })
            .collect();
        Series::new(name, values)
    } else if all(|c| matches!(c, Cell::Int(_) | Cell::Float(_))) {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                Cell::Int(v) => Some(*v as f64),
                Cell::Float(v) if !v.is_nan() => Some(*v),
                _ => None,
            })
            .collect();
        Series::new(name, values)
    } else if all(|c| matches!(c, Cell::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|c| match c {
                Cell::Bool(v) => Some(*v),
                _ => None,
            })
            .collect();
        Series::new(name, values)
    } else if all(|c| matches!(c, Cell::DateTime(_))) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Cell::DateTime(dt) => Some(to_epoch_ms(*dt)),
                _ => None,
            })
            .collect();
        datetime_series(name, values)?
    } else {
        let values: Vec<Option<String>> = cells.iter().map(Cell::render).collect();
        Series::new(name, values)
    };

    Ok(Column::from(series))
}

fn is_integral_float(cell: &Cell) -> bool {
    matches!(cell, Cell::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15)
}

/// Assemble a DataFrame from a header row and data rows.
///
/// Short rows are padded with empty cells; blank header cells get a
/// positional name.
pub(crate) fn frame_from_rows(header: &[Cell], rows: &[Vec<Cell>]) -> Result<DataFrame> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(header.len());
    let mut columns = Vec::with_capacity(width);
    for idx in 0..width {
        let name = header
            .get(idx)
            .and_then(Cell::render)
            .unwrap_or_else(|| format!("column_{}", idx + 1));
        let cells: Vec<Cell> = rows
            .iter()
            .map(|row| row.get(idx).cloned().unwrap_or(Cell::Empty))
            .collect();
        columns.push(column_from_cells(&name, &cells)?);
    }
    Ok(DataFrame::new(columns)?)
}

/// Outcome of reading a workbook.
#[derive(Debug)]
pub struct WorkbookRead {
    pub df: DataFrame,
    pub sheet_name: String,
    pub sheet_count: usize,
}

/// Read the first worksheet of an Excel/ODS workbook.
#[cfg(feature = "excel")]
pub fn read_excel(path: &std::path::Path) -> Result<WorkbookRead> {
    use calamine::{Data, DataType as _, Reader, open_workbook_auto};

    let mut workbook = open_workbook_auto(path).map_err(|e| EdaError::Excel(e.to_string()))?;
    let sheet_names = workbook.sheet_names();
    let sheet_name = sheet_names
        .first()
        .cloned()
        .ok_or_else(|| EdaError::Excel("workbook contains no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| EdaError::Excel(e.to_string()))?;

    let to_cell = |data: &Data| match data {
        Data::Int(v) => Cell::Int(*v),
        Data::Float(v) => Cell::Float(*v),
        Data::Bool(v) => Cell::Bool(*v),
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match data.as_datetime() {
            Some(dt) => Cell::DateTime(dt),
            None => Cell::Text(data.to_string()),
        },
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    };

    let mut rows = range.rows();
    let header: Vec<Cell> = rows
        .next()
        .map(|row| row.iter().map(to_cell).collect())
        .unwrap_or_default();
    let body: Vec<Vec<Cell>> = rows.map(|row| row.iter().map(to_cell).collect()).collect();

    Ok(WorkbookRead {
        df: frame_from_rows(&header, &body)?,
        sheet_name,
        sheet_count: sheet_names.len(),
    })
}

#[cfg(not(feature = "excel"))]
pub fn read_excel(path: &std::path::Path) -> Result<WorkbookRead> {
    Err(EdaError::UnsupportedExtension(
        path.extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
    ))
}
