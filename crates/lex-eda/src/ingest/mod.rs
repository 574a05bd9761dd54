//! File ingestion: encoding and delimiter detection, parsing, and
//! semantic type inference.
//!
//! ```text
//! bytes --> detect_encoding --> detect_delimiter --> transcode --> polars CSV
//!                                                                     |
//! workbook --> first sheet --> typed columns --------------------------+
//!                                                                     v
//!                                                            infer_and_convert
//! ```

pub mod delimiter;
pub mod encoding;
pub mod reader;

use crate::config::AppConfig;
use crate::error::{EdaError, Result};
use crate::profiler::infer_and_convert;
use crate::types::ColumnInference;
use polars::prelude::*;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

pub use delimiter::{Delimiter, detect_delimiter, detect_delimiter_in_text};
pub use encoding::{DetectedEncoding, DetectionMethod, detect_encoding};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Extensions routed to the workbook reader.
const EXCEL_EXTENSIONS: [&str; 4] = ["xlsx", "xls", "xlsm", "ods"];

/// A parsed table together with what was detected while loading it.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub df: DataFrame,
    pub file_name: String,
    /// Detected text encoding (delimited text only).
    pub encoding: Option<DetectedEncoding>,
    /// Detected field delimiter (delimited text only).
    pub delimiter: Option<Delimiter>,
    pub inferences: Vec<ColumnInference>,
    pub warnings: Vec<String>,
}

/// Serializable view of a load, without the table itself.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub file_name: String,
    pub encoding: Option<DetectedEncoding>,
    pub delimiter: Option<String>,
    pub inferences: Vec<ColumnInference>,
    pub warnings: Vec<String>,
}

impl LoadedTable {
    pub fn summary(&self) -> LoadSummary {
        LoadSummary {
            file_name: self.file_name.clone(),
            encoding: self.encoding.clone(),
            delimiter: self.delimiter.map(|d| d.to_string()),
            inferences: self.inferences.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

/// Load a CSV or Excel file from disk.
pub fn load_file(path: impl AsRef<Path>, config: &AppConfig) -> Result<LoadedTable> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let is_excel = EXCEL_EXTENSIONS.contains(&extension.as_str());
    if extension != "csv" && !is_excel {
        return Err(EdaError::UnsupportedExtension(extension));
    }

    check_file_size(std::fs::metadata(path)?.len(), config)?;

    if is_excel {
        load_excel(path, file_name, config)
    } else {
        let bytes = std::fs::read(path)?;
        load_csv_bytes(&bytes, &file_name, config)
    }
}

/// Load delimited text already held in memory.
pub fn load_csv_bytes(bytes: &[u8], file_name: &str, config: &AppConfig) -> Result<LoadedTable> {
    check_file_size(bytes.len() as u64, config)?;

    let encoding = detect_encoding(bytes);
    let delimiter = detect_delimiter(bytes, encoding.encoding);
    debug!(
        "{}: encoding {} ({:?}), delimiter '{}'",
        file_name, encoding.name, encoding.method, delimiter
    );

    let text = encoding::decode_to_string(encoding.encoding, bytes).ok_or_else(|| {
        EdaError::Decode {
            encoding: encoding.name.clone(),
            reason: "malformed byte sequence".to_string(),
        }
    })?;

    let df = reader::read_csv_text(text, delimiter)?;
    let (df, inferences) = infer_if_enabled(df, config)?;
    info!(
        "Loaded {} ({} rows x {} columns)",
        file_name,
        df.height(),
        df.width()
    );

    Ok(LoadedTable {
        df,
        file_name: file_name.to_string(),
        encoding: Some(encoding),
        delimiter: Some(delimiter),
        inferences,
        warnings: Vec::new(),
    })
}

fn load_excel(path: &Path, file_name: String, config: &AppConfig) -> Result<LoadedTable> {
    let workbook = reader::read_excel(path)?;
    let mut warnings = Vec::new();
    if workbook.sheet_count > 1 {
        let message = format!(
            "Workbook has {} sheets; only the first sheet '{}' was loaded",
            workbook.sheet_count, workbook.sheet_name
        );
        warn!("{}", message);
        warnings.push(message);
    }

    let (df, inferences) = infer_if_enabled(workbook.df, config)?;
    info!(
        "Loaded {} ({} rows x {} columns)",
        file_name,
        df.height(),
        df.width()
    );

    Ok(LoadedTable {
        df,
        file_name,
        encoding: None,
        delimiter: None,
        inferences,
        warnings,
    })
}

fn infer_if_enabled(
    df: DataFrame,
    config: &AppConfig,
) -> Result<(DataFrame, Vec<ColumnInference>)> {
    if config.data_types.auto_detect {
        infer_and_convert(df, &config.data_types)
    } else {
        Ok((df, Vec::new()))
    }
}

fn check_file_size(size_bytes: u64, config: &AppConfig) -> Result<()> {
    let size_mb = size_bytes as f64 / BYTES_PER_MB;
    let limit_mb = config.general.max_file_size_mb;
    if size_mb > limit_mb as f64 {
        return Err(EdaError::FileTooLarge { size_mb, limit_mb });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SemanticType;
    use crate::utils::DATETIME_DTYPE;

    // ==================== load_csv_bytes tests ====================

    #[test]
    fn test_load_csv_bytes_detects_and_infers() {
        let bytes = b"date;amount;grade\n\
            2023-01-01;10;a\n\
            2023-01-02;12;b\n\
            2023-01-03;9;a\n\
            2023-01-04;15;b\n\
            2023-01-05;11;a\n";
        let table = load_csv_bytes(bytes, "sales.csv", &AppConfig::default()).unwrap();

        assert_eq!(table.delimiter, Some(Delimiter::Semicolon));
        assert_eq!(table.encoding.as_ref().map(|e| e.name.as_str()), Some("utf-8"));
        assert_eq!(table.df.column("date").unwrap().dtype(), &DATETIME_DTYPE);
        let grade = table
            .inferences
            .iter()
            .find(|i| i.column == "grade")
            .unwrap();
        assert_eq!(grade.semantic_type, SemanticType::Categorical);
    }

    #[test]
    fn test_load_csv_bytes_without_auto_detect() {
        let config = AppConfig::builder().auto_detect(false).build().unwrap();
        let bytes = b"date,amount\n2023-01-01,10\n";
        let table = load_csv_bytes(bytes, "t.csv", &config).unwrap();
        assert!(table.inferences.is_empty());
        assert_eq!(table.df.column("date").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_load_csv_bytes_shift_jis() {
        let text = "名前,年齢\n田中,30\n佐藤,25\n鈴木,41\n".repeat(10);
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode(&text);
        let table = load_csv_bytes(&bytes, "jp.csv", &AppConfig::default()).unwrap();
        assert_eq!(table.df.get_column_names_str(), vec!["名前", "年齢"]);
    }

    #[test]
    fn test_load_csv_bytes_size_limit() {
        let config = AppConfig::builder().max_file_size_mb(0).build();
        // A zero limit is rejected by validation, so use the checker directly.
        assert!(config.is_err());
        let mut config = AppConfig::default();
        config.general.max_file_size_mb = 1;
        let err = check_file_size(2 * 1024 * 1024, &config).unwrap_err();
        assert!(matches!(err, EdaError::FileTooLarge { limit_mb: 1, .. }));
    }

    // ==================== load_file tests ====================

    #[test]
    fn test_load_file_unsupported_extension() {
        let err = load_file("notes.txt", &AppConfig::default()).unwrap_err();
        assert!(matches!(err, EdaError::UnsupportedExtension(ext) if ext == "txt"));
    }

    #[test]
    fn test_load_file_missing_file_is_io_error() {
        let err = load_file("does/not/exist.csv", &AppConfig::default()).unwrap_err();
        assert!(matches!(err, EdaError::Io(_)));
    }

    #[test]
    fn test_summary_renders_delimiter() {
        let table = load_csv_bytes(b"a\tb\n1\t2\n", "t.tsv", &AppConfig::default()).unwrap();
        let summary = serde_json::to_value(table.summary()).unwrap();
        assert_eq!(summary["delimiter"], "\\t");
        assert_eq!(summary["encoding"]["method"], "ascii");
    }
}
