//! Exports of tables, analysis results and the preprocessing history.
//!
//! Every `write_*` function targets any [`std::io::Write`]; the `export_*`
//! variants create the file (and its parent directories) first.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_eda::reporting::{export_table_csv, export_history_report};
//!
//! export_table_csv(session.current()?, "output/cleaned.csv")?;
//! export_history_report(session.history()?, "output/history.txt")?;
//! ```

mod export;

pub use export::{
    export_history_report, export_table_csv, history_report, write_correlation_csv,
    write_table_csv, write_timeseries_csv,
};
