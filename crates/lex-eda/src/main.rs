//! CLI entry point for exploratory data analysis.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use lex_eda::analysis::{
    Distribution, analyze_correlation, analyze_distribution, analyze_timeseries, detect_outliers,
};
use lex_eda::preprocessing::{DuplicateKeep, MissingValueMethod, Operation};
use lex_eda::reporting::{
    export_history_report, export_table_csv, write_correlation_csv, write_timeseries_csv,
};
use lex_eda::{AppConfig, CorrelationMethod, DataProfiler, OutlierMethod, Session};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "lex-eda",
    version,
    about = "Exploratory data analysis for CSV and Excel files",
    long_about = "Detects encodings, delimiters and column types, profiles the data and runs \
                  distribution, outlier, correlation and time series analyses.\n\n\
                  EXAMPLES:\n  \
                  # Profile a file\n  \
                  lex-eda profile data.csv\n\n  \
                  # Spearman correlation, exported as a matrix\n  \
                  lex-eda correlate data.csv --method spearman --output corr.csv\n\n  \
                  # Fill, deduplicate and save\n  \
                  lex-eda clean data.csv --step missing:age:median --step duplicates:first \\\n    \
                  --output clean.csv --report history.txt"
)]
struct Cli {
    /// Configuration file (YAML or JSON); defaults are used when absent or invalid
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logging so stdout stays machine readable.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show detection results and the dataset profile
    Profile { file: PathBuf },

    /// Describe the distribution of one column
    Distribution {
        file: PathBuf,
        #[arg(short, long)]
        column: String,
        /// Histogram bins (Sturges' rule when omitted)
        #[arg(long)]
        bins: Option<usize>,
    },

    /// Detect outliers in a numeric column
    Outliers {
        file: PathBuf,
        #[arg(short, long)]
        column: String,
        /// iqr, zscore or modified-zscore
        #[arg(short, long, default_value = "iqr")]
        method: String,
    },

    /// Correlation matrix of the numeric columns
    Correlate {
        file: PathBuf,
        /// pearson, spearman or kendall (config default when omitted)
        #[arg(short, long)]
        method: Option<String>,
        /// Minimum |r| for a strong pair (config default when omitted)
        #[arg(short, long)]
        threshold: Option<f64>,
        /// Write the matrix as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Trend, moving averages, forecast and periodicity of a series
    Timeseries {
        file: PathBuf,
        #[arg(long)]
        date: String,
        #[arg(long)]
        value: String,
        /// Forecast horizon in periods of the detected frequency
        #[arg(long)]
        periods: Option<usize>,
        /// Write observations and forecast as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply preprocessing steps in order and save the result
    ///
    /// Steps: missing:<col>:<method>[:<value>], outliers:<col>:<method>,
    /// convert:<col>:<target>, duplicates:first|last, undo, reset
    Clean {
        file: PathBuf,
        #[arg(short, long = "step", required = true)]
        steps: Vec<String>,
        /// Cleaned table as CSV
        #[arg(short, long)]
        output: PathBuf,
        /// Plain-text history report
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

/// One `clean` step.
#[derive(Debug, PartialEq)]
enum Step {
    Apply(Operation),
    Undo,
    Reset,
}

fn parse_step(raw: &str) -> Result<Step> {
    let parts: Vec<&str> = raw.split(':').collect();
    let step = match parts.as_slice() {
        ["undo"] => Step::Undo,
        ["reset"] => Step::Reset,
        ["missing", column, method @ ..] if !method.is_empty() => {
            Step::Apply(Operation::HandleMissing {
                column: column.to_string(),
                method: method.join(":").parse::<MissingValueMethod>()?,
            })
        }
        ["outliers", column, method] => Step::Apply(Operation::RemoveOutliers {
            column: column.to_string(),
            method: method.parse()?,
        }),
        ["convert", column, target] => Step::Apply(Operation::ConvertType {
            column: column.to_string(),
            target: target.parse()?,
        }),
        ["duplicates"] => Step::Apply(Operation::RemoveDuplicates {
            keep: DuplicateKeep::First,
        }),
        ["duplicates", keep] => Step::Apply(Operation::RemoveDuplicates {
            keep: keep.parse()?,
        }),
        _ => bail!("Invalid step '{raw}'"),
    };
    Ok(step)
}

/// Initialize the tracing subscriber on stderr.
///
/// When `json_output` is true, logging is disabled entirely.
fn init_logging(level: &str, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load(session: &mut Session, file: &Path, config: &AppConfig) -> Result<()> {
    session
        .load_file(file, config)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json);

    let config = cli
        .config
        .as_ref()
        .map(AppConfig::load)
        .unwrap_or_default();
    let mut session = Session::new();

    match cli.command {
        Command::Profile { file } => {
            load(&mut session, &file, &config)?;
            let summary = session
                .load_summary()
                .ok_or_else(|| anyhow!("No load summary for {}", file.display()))?;
            let profile = DataProfiler::profile(session.current()?)?;
            if cli.json {
                return print_json(&serde_json::json!({ "load": summary, "profile": profile }));
            }

            println!("\n{}", "=".repeat(60));
            println!("PROFILE: {}", summary.file_name);
            println!("{}", "=".repeat(60));
            if let Some(encoding) = &summary.encoding {
                println!("  Encoding:   {} ({:.0}%)", encoding.name, encoding.confidence * 100.0);
            }
            if let Some(delimiter) = &summary.delimiter {
                println!("  Delimiter:  {delimiter}");
            }
            println!(
                "  Shape:      {} rows x {} columns ({:.2} MB)",
                profile.shape.rows, profile.shape.columns, profile.shape.memory_usage_mb
            );
            println!(
                "  Missing:    {} cells ({:.1}%)",
                profile.missing.total_missing, profile.missing.missing_percentage
            );
            println!(
                "  Duplicates: {} rows ({:.1}%)",
                profile.duplicates.duplicate_count, profile.duplicates.duplicate_percentage
            );
            println!("\nCOLUMN TYPES");
            println!("{}", "-".repeat(40));
            for inference in &summary.inferences {
                println!(
                    "  {:<24} {:<12} {:?}",
                    inference.column,
                    inference.semantic_type.to_string(),
                    inference.rule
                );
            }
            for warning in &summary.warnings {
                println!("\nWARNING: {warning}");
            }
        }

        Command::Distribution { file, column, bins } => {
            load(&mut session, &file, &config)?;
            let distribution = analyze_distribution(session.current()?, &column, bins, &config)?;
            if cli.json {
                return print_json(&distribution);
            }
            match distribution {
                Distribution::Numeric(d) => {
                    println!("{} (numeric, n = {})", d.column, d.count);
                    println!("  mean {:.4}  median {:.4}  std {:.4}", d.mean, d.median, d.std);
                    println!(
                        "  min {:.4}  q25 {:.4}  q75 {:.4}  max {:.4}",
                        d.min, d.q25, d.q75, d.max
                    );
                    for bin in &d.histogram {
                        println!("  [{:>10.3}, {:>10.3}) {}", bin.start, bin.end, bin.count);
                    }
                    for outliers in &d.outliers {
                        println!(
                            "  outliers ({}): {} ({:.1}%)",
                            outliers.method, outliers.count, outliers.percentage
                        );
                    }
                }
                Distribution::Categorical(d) => {
                    println!("{} (categorical, {} unique)", d.column, d.unique_count);
                    for category in &d.categories {
                        println!(
                            "  {:<24} {:>8} {:>6.1}%",
                            category.value, category.count, category.percentage
                        );
                    }
                }
            }
        }

        Command::Outliers {
            file,
            column,
            method,
        } => {
            let method: OutlierMethod = method.parse()?;
            load(&mut session, &file, &config)?;
            let report = detect_outliers(session.current()?, &column, method)?;
            if cli.json {
                return print_json(&report);
            }
            println!(
                "{}: {} of {} values are outliers ({:.1}%) by {}",
                report.column,
                report.outlier_count,
                report.total_count,
                report.outlier_percentage,
                report.method
            );
            println!("  bounds: {:?}", report.bounds);
        }

        Command::Correlate {
            file,
            method,
            threshold,
            output,
        } => {
            let method = match method {
                Some(name) => name.parse::<CorrelationMethod>()?,
                None => config.correlation.method,
            };
            let threshold = threshold.unwrap_or(config.correlation.threshold);
            load(&mut session, &file, &config)?;
            let analysis = analyze_correlation(session.current()?, method, threshold)?;

            if let Some(path) = &output {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                write_correlation_csv(&analysis, file)?;
                info!("Correlation matrix written to {}", path.display());
            }
            if cli.json {
                return print_json(&analysis);
            }
            println!(
                "{} correlation over {} columns ({} complete rows)",
                analysis.method,
                analysis.columns.len(),
                analysis.rows_used
            );
            if analysis.strong_pairs.is_empty() {
                println!("  No pairs with |r| >= {threshold}");
            }
            for pair in &analysis.strong_pairs {
                println!(
                    "  {:<20} {:<20} {:>7.3}  {:?}",
                    pair.column_x, pair.column_y, pair.coefficient, pair.strength
                );
            }
        }

        Command::Timeseries {
            file,
            date,
            value,
            periods,
            output,
        } => {
            let mut config = config;
            if let Some(periods) = periods {
                config.timeseries.forecast_periods = periods;
            }
            load(&mut session, &file, &config)?;
            let analysis = analyze_timeseries(session.current()?, &date, &value, &config)?;

            if let Some(path) = &output {
                let forecast = analysis
                    .forecast
                    .as_ref()
                    .ok_or_else(|| anyhow!("Too few observations to forecast"))?;
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                write_timeseries_csv(&forecast.points, file)?;
                info!("Series written to {}", path.display());
            }
            if cli.json {
                return print_json(&analysis);
            }
            println!(
                "{} over {} ({} observations, {:?})",
                analysis.value_column,
                analysis.date_column,
                analysis.observations,
                analysis.frequency
            );
            println!(
                "  trend: {:?} (slope {:.3e}/s, R² {:.3})",
                analysis.trend.direction, analysis.trend.slope, analysis.trend.r_squared
            );
            match &analysis.forecast {
                Some(forecast) => println!(
                    "  forecast: {:?} model, {} periods, R² {:.3}",
                    forecast.model, forecast.periods, forecast.r_squared
                ),
                None => println!("  forecast: skipped (too few observations)"),
            }
        }

        Command::Clean {
            file,
            steps,
            output,
            report,
        } => {
            let steps = steps
                .iter()
                .map(|raw| parse_step(raw))
                .collect::<Result<Vec<_>>>()?;
            load(&mut session, &file, &config)?;

            let mut applied = Vec::new();
            for step in steps {
                match step {
                    Step::Apply(operation) => applied.push(session.apply(&operation)?),
                    Step::Undo => {
                        if session.undo()?.is_some() {
                            applied.pop();
                        }
                    }
                    Step::Reset => {
                        session.reset()?;
                        applied.clear();
                    }
                }
            }

            export_table_csv(session.current()?, &output)?;
            if let Some(path) = &report {
                export_history_report(session.history()?, path)?;
            }

            let comparison = lex_eda::preprocessing::compare_tables(
                session.original()?,
                session.current()?,
            );
            if cli.json {
                return print_json(&serde_json::json!({
                    "operations": applied,
                    "comparison": comparison,
                }));
            }
            for record in &applied {
                println!("{}", record.kind.name());
                for line in record.describe().lines() {
                    println!("  {line}");
                }
            }
            println!(
                "Saved {} rows x {} columns to {}",
                comparison.shape_after.0,
                comparison.shape_after.1,
                output.display()
            );
        }
    }

    Ok(())
}
