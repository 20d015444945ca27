//! Command-line interface argument parsing.

use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use uidai_dashboard::data::{parse_date, DatasetKind, FilterCriteria};
use uidai_dashboard::stats::{Granularity, Measure};

/// UIDAI dashboard - enrolment, demographic and biometric CSV analytics
///
/// Loads the configured CSV files of a dataset kind (or an uploaded file),
/// filters them and prints KPIs, trends, pivots, charts or exports.
///
/// Examples:
///   uidai-dashboard summary --kind enrolment --state Karnataka
///   uidai-dashboard --from 01-01-2023 --to 31-03-2023 trend --granularity week
///   uidai-dashboard --upload ./bio.csv --kind biometric charts --out-dir charts
///   uidai-dashboard combined --format json
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Dataset kind to analyze (enrolment, demographic, biometric)
    #[arg(short, long, global = true, default_value = "enrolment")]
    pub kind: DatasetKind,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Measure to aggregate: records, total, or an age-bucket column
    #[arg(long, global = true, default_value = "total", value_parser = parse_measure)]
    pub measure: Measure,

    /// Number of entries in top-N rankings (defaults to the config value)
    #[arg(long, global = true, value_name = "N")]
    pub top: Option<usize>,

    /// CSV file that replaces the default sources of --kind
    #[arg(long, global = true, value_name = "FILE")]
    pub upload: Option<PathBuf>,

    /// Directory searched for the default CSV files
    #[arg(long, global = true, value_name = "DIR", env = "UIDAI_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for uidai_dashboard.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Row filters shared by every subcommand.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct FilterArgs {
    /// First day to include (DD-MM-YYYY)
    #[arg(long, global = true, value_name = "DATE", value_parser = parse_day)]
    pub from: Option<NaiveDate>,

    /// Last day to include (DD-MM-YYYY)
    #[arg(long, global = true, value_name = "DATE", value_parser = parse_day)]
    pub to: Option<NaiveDate>,

    /// State name (case-insensitive)
    #[arg(long, global = true)]
    pub state: Option<String>,

    /// District name (case-insensitive)
    #[arg(long, global = true)]
    pub district: Option<String>,

    /// Exact pincode
    #[arg(long, global = true, conflicts_with = "pin_prefix")]
    pub pincode: Option<String>,

    /// Pincode prefix, e.g. 560 for every Bangalore pincode
    #[arg(long, global = true, value_name = "DIGITS")]
    pub pin_prefix: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// KPIs, top-N rankings and the age distribution
    Summary,
    /// Measure per day, week or month
    Trend {
        #[arg(long, default_value = "month")]
        granularity: GranularityArg,
        /// Insert zero-valued periods between observed ones
        #[arg(long)]
        fill_gaps: bool,
    },
    /// Month x state pivot of the measure
    Pivot {
        /// Number of state columns (defaults to the config value)
        #[arg(long, value_name = "N")]
        states: Option<usize>,
    },
    /// Write the filtered rows as CSV
    Export {
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Render SVG charts of the filtered view
    Charts {
        #[arg(long, default_value = "charts", value_name = "DIR")]
        out_dir: PathBuf,
        #[arg(long, default_value = "month")]
        granularity: GranularityArg,
    },
    /// Per-key totals of all three dataset kinds side by side
    Combined {
        /// Write the combined table as CSV instead of printing it
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print the filter choices available for --kind
    Options,
    /// Generate a default uidai_dashboard.toml
    InitConfig,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum GranularityArg {
    Day,
    Week,
    #[default]
    Month,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Day => Granularity::Day,
            GranularityArg::Week => Granularity::Week,
            GranularityArg::Month => Granularity::Month,
        }
    }
}

fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("'{raw}' is not a DD-MM-YYYY date"))
}

fn parse_measure(raw: &str) -> Result<Measure, String> {
    let measure = match raw.trim().to_ascii_lowercase().as_str() {
        "" => return Err("measure cannot be empty".to_string()),
        "records" | "rows" | "count" => Measure::RowCount,
        "total" | "sum" => Measure::BucketSum,
        column => Measure::Bucket(column.to_string()),
    };
    Ok(measure)
}

impl FilterArgs {
    pub fn criteria(&self) -> FilterCriteria {
        let mut criteria = FilterCriteria::new();
        if let Some(from) = self.from {
            criteria = criteria.from_date(from);
        }
        if let Some(to) = self.to {
            criteria = criteria.to_date(to);
        }
        if let Some(state) = &self.state {
            criteria = criteria.state(state.as_str());
        }
        if let Some(district) = &self.district {
            criteria = criteria.district(district.as_str());
        }
        if let Some(pincode) = &self.pincode {
            criteria = criteria.pincode(pincode.as_str());
        }
        if let Some(prefix) = &self.pin_prefix {
            criteria = criteria.pincode_prefix(prefix.as_str());
        }
        criteria
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::WARN
        }
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> String {
        self.log_level().as_str().to_ascii_lowercase()
    }
}
