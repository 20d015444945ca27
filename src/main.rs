//! UIDAI dashboard command-line front end.
//!
//! Exit codes:
//!   0 - Success (including the "No data loaded" empty state)
//!   1 - Runtime error (unreadable config or upload, bad measure, write failure)

mod cli;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uidai_dashboard::charts::{StaticChartRenderer, DEFAULT_SIZE};
use uidai_dashboard::config::CONFIG_FILE;
use uidai_dashboard::data::{
    frame_to_csv_bytes, write_csv, DatasetKind, FilterCriteria, LoadWarning,
};
use uidai_dashboard::stats::{
    AggregateOptions, Aggregator, CombinedView, Granularity, GroupTotal, TimePoint,
};
use uidai_dashboard::{Dashboard, DashboardConfig, SummaryReport, View};

const NO_DATA: &str = "No data loaded";
const NO_MATCH: &str = "No rows match the current filters.";

fn main() {
    let args = Args::parse_args();

    if matches!(args.command, Command::InitConfig) {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    init_logging(&args);
    info!("uidai-dashboard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args) {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Generate a default uidai_dashboard.toml in the working directory.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("{CONFIG_FILE} already exists. Remove it first or edit it manually.");
    }
    fs::write(path, DashboardConfig::default_toml())
        .with_context(|| format!("Failed to write {CONFIG_FILE}"))?;
    println!("Created {CONFIG_FILE} with default settings.");
    Ok(())
}

/// Initialize logging; `RUST_LOG` wins over the verbosity flags.
fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_directive()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber was already installed");
    }
}

fn run(args: Args) -> Result<()> {
    let config = DashboardConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_data_dir(args.data_dir.clone());
    let mut dashboard = Dashboard::new(config);
    debug!(data_dir = ?dashboard.config().data_dir, "configuration loaded");

    if let Some(path) = &args.upload {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let report = dashboard
            .upload(args.kind, &name, bytes)
            .with_context(|| format!("Upload {} rejected", path.display()))?;
        info!(rows = report.rows_kept, dropped = report.dropped_dates, "upload accepted");
    }

    let criteria = args.filter.criteria();
    let mut options = dashboard.aggregate_options();
    options.measure = args.measure.clone();
    if let Some(top) = args.top {
        options.top_n = top;
    }

    match &args.command {
        Command::Combined { out } => {
            return run_combined(&mut dashboard, &criteria, out.as_deref(), args.format)
        }
        Command::Options => {
            let choices = dashboard.filter_options(args.kind, args.filter.state.as_deref())?;
            report_warnings(&choices.warnings);
            return match args.format {
                OutputFormat::Json => print_json(&choices),
                OutputFormat::Text => {
                    println!("States:    {}", choices.states.join(", "));
                    println!("Districts: {}", choices.districts.join(", "));
                    if let (Some(min), Some(max)) = (choices.min_date, choices.max_date) {
                        println!("Dates:     {} .. {}", min.format("%d-%m-%Y"), max.format("%d-%m-%Y"));
                    }
                    Ok(())
                }
            };
        }
        _ => {}
    }

    let view = dashboard.view(args.kind, &criteria)?;
    report_warnings(&view.warnings);
    if view.no_data {
        println!("{NO_DATA}");
        return Ok(());
    }

    match args.command {
        Command::Summary => {
            let report = dashboard.summary(args.kind, &criteria, &options)?;
            match args.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => print_summary(&report),
            }
        }
        Command::Trend {
            granularity,
            fill_gaps,
        } => {
            let agg = Aggregator::new(&view.table, &options.measure)?;
            let series = agg.time_series(granularity.into(), fill_gaps);
            match args.format {
                OutputFormat::Json => print_json(&series)?,
                OutputFormat::Text => print_series(&series, &options),
            }
        }
        Command::Pivot { states } => {
            let agg = Aggregator::new(&view.table, &options.measure)?;
            let pivot = agg.month_state_pivot(states.unwrap_or(options.pivot_states));
            match args.format {
                OutputFormat::Json => print_json(&pivot)?,
                OutputFormat::Text if pivot.is_empty() => println!("{NO_MATCH}"),
                OutputFormat::Text => println!("{}", pivot.to_dataframe()?),
            }
        }
        Command::Export { out } => {
            write_csv(&view.table, &out)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} row(s) to {}", view.table.height(), out.display());
        }
        Command::Charts {
            out_dir,
            granularity,
        } => write_charts(&view, &options, granularity.into(), &out_dir)?,
        Command::Combined { .. } | Command::Options | Command::InitConfig => {}
    }
    Ok(())
}

fn run_combined(
    dashboard: &mut Dashboard,
    criteria: &FilterCriteria,
    out: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let report = dashboard.combined(criteria)?;
    report_warnings(&report.warnings);
    if report.no_data {
        println!("{NO_DATA}");
        return Ok(());
    }

    let combined = report.view;
    if let Some(out) = out {
        let mut df = combined.to_dataframe()?;
        let bytes = frame_to_csv_bytes(&mut df)?;
        fs::write(out, bytes).with_context(|| format!("Failed to write {}", out.display()))?;
        println!("Wrote {} row(s) to {}", combined.rows.len(), out.display());
        return Ok(());
    }
    match format {
        OutputFormat::Json => print_json(&combined),
        OutputFormat::Text => {
            print_combined(&combined);
            Ok(())
        }
    }
}

fn report_warnings(warnings: &[LoadWarning]) {
    for warning in warnings {
        eprintln!("Warning: {warning}");
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_groups(title: &str, groups: &[GroupTotal]) {
    println!("\n{title}");
    if groups.is_empty() {
        println!("  (none)");
    }
    for (rank, group) in groups.iter().enumerate() {
        let name = if group.name.is_empty() {
            "(blank)"
        } else {
            group.name.as_str()
        };
        println!("  {:>2}. {:<30} {:>14.0}", rank + 1, name, group.value);
    }
}

fn print_summary(report: &SummaryReport) {
    let summary = &report.summary;
    let aggregate = &report.aggregate;
    println!("{} ({})", summary.kind, aggregate.measure);
    if summary.records == 0 {
        println!("{NO_MATCH}");
        return;
    }
    println!("  Records:        {}", summary.records);
    println!("  Measure total:  {:.0}", summary.measure_total);
    println!("  States:         {}", summary.states);
    println!("  Districts:      {}", summary.districts);
    println!("  Pincodes:       {}", summary.pincodes);
    if let (Some(first), Some(last)) = (summary.first_date, summary.last_date) {
        println!(
            "  Date range:     {} .. {}",
            first.format("%d-%m-%Y"),
            last.format("%d-%m-%Y")
        );
    }
    let stats = &summary.per_record;
    println!(
        "  Per record:     mean {:.2} (95% CI {:.2}..{:.2}), median {:.2}, std {:.2}, p05 {:.2}, p95 {:.2}",
        stats.mean, stats.ci_low, stats.ci_high, stats.median, stats.std, stats.p05, stats.p95
    );

    print_groups("Top states", &aggregate.top_states);
    print_groups("Top districts", &aggregate.top_districts);
    print_groups("Top pincodes", &aggregate.top_pincodes);

    println!("\nAge distribution");
    for bucket in &aggregate.age_distribution.buckets {
        println!(
            "  {:<20} {:>14.0} {:>6.1}%",
            bucket.column,
            bucket.total,
            bucket.share * 100.0
        );
    }

    println!("\nPer-state statistics");
    for stats in &report.per_state {
        println!(
            "  {:<30} n={:<6} mean {:>10.2} median {:>10.2} p95 {:>10.2}",
            stats.group_name, stats.count, stats.mean, stats.median, stats.p95
        );
    }
}

fn print_series(series: &[TimePoint], options: &AggregateOptions) {
    if series.is_empty() {
        println!("{NO_MATCH}");
        return;
    }
    println!("{:<12} {:>14} {:>8}", "period", options.measure.to_string(), "rows");
    for point in series {
        println!("{:<12} {:>14.0} {:>8}", point.label, point.value, point.rows);
    }
}

fn print_combined(combined: &CombinedView) {
    if combined.is_empty() {
        println!("{NO_MATCH}");
        return;
    }
    for kind in DatasetKind::ALL {
        println!("{:<20} {:>14.0}", kind.total_column(), combined.total(kind));
    }
    println!("{} key(s)", combined.rows.len());
}

fn write_charts(
    view: &View,
    options: &AggregateOptions,
    granularity: Granularity,
    out_dir: &Path,
) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let result = Aggregator::new(&view.table, &options.measure)?.summarize(&AggregateOptions {
        granularity,
        ..options.clone()
    });
    let kind = view.kind();
    let measure = options.measure.to_string();

    let charts = [
        (
            "trend.svg",
            StaticChartRenderer::time_series_svg(
                &result.time_series,
                &format!("{kind} trend"),
                &measure,
                DEFAULT_SIZE,
            )?,
        ),
        (
            "top_states.svg",
            StaticChartRenderer::ranking_svg(
                &result.top_states,
                &format!("Top {} states", options.top_n),
                &measure,
                DEFAULT_SIZE,
            )?,
        ),
        (
            "top_districts.svg",
            StaticChartRenderer::ranking_svg(
                &result.top_districts,
                &format!("Top {} districts", options.top_n),
                &measure,
                DEFAULT_SIZE,
            )?,
        ),
        (
            "age_distribution.svg",
            StaticChartRenderer::age_distribution_svg(
                &result.age_distribution,
                &format!("{kind} age distribution"),
                DEFAULT_SIZE,
            )?,
        ),
    ];

    for (file, svg) in &charts {
        let path = out_dir.join(file);
        StaticChartRenderer::write_svg(&path, svg)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
