//! Aggregator
//! Derives grouped totals, rankings, age distributions, time series and the
//! month x state pivot from a (filtered) Record Table.

use crate::data::{DatasetKind, Record, RecordTable};
use chrono::{Datelike, Duration, Months, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// Default number of entries in a top-N ranking.
pub const DEFAULT_TOP_N: usize = 10;

/// Default number of state columns in the month x state pivot.
pub const DEFAULT_PIVOT_STATES: usize = 15;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("{kind} data has no age-bucket column '{column}'")]
    UnknownMeasure { kind: DatasetKind, column: String },
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// The numeric quantity summed by every aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Each row counts as one.
    RowCount,
    /// Sum of all age-bucket columns of the row.
    #[default]
    BucketSum,
    /// A single age-bucket column.
    Bucket(String),
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::RowCount => f.write_str("records"),
            Measure::BucketSum => f.write_str("total"),
            Measure::Bucket(column) => f.write_str(column),
        }
    }
}

/// A measure bound to a concrete kind's bucket layout.
#[derive(Debug, Clone, Copy)]
enum ResolvedMeasure {
    RowCount,
    BucketSum,
    Bucket(usize),
}

impl ResolvedMeasure {
    fn resolve(measure: &Measure, kind: DatasetKind) -> Result<Self, AggregateError> {
        match measure {
            Measure::RowCount => Ok(Self::RowCount),
            Measure::BucketSum => Ok(Self::BucketSum),
            Measure::Bucket(column) => kind
                .bucket_columns()
                .iter()
                .position(|c| *c == column.as_str())
                .map(Self::Bucket)
                .ok_or_else(|| AggregateError::UnknownMeasure {
                    kind,
                    column: column.clone(),
                }),
        }
    }

    fn value(&self, record: &Record) -> f64 {
        match self {
            Self::RowCount => 1.0,
            Self::BucketSum => record.bucket_sum(),
            Self::Bucket(idx) => record.buckets.get(*idx).copied().unwrap_or(0.0),
        }
    }
}

/// Grouping dimension for totals and rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupLevel {
    State,
    District,
    Pincode,
}

impl GroupLevel {
    fn key<'a>(&self, record: &'a Record) -> &'a str {
        match self {
            GroupLevel::State => &record.state,
            GroupLevel::District => &record.district,
            GroupLevel::Pincode => &record.pincode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal {
    pub name: String,
    pub value: f64,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBucket {
    pub column: String,
    pub total: f64,
    /// Share of the distribution total, 0 when the total is 0.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeDistribution {
    pub buckets: Vec<AgeBucket>,
    pub total: f64,
}

/// Time bucket width of a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    /// ISO weeks, starting on Monday.
    Week,
    #[default]
    Month,
}

impl Granularity {
    /// First day of the period containing `date`.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
        }
    }

    fn next_period(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.checked_add_signed(Duration::days(1)),
            Granularity::Week => start.checked_add_signed(Duration::days(7)),
            Granularity::Month => start.checked_add_months(Months::new(1)),
        }
    }

    pub fn label(&self, start: NaiveDate) -> String {
        match self {
            Granularity::Day | Granularity::Week => start.format("%Y-%m-%d").to_string(),
            Granularity::Month => start.format("%Y-%m").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePoint {
    pub period: NaiveDate,
    pub label: String,
    pub value: f64,
    pub rows: usize,
}

/// Months (rows) by top states (columns); absent pairs are zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthStatePivot {
    pub months: Vec<String>,
    pub states: Vec<String>,
    pub cells: Vec<Vec<f64>>,
}

impl MonthStatePivot {
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn cell(&self, month: &str, state: &str) -> Option<f64> {
        let row = self.months.iter().position(|m| m == month)?;
        let col = self.states.iter().position(|s| s == state)?;
        Some(self.cells[row][col])
    }

    /// Wide frame: a `month` column followed by one column per state.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns = vec![Column::new("month".into(), self.months.clone())];
        for (idx, state) in self.states.iter().enumerate() {
            let values: Vec<f64> = self.cells.iter().map(|row| row[idx]).collect();
            columns.push(Column::new(state.as_str().into(), values));
        }
        DataFrame::new(columns)
    }
}

/// Caller knobs for a full aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateOptions {
    pub measure: Measure,
    pub top_n: usize,
    pub granularity: Granularity,
    /// Insert zero-valued periods between observed ones.
    pub fill_gaps: bool,
    pub pivot_states: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            measure: Measure::default(),
            top_n: DEFAULT_TOP_N,
            granularity: Granularity::default(),
            fill_gaps: false,
            pivot_states: DEFAULT_PIVOT_STATES,
        }
    }
}

/// Every derived summary of one filtered view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub kind: DatasetKind,
    pub measure: Measure,
    pub total_count: usize,
    pub measure_total: f64,
    pub by_state: Vec<GroupTotal>,
    pub by_district: Vec<GroupTotal>,
    pub by_pincode: Vec<GroupTotal>,
    pub top_states: Vec<GroupTotal>,
    pub top_districts: Vec<GroupTotal>,
    pub top_pincodes: Vec<GroupTotal>,
    pub age_distribution: AgeDistribution,
    pub time_series: Vec<TimePoint>,
    pub pivot: MonthStatePivot,
}

/// Measure-agnostic aggregation over the rows of one table.
pub struct Aggregator {
    kind: DatasetKind,
    measure: ResolvedMeasure,
    records: Vec<Record>,
}

impl Aggregator {
    pub fn new(table: &RecordTable, measure: &Measure) -> Result<Self, AggregateError> {
        Ok(Self {
            kind: table.kind(),
            measure: ResolvedMeasure::resolve(measure, table.kind())?,
            records: table.records()?,
        })
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Measure value of a single row.
    pub fn value(&self, record: &Record) -> f64 {
        self.measure.value(record)
    }

    pub fn total_count(&self) -> usize {
        self.records.len()
    }

    pub fn measure_total(&self) -> f64 {
        self.records.iter().map(|r| self.measure.value(r)).sum()
    }

    /// Totals per group, descending by value, ties ascending by name.
    pub fn grouped(&self, level: GroupLevel) -> Vec<GroupTotal> {
        let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();
        for record in &self.records {
            let entry = totals.entry(level.key(record)).or_insert((0.0, 0));
            entry.0 += self.measure.value(record);
            entry.1 += 1;
        }

        let mut groups: Vec<GroupTotal> = totals
            .into_iter()
            .map(|(name, (value, rows))| GroupTotal {
                name: name.to_string(),
                value,
                rows,
            })
            .collect();
        groups.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
        groups
    }

    /// The first `n` groups of `grouped(level)`; fewer when fewer exist.
    pub fn top_n(&self, level: GroupLevel, n: usize) -> Vec<GroupTotal> {
        let mut groups = self.grouped(level);
        groups.truncate(n);
        groups
    }

    /// Per-bucket sums across the table, independent of the chosen measure.
    pub fn age_distribution(&self) -> AgeDistribution {
        let columns = self.kind.bucket_columns();
        let mut sums = vec![0.0; columns.len()];
        for record in &self.records {
            for (sum, value) in sums.iter_mut().zip(&record.buckets) {
                *sum += value;
            }
        }
        let total: f64 = sums.iter().sum();
        let buckets = columns
            .iter()
            .zip(sums)
            .map(|(column, sum)| AgeBucket {
                column: column.to_string(),
                total: sum,
                share: if total > 0.0 { sum / total } else { 0.0 },
            })
            .collect();
        AgeDistribution { buckets, total }
    }

    /// Chronological series of measure sums per period.
    ///
    /// Periods without rows are absent unless `fill_gaps` is set, in which
    /// case they appear with a zero value between the first and last period.
    pub fn time_series(&self, granularity: Granularity, fill_gaps: bool) -> Vec<TimePoint> {
        let mut periods: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for record in &self.records {
            let entry = periods
                .entry(granularity.period_start(record.date))
                .or_insert((0.0, 0));
            entry.0 += self.measure.value(record);
            entry.1 += 1;
        }

        if fill_gaps {
            let bounds = periods
                .keys()
                .next()
                .copied()
                .zip(periods.keys().next_back().copied());
            if let Some((first, last)) = bounds {
                let mut cursor = first;
                while cursor < last {
                    periods.entry(cursor).or_insert((0.0, 0));
                    match granularity.next_period(cursor) {
                        Some(next) => cursor = next,
                        None => break,
                    }
                }
            }
        }

        periods
            .into_iter()
            .map(|(period, (value, rows))| TimePoint {
                period,
                label: granularity.label(period),
                value,
                rows,
            })
            .collect()
    }

    /// Month x state matrix restricted to the `max_states` largest states.
    pub fn month_state_pivot(&self, max_states: usize) -> MonthStatePivot {
        let states: Vec<String> = self
            .top_n(GroupLevel::State, max_states)
            .into_iter()
            .map(|g| g.name)
            .collect();
        let column_of: HashMap<&str, usize> = states
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.as_str(), idx))
            .collect();

        let mut rows: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        for record in &self.records {
            let row = rows
                .entry(Granularity::Month.period_start(record.date))
                .or_insert_with(|| vec![0.0; states.len()]);
            if let Some(&idx) = column_of.get(record.state.as_str()) {
                row[idx] += self.measure.value(record);
            }
        }

        let (months, cells): (Vec<String>, Vec<Vec<f64>>) = rows
            .into_iter()
            .map(|(month, row)| (Granularity::Month.label(month), row))
            .unzip();
        MonthStatePivot {
            months,
            states,
            cells,
        }
    }

    pub fn summarize(&self, options: &AggregateOptions) -> AggregateResult {
        let by_state = self.grouped(GroupLevel::State);
        let by_district = self.grouped(GroupLevel::District);
        let by_pincode = self.grouped(GroupLevel::Pincode);
        let top = |groups: &[GroupTotal]| -> Vec<GroupTotal> {
            groups.iter().take(options.top_n).cloned().collect()
        };

        AggregateResult {
            kind: self.kind,
            measure: options.measure.clone(),
            total_count: self.total_count(),
            measure_total: self.measure_total(),
            top_states: top(&by_state),
            top_districts: top(&by_district),
            top_pincodes: top(&by_pincode),
            by_state,
            by_district,
            by_pincode,
            age_distribution: self.age_distribution(),
            time_series: self.time_series(options.granularity, options.fill_gaps),
            pivot: self.month_state_pivot(options.pivot_states),
        }
    }
}

/// One-shot aggregation of a table with the given options.
pub fn aggregate(
    table: &RecordTable,
    options: &AggregateOptions,
) -> Result<AggregateResult, AggregateError> {
    Ok(Aggregator::new(table, &options.measure)?.summarize(options))
}
