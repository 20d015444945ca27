//! Stats module - aggregation and descriptive statistics

mod aggregator;
mod calculator;
mod combined;

pub use aggregator::{
    aggregate, AgeBucket, AgeDistribution, AggregateError, AggregateOptions, AggregateResult,
    Aggregator, Granularity, GroupLevel, GroupTotal, Measure, MonthStatePivot, TimePoint,
    DEFAULT_PIVOT_STATES, DEFAULT_TOP_N,
};
pub use calculator::{GroupStats, StatsCalculator, Summary};
pub use combined::{CombinedRow, CombinedView};
