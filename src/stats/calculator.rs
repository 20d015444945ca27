//! Statistics Calculator Module
//! Headline KPIs and descriptive statistics of the measure per row and per group.

use super::aggregator::{Aggregator, GroupLevel};
use crate::data::DatasetKind;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::{BTreeSet, HashMap};

/// Two-sided confidence level of the interval around the mean.
const CONFIDENCE: f64 = 0.95;

/// Descriptive statistics of the measure over a set of rows.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    pub group_name: String,
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub variance: f64,
    pub p95: f64,
    pub p05: f64,
    /// 95% Student-t confidence interval of the mean; NaN below two values.
    pub ci_low: f64,
    pub ci_high: f64,
}

impl Default for GroupStats {
    fn default() -> Self {
        Self {
            group_name: String::new(),
            count: 0,
            total: 0.0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            variance: f64::NAN,
            p95: f64::NAN,
            p05: f64::NAN,
            ci_low: f64::NAN,
            ci_high: f64::NAN,
        }
    }
}

/// Headline numbers of one filtered view.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub kind: DatasetKind,
    pub records: usize,
    pub measure_total: f64,
    pub states: usize,
    pub districts: usize,
    pub pincodes: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub per_record: GroupStats,
}

/// Handles statistical calculations with multi-threading support.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> GroupStats {
        let n = values.len();
        if n == 0 {
            return GroupStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let total = values.iter().sum::<f64>();
        let mean = total / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        let variance = if n > 1 {
            values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };

        let std = variance.sqrt();
        let (ci_low, ci_high) = Self::mean_interval(mean, std, n);

        GroupStats {
            group_name: String::new(),
            count: n,
            total,
            mean,
            median,
            std,
            variance,
            p95: Self::percentile(&sorted, 95.0),
            p05: Self::percentile(&sorted, 5.0),
            ci_low,
            ci_high,
        }
    }

    /// Student-t interval of the mean of `n` values with sample std `std`.
    fn mean_interval(mean: f64, std: f64, n: usize) -> (f64, f64) {
        if n < 2 {
            return (f64::NAN, f64::NAN);
        }
        let df = (n - 1) as f64;
        match StudentsT::new(0.0, 1.0, df) {
            Ok(dist) => {
                let t = dist.inverse_cdf(1.0 - (1.0 - CONFIDENCE) / 2.0);
                let margin = t * std / (n as f64).sqrt();
                (mean - margin, mean + margin)
            }
            Err(_) => (f64::NAN, f64::NAN),
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// KPIs of the view held by `agg`.
    pub fn summarize(agg: &Aggregator) -> Summary {
        let records = agg.records();
        let mut states = BTreeSet::new();
        let mut districts = BTreeSet::new();
        let mut pincodes = BTreeSet::new();
        // Blank keys are not counted as a location.
        for record in records {
            for (set, key) in [
                (&mut states, &record.state),
                (&mut districts, &record.district),
                (&mut pincodes, &record.pincode),
            ] {
                if !key.is_empty() {
                    set.insert(key.as_str());
                }
            }
        }

        let values: Vec<f64> = records.iter().map(|r| agg.value(r)).collect();
        let mut per_record = Self::compute_descriptive_stats(&values);
        per_record.group_name = "all".to_string();

        Summary {
            kind: agg.kind(),
            records: records.len(),
            measure_total: agg.measure_total(),
            states: states.len(),
            districts: districts.len(),
            pincodes: pincodes.len(),
            first_date: records.iter().map(|r| r.date).min(),
            last_date: records.iter().map(|r| r.date).max(),
            per_record,
        }
    }

    /// Per-group statistics of the per-row measure, computed in parallel and
    /// returned sorted by group name.
    pub fn compute_group_stats_parallel(agg: &Aggregator, level: GroupLevel) -> Vec<GroupStats> {
        let mut by_group: HashMap<&str, Vec<f64>> = HashMap::new();
        for record in agg.records() {
            let key = match level {
                GroupLevel::State => record.state.as_str(),
                GroupLevel::District => record.district.as_str(),
                GroupLevel::Pincode => record.pincode.as_str(),
            };
            by_group.entry(key).or_default().push(agg.value(record));
        }

        // Use rayon for parallel computation
        let mut stats: Vec<GroupStats> = by_group
            .into_par_iter()
            .map(|(name, values)| {
                let mut gs = Self::compute_descriptive_stats(&values);
                gs.group_name = name.to_string();
                gs
            })
            .collect();
        stats.sort_by(|a, b| a.group_name.cmp(&b.group_name));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::tests::{date, record, sample_enrolment};
    use crate::data::RecordTable;
    use crate::stats::Measure;

    #[test]
    fn descriptive_stats_of_small_sample() {
        let gs = StatsCalculator::compute_descriptive_stats(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(gs.count, 4);
        assert_eq!(gs.total, 10.0);
        assert_eq!(gs.mean, 2.5);
        assert_eq!(gs.median, 2.5);
        assert!((gs.variance - 5.0 / 3.0).abs() < 1e-12);
        assert!((gs.p95 - 3.85).abs() < 1e-12);
        assert!((gs.p05 - 1.15).abs() < 1e-12);
        // t(0.975, 3) = 3.182446
        let margin = 3.182446 * (5.0f64 / 3.0).sqrt() / 2.0;
        assert!((gs.ci_low - (2.5 - margin)).abs() < 1e-4);
        assert!((gs.ci_high - (2.5 + margin)).abs() < 1e-4);
    }

    #[test]
    fn single_value_has_no_interval() {
        let gs = StatsCalculator::compute_descriptive_stats(&[7.0]);
        assert_eq!(gs.mean, 7.0);
        assert_eq!(gs.std, 0.0);
        assert!(gs.ci_low.is_nan() && gs.ci_high.is_nan());
    }

    #[test]
    fn empty_sample_is_nan_not_a_panic() {
        let gs = StatsCalculator::compute_descriptive_stats(&[]);
        assert_eq!(gs.count, 0);
        assert!(gs.mean.is_nan());
    }

    #[test]
    fn summary_counts_distinct_keys() {
        let agg = Aggregator::new(&sample_enrolment(), &Measure::BucketSum).unwrap();
        let summary = StatsCalculator::summarize(&agg);
        assert_eq!(summary.records, 3);
        assert_eq!(summary.measure_total, 46.0);
        assert_eq!(summary.states, 2);
        assert_eq!(summary.districts, 3);
        assert_eq!(summary.pincodes, 3);
        assert_eq!(summary.first_date.unwrap().to_string(), "2023-01-01");
        assert_eq!(summary.per_record.median, 6.0);
    }

    #[test]
    fn blank_keys_are_not_distinct_locations() {
        let table = RecordTable::from_records(
            DatasetKind::Biometric,
            &[
                record(date(1, 1, 2023), "", "", "", &[1.0, 1.0]),
                record(date(2, 1, 2023), "KA", "", "560001", &[1.0, 1.0]),
                record(date(3, 1, 2023), "", "Pune", "", &[1.0, 1.0]),
            ],
        )
        .unwrap();
        let agg = Aggregator::new(&table, &Measure::RowCount).unwrap();
        let summary = StatsCalculator::summarize(&agg);
        assert_eq!(summary.records, 3);
        assert_eq!(summary.states, 1);
        assert_eq!(summary.districts, 1);
        assert_eq!(summary.pincodes, 1);
    }

    #[test]
    fn summary_of_empty_view() {
        let empty = RecordTable::empty(DatasetKind::Demographic);
        let agg = Aggregator::new(&empty, &Measure::RowCount).unwrap();
        let summary = StatsCalculator::summarize(&agg);
        assert_eq!(summary.records, 0);
        assert_eq!(summary.first_date, None);
    }

    #[test]
    fn group_stats_are_sorted_by_name() {
        let agg = Aggregator::new(&sample_enrolment(), &Measure::BucketSum).unwrap();
        let stats = StatsCalculator::compute_group_stats_parallel(&agg, GroupLevel::State);
        let names: Vec<&str> = stats.iter().map(|s| s.group_name.as_str()).collect();
        assert_eq!(names, vec!["KA", "MH"]);
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].total, 40.0);
    }
}
