//! Filter Engine
//! Narrows a Record Table to the rows matching every given criterion.

use super::schema::normalize_pincode;
use super::table::{Record, RecordTable};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// How a pincode criterion is compared against the stored key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PincodeMatch {
    #[default]
    Exact,
    Prefix,
}

/// User constraints on a table. A `None` dimension is unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Inclusive lower bound.
    pub date_start: Option<NaiveDate>,
    /// Inclusive upper bound.
    pub date_end: Option<NaiveDate>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub pincode: Option<String>,
    #[serde(default)]
    pub pincode_match: PincodeMatch,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_start = Some(start);
        self.date_end = Some(end);
        self
    }

    pub fn from_date(mut self, start: NaiveDate) -> Self {
        self.date_start = Some(start);
        self
    }

    pub fn to_date(mut self, end: NaiveDate) -> Self {
        self.date_end = Some(end);
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn pincode(mut self, pincode: impl Into<String>) -> Self {
        self.pincode = Some(pincode.into());
        self.pincode_match = PincodeMatch::Exact;
        self
    }

    pub fn pincode_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.pincode = Some(prefix.into());
        self.pincode_match = PincodeMatch::Prefix;
        self
    }

    /// True when the criteria can never match a row.
    pub fn is_unsatisfiable(&self) -> bool {
        if let (Some(start), Some(end)) = (self.date_start, self.date_end) {
            if start > end {
                return true;
            }
        }
        matches!(
            non_blank(&self.pincode),
            Some(pin) if !pin.bytes().all(|b| b.is_ascii_digit())
        )
    }

    /// Compile into a per-row predicate with the text criteria pre-folded.
    fn compile(&self) -> CompiledCriteria {
        CompiledCriteria {
            date_start: self.date_start,
            date_end: self.date_end,
            state: non_blank(&self.state).map(str::to_lowercase),
            district: non_blank(&self.district).map(str::to_lowercase),
            // Exact codes get the stored form; prefixes stay as typed.
            pincode: non_blank(&self.pincode).map(|pin| match self.pincode_match {
                PincodeMatch::Exact => normalize_pincode(pin),
                PincodeMatch::Prefix => pin.to_string(),
            }),
            pincode_match: self.pincode_match,
        }
    }

    /// Whether a single record satisfies every criterion.
    pub fn matches(&self, record: &Record) -> bool {
        !self.is_unsatisfiable() && self.compile().matches(record)
    }
}

/// Trimmed value of an optional text criterion; blank means unrestricted.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

struct CompiledCriteria {
    date_start: Option<NaiveDate>,
    date_end: Option<NaiveDate>,
    state: Option<String>,
    district: Option<String>,
    pincode: Option<String>,
    pincode_match: PincodeMatch,
}

impl CompiledCriteria {
    fn matches(&self, record: &Record) -> bool {
        if self.date_start.is_some_and(|start| record.date < start) {
            return false;
        }
        if self.date_end.is_some_and(|end| record.date > end) {
            return false;
        }
        if let Some(state) = &self.state {
            if record.state.trim().to_lowercase() != *state {
                return false;
            }
        }
        if let Some(district) = &self.district {
            if record.district.trim().to_lowercase() != *district {
                return false;
            }
        }
        if let Some(pin) = &self.pincode {
            let matched = match self.pincode_match {
                PincodeMatch::Exact => record.pincode == *pin,
                PincodeMatch::Prefix => record.pincode.starts_with(pin.as_str()),
            };
            if !matched {
                return false;
            }
        }
        true
    }
}

/// Rows of `table` satisfying all criteria (logical AND).
///
/// The input table is never modified. Impossible criteria (reversed date
/// range, non-numeric pincode) give an empty table, not an error.
pub fn apply_filter(table: &RecordTable, criteria: &FilterCriteria) -> PolarsResult<RecordTable> {
    if criteria.is_unsatisfiable() {
        return Ok(RecordTable::empty(table.kind()));
    }
    let compiled = criteria.compile();
    let mask: Vec<bool> = table
        .records()?
        .iter()
        .map(|record| compiled.matches(record))
        .collect();
    table.select_rows(&mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::tests::{date, record, sample_enrolment};
    use crate::data::DatasetKind;

    fn states(table: &RecordTable) -> Vec<String> {
        table.records().unwrap().into_iter().map(|r| r.state).collect()
    }

    #[test]
    fn single_day_range_is_inclusive() {
        let table = sample_enrolment();
        let criteria = FilterCriteria::new().between(date(1, 1, 2023), date(1, 1, 2023));
        let filtered = apply_filter(&table, &criteria).unwrap();
        assert_eq!(filtered.height(), 1);
        assert_eq!(states(&filtered), vec!["KA"]);
    }

    #[test]
    fn reversed_range_is_empty() {
        let table = sample_enrolment();
        let criteria = FilterCriteria::new().between(date(2, 1, 2023), date(1, 1, 2023));
        let filtered = apply_filter(&table, &criteria).unwrap();
        assert!(filtered.is_empty());
        assert_eq!(filtered.kind(), DatasetKind::Enrolment);
    }

    #[test]
    fn text_matching_ignores_case_and_whitespace() {
        let table = sample_enrolment();
        let filtered = apply_filter(&table, &FilterCriteria::new().state("  ka ")).unwrap();
        assert_eq!(filtered.height(), 2);
        let filtered =
            apply_filter(&table, &FilterCriteria::new().district("MYSORE")).unwrap();
        assert_eq!(filtered.height(), 1);
    }

    #[test]
    fn non_numeric_pincode_matches_nothing() {
        let table = sample_enrolment();
        let filtered = apply_filter(&table, &FilterCriteria::new().pincode("abc")).unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn pincode_exact_and_prefix() {
        let table = sample_enrolment();
        let exact = apply_filter(&table, &FilterCriteria::new().pincode("56000")).unwrap();
        assert!(exact.is_empty());
        let exact = apply_filter(&table, &FilterCriteria::new().pincode("560001")).unwrap();
        assert_eq!(exact.height(), 1);
        let prefix = apply_filter(&table, &FilterCriteria::new().pincode_prefix("5")).unwrap();
        assert_eq!(prefix.height(), 2);
    }

    #[test]
    fn short_pincode_matches_its_padded_key() {
        let table = RecordTable::from_records(
            DatasetKind::Biometric,
            &[
                record(date(1, 1, 2023), "PB", "Ludhiana", "001234", &[1.0, 1.0]),
                record(date(1, 1, 2023), "PB", "Ludhiana", "141001", &[1.0, 1.0]),
            ],
        )
        .unwrap();
        let exact = apply_filter(&table, &FilterCriteria::new().pincode(" 1234 ")).unwrap();
        assert_eq!(exact.records().unwrap()[0].pincode, "001234");
        assert_eq!(exact.height(), 1);

        let prefix = apply_filter(&table, &FilterCriteria::new().pincode_prefix("1")).unwrap();
        assert_eq!(prefix.records().unwrap()[0].pincode, "141001");
        assert_eq!(prefix.height(), 1);
    }

    #[test]
    fn blank_criteria_do_not_restrict() {
        let table = sample_enrolment();
        let criteria = FilterCriteria {
            state: Some("   ".into()),
            pincode: Some(String::new()),
            ..FilterCriteria::default()
        };
        assert_eq!(apply_filter(&table, &criteria).unwrap(), table);
    }

    #[test]
    fn filtering_is_idempotent_and_a_subset() {
        let table = sample_enrolment();
        let criteria = FilterCriteria::new()
            .from_date(date(2, 1, 2023))
            .pincode_prefix("4");
        let once = apply_filter(&table, &criteria).unwrap();
        let twice = apply_filter(&once, &criteria).unwrap();
        assert_eq!(once, twice);

        let all = table.records().unwrap();
        for row in once.records().unwrap() {
            assert!(all.contains(&row));
        }
    }

    #[test]
    fn record_predicate_matches_table_filter() {
        let row = record(date(3, 3, 2023), "Tamil Nadu", "Chennai", "600001", &[1.0]);
        assert!(FilterCriteria::new().state("tamil nadu").matches(&row));
        assert!(!FilterCriteria::new().to_date(date(2, 3, 2023)).matches(&row));
        assert!(!FilterCriteria::new().pincode("6000x1").matches(&row));
    }
}
