//! Record Table: a normalized polars DataFrame tagged with its dataset kind.

use super::kind::{DatasetKind, DATE, DISTRICT, PINCODE, STATE};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use std::collections::BTreeSet;

/// Days since 1970-01-01, the physical representation of a polars `Date`.
pub fn date_to_days(date: NaiveDate) -> i32 {
    (date - NaiveDate::default()).num_days() as i32
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::default().checked_add_signed(Duration::days(i64::from(days)))
}

/// One materialized row of a Record Table.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub date: NaiveDate,
    pub state: String,
    pub district: String,
    pub pincode: String,
    /// Age-bucket values, ordered as `DatasetKind::bucket_columns`.
    pub buckets: Vec<f64>,
}

impl Record {
    pub fn bucket_sum(&self) -> f64 {
        self.buckets.iter().sum()
    }
}

/// Normalized records of a single dataset kind.
///
/// Columns always follow `DatasetKind::canonical_columns`: `date` is a polars
/// `Date`, the text keys are `String` and the age buckets are `Float64`.
#[derive(Debug, Clone)]
pub struct RecordTable {
    kind: DatasetKind,
    df: DataFrame,
}

impl RecordTable {
    /// A zero-row table with the canonical schema of `kind`.
    pub fn empty(kind: DatasetKind) -> Self {
        let schema: Schema = kind
            .canonical_columns()
            .into_iter()
            .map(|name| {
                let dtype = match name {
                    DATE => DataType::Date,
                    STATE | DISTRICT | PINCODE => DataType::String,
                    _ => DataType::Float64,
                };
                (PlSmallStr::from_static(name), dtype)
            })
            .collect();
        Self {
            kind,
            df: DataFrame::empty_with_schema(&schema),
        }
    }

    /// Build a table from already-normalized rows.
    pub fn from_records(kind: DatasetKind, records: &[Record]) -> PolarsResult<Self> {
        let days: Vec<i32> = records.iter().map(|r| date_to_days(r.date)).collect();
        let states: Vec<&str> = records.iter().map(|r| r.state.as_str()).collect();
        let districts: Vec<&str> = records.iter().map(|r| r.district.as_str()).collect();
        let pincodes: Vec<&str> = records.iter().map(|r| r.pincode.as_str()).collect();

        let mut columns = vec![
            Column::new(DATE.into(), days).cast(&DataType::Date)?,
            Column::new(STATE.into(), states),
            Column::new(DISTRICT.into(), districts),
            Column::new(PINCODE.into(), pincodes),
        ];
        for (idx, name) in kind.bucket_columns().iter().enumerate() {
            let values: Vec<f64> = records
                .iter()
                .map(|r| r.buckets.get(idx).copied().unwrap_or(0.0))
                .collect();
            columns.push(Column::new((*name).into(), values));
        }

        Ok(Self {
            kind,
            df: DataFrame::new(columns)?,
        })
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Materialize every row, in table order.
    pub fn records(&self) -> PolarsResult<Vec<Record>> {
        let dates = self.df.column(DATE)?.cast(&DataType::Int32)?;
        let dates = dates.i32()?;
        let states = self.df.column(STATE)?.str()?;
        let districts = self.df.column(DISTRICT)?.str()?;
        let pincodes = self.df.column(PINCODE)?.str()?;
        let buckets = self
            .kind
            .bucket_columns()
            .iter()
            .map(|name| self.df.column(name)?.f64())
            .collect::<PolarsResult<Vec<_>>>()?;

        let mut records = Vec::with_capacity(self.df.height());
        for i in 0..self.df.height() {
            let Some(date) = dates.get(i).and_then(days_to_date) else {
                continue;
            };
            records.push(Record {
                date,
                state: states.get(i).unwrap_or_default().to_string(),
                district: districts.get(i).unwrap_or_default().to_string(),
                pincode: pincodes.get(i).unwrap_or_default().to_string(),
                buckets: buckets.iter().map(|ca| ca.get(i).unwrap_or(0.0)).collect(),
            });
        }
        Ok(records)
    }

    /// Append the rows of another table of the same kind.
    pub fn append(&mut self, other: &RecordTable) -> PolarsResult<()> {
        if other.kind != self.kind {
            return Err(PolarsError::SchemaMismatch(
                format!("cannot append {} rows to a {} table", other.kind, self.kind).into(),
            ));
        }
        self.df.vstack_mut(&other.df)?;
        Ok(())
    }

    /// Keep the rows whose mask entry is `true`; the source table is untouched.
    pub fn select_rows(&self, mask: &[bool]) -> PolarsResult<RecordTable> {
        let mask = BooleanChunked::from_slice("mask".into(), mask);
        Ok(Self {
            kind: self.kind,
            df: self.df.filter(&mask)?,
        })
    }

    /// Sorted distinct non-empty values of a text column.
    pub fn distinct_values(&self, column: &str) -> PolarsResult<Vec<String>> {
        let values = self.df.column(column)?.str()?;
        let unique: BTreeSet<String> = values
            .into_iter()
            .flatten()
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        Ok(unique.into_iter().collect())
    }

    /// Earliest and latest date present, `None` for an empty table.
    pub fn date_bounds(&self) -> PolarsResult<Option<(NaiveDate, NaiveDate)>> {
        let dates = self.df.column(DATE)?.cast(&DataType::Int32)?;
        let dates = dates.i32()?;
        let min = dates.min().and_then(days_to_date);
        let max = dates.max().and_then(days_to_date);
        Ok(min.zip(max))
    }
}

impl PartialEq for RecordTable {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.df.equals_missing(&other.df)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn date(d: u32, m: u32, y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn record(
        day: NaiveDate,
        state: &str,
        district: &str,
        pincode: &str,
        buckets: &[f64],
    ) -> Record {
        Record {
            date: day,
            state: state.to_string(),
            district: district.to_string(),
            pincode: pincode.to_string(),
            buckets: buckets.to_vec(),
        }
    }

    pub(crate) fn sample_enrolment() -> RecordTable {
        RecordTable::from_records(
            DatasetKind::Enrolment,
            &[
                record(date(1, 1, 2023), "KA", "Bangalore", "560001", &[5.0, 10.0, 20.0]),
                record(date(2, 1, 2023), "MH", "Pune", "411001", &[1.0, 2.0, 3.0]),
                record(date(15, 2, 2023), "KA", "Mysore", "570001", &[0.0, 4.0, 1.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn day_conversion_matches_epoch() {
        assert_eq!(date_to_days(date(1, 1, 1970)), 0);
        assert_eq!(days_to_date(19358), Some(date(1, 1, 2023)));
        assert_eq!(days_to_date(date_to_days(date(29, 2, 2024))), Some(date(29, 2, 2024)));
    }

    #[test]
    fn empty_table_has_canonical_schema() {
        let table = RecordTable::empty(DatasetKind::Demographic);
        assert!(table.is_empty());
        let names: Vec<String> = table
            .dataframe()
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, DatasetKind::Demographic.canonical_columns());
        assert_eq!(table.date_bounds().unwrap(), None);
        assert_eq!(table.records().unwrap(), Vec::new());
    }

    #[test]
    fn empty_table_matches_built_dtypes() {
        for kind in DatasetKind::ALL {
            let empty = RecordTable::empty(kind);
            let built = RecordTable::from_records(kind, &[]).unwrap();
            assert_eq!(empty.dataframe().schema(), built.dataframe().schema());
            assert_eq!(empty, built);
        }
    }

    #[test]
    fn records_round_trip_through_frame() {
        let table = sample_enrolment();
        let records = table.records().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].state, "KA");
        assert_eq!(records[0].buckets, vec![5.0, 10.0, 20.0]);
        assert_eq!(records[2].date, date(15, 2, 2023));
    }

    #[test]
    fn distinct_values_and_bounds() {
        let table = sample_enrolment();
        assert_eq!(table.distinct_values(STATE).unwrap(), vec!["KA", "MH"]);
        assert_eq!(
            table.date_bounds().unwrap(),
            Some((date(1, 1, 2023), date(15, 2, 2023)))
        );
    }

    #[test]
    fn append_rejects_other_kinds() {
        let mut table = sample_enrolment();
        let other = RecordTable::empty(DatasetKind::Biometric);
        assert!(table.append(&other).is_err());
        let same = sample_enrolment();
        table.append(&same).unwrap();
        assert_eq!(table.height(), 6);
    }
}
