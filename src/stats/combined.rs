//! Combined view: per-key totals of all three dataset kinds side by side.

use crate::data::{DatasetKind, RecordTable, DATE, DATE_FORMAT, DISTRICT, PINCODE, STATE};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedRow {
    pub date: NaiveDate,
    pub state: String,
    pub district: String,
    pub pincode: String,
    pub enrolment: f64,
    pub demographic: f64,
    pub biometric: f64,
}

impl CombinedRow {
    pub fn get(&self, kind: DatasetKind) -> f64 {
        match kind {
            DatasetKind::Enrolment => self.enrolment,
            DatasetKind::Demographic => self.demographic,
            DatasetKind::Biometric => self.biometric,
        }
    }

    fn slot(&mut self, kind: DatasetKind) -> &mut f64 {
        match kind {
            DatasetKind::Enrolment => &mut self.enrolment,
            DatasetKind::Demographic => &mut self.demographic,
            DatasetKind::Biometric => &mut self.biometric,
        }
    }
}

/// Outer join of bucket totals keyed by (date, state, district, pincode).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombinedView {
    pub rows: Vec<CombinedRow>,
}

type Key = (NaiveDate, String, String, String);

impl CombinedView {
    /// Join any number of tables; a key missing from a kind totals zero there.
    pub fn build(tables: &[&RecordTable]) -> PolarsResult<Self> {
        let mut joined: BTreeMap<Key, CombinedRow> = BTreeMap::new();
        for table in tables {
            let kind = table.kind();
            for record in table.records()? {
                let total = record.bucket_sum();
                let key = (
                    record.date,
                    record.state.clone(),
                    record.district.clone(),
                    record.pincode.clone(),
                );
                let row = joined.entry(key).or_insert_with(|| CombinedRow {
                    date: record.date,
                    state: record.state,
                    district: record.district,
                    pincode: record.pincode,
                    enrolment: 0.0,
                    demographic: 0.0,
                    biometric: 0.0,
                });
                *row.slot(kind) += total;
            }
        }
        Ok(Self {
            rows: joined.into_values().collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self, kind: DatasetKind) -> f64 {
        self.rows.iter().map(|r| r.get(kind)).sum()
    }

    fn text_column(&self, name: &str, value: impl Fn(&CombinedRow) -> String) -> Column {
        let values: Vec<String> = self.rows.iter().map(value).collect();
        Column::new(name.into(), values)
    }

    /// Frame with day-month-year dates, a `month` column and one total
    /// column per kind.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns = vec![
            self.text_column(DATE, |r| r.date.format(DATE_FORMAT).to_string()),
            self.text_column(STATE, |r| r.state.clone()),
            self.text_column(DISTRICT, |r| r.district.clone()),
            self.text_column(PINCODE, |r| r.pincode.clone()),
            self.text_column("month", |r| r.date.format("%Y-%m").to_string()),
        ];
        for kind in DatasetKind::ALL {
            let values: Vec<f64> = self.rows.iter().map(|r| r.get(kind)).collect();
            columns.push(Column::new(kind.total_column().into(), values));
        }
        DataFrame::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::tests::{date, record, sample_enrolment};

    #[test]
    fn joins_kinds_on_the_full_key() {
        let enrolment = sample_enrolment();
        let biometric = RecordTable::from_records(
            DatasetKind::Biometric,
            &[
                record(date(1, 1, 2023), "KA", "Bangalore", "560001", &[2.0, 3.0]),
                record(date(5, 1, 2023), "TN", "Chennai", "600001", &[1.0, 1.0]),
            ],
        )
        .unwrap();

        let view = CombinedView::build(&[&enrolment, &biometric]).unwrap();
        assert_eq!(view.rows.len(), 4);

        let bangalore = &view.rows[0];
        assert_eq!(bangalore.state, "KA");
        assert_eq!(bangalore.enrolment, 35.0);
        assert_eq!(bangalore.biometric, 5.0);
        assert_eq!(bangalore.demographic, 0.0);

        assert_eq!(view.total(DatasetKind::Enrolment), 46.0);
        assert_eq!(view.total(DatasetKind::Biometric), 7.0);
    }

    #[test]
    fn frame_has_one_total_per_kind() {
        let view = CombinedView::build(&[&sample_enrolment()]).unwrap();
        let df = view.to_dataframe().unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "date",
                "state",
                "district",
                "pincode",
                "month",
                "total_enrolments",
                "total_demographic",
                "total_biometric"
            ]
        );
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn empty_inputs_give_empty_view() {
        let view = CombinedView::build(&[]).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.to_dataframe().unwrap().height(), 0);
    }
}
