//! CSV export of filtered tables in canonical column order.

use super::kind::{DATE, DATE_FORMAT};
use super::table::RecordTable;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Canonical frame with the date rendered back to day-month-year text, so an
/// export can be loaded again through the normal loader.
pub fn export_frame(table: &RecordTable) -> PolarsResult<DataFrame> {
    let dates: Vec<String> = table
        .records()?
        .iter()
        .map(|r| r.date.format(DATE_FORMAT).to_string())
        .collect();

    let mut columns = vec![Column::new(DATE.into(), dates)];
    for name in table.kind().canonical_columns().into_iter().skip(1) {
        columns.push(table.dataframe().column(name)?.clone());
    }
    DataFrame::new(columns)
}

/// Serialize any frame as CSV with a header row.
pub fn frame_to_csv_bytes(df: &mut DataFrame) -> PolarsResult<Vec<u8>> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf).include_header(true).finish(df)?;
    Ok(buf)
}

/// CSV bytes of a (filtered) Record Table, ready for download.
pub fn to_csv_bytes(table: &RecordTable) -> PolarsResult<Vec<u8>> {
    let mut df = export_frame(table)?;
    frame_to_csv_bytes(&mut df)
}

pub fn write_csv(table: &RecordTable, path: &Path) -> PolarsResult<()> {
    let mut df = export_frame(table)?;
    let file = File::create(path)?;
    CsvWriter::new(file).include_header(true).finish(&mut df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{apply_filter, FilterCriteria};
    use crate::data::loader::load_bytes;
    use crate::data::table::tests::{date, sample_enrolment};

    #[test]
    fn header_follows_canonical_schema() {
        let bytes = to_csv_bytes(&sample_enrolment()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("date,state,district,pincode,age_0_5,age_5_17,age_18_greater")
        );
        assert!(lines.next().unwrap().starts_with("01-01-2023,KA,Bangalore,560001,"));
    }

    #[test]
    fn export_reloads_to_the_same_rows() {
        let table = sample_enrolment();
        let filtered =
            apply_filter(&table, &FilterCriteria::new().from_date(date(2, 1, 2023))).unwrap();
        let bytes = to_csv_bytes(&filtered).unwrap();

        let (reloaded, report) = load_bytes(table.kind(), "export.csv", &bytes).unwrap();
        assert_eq!(report.dropped_dates, 0);
        assert_eq!(reloaded.height(), filtered.height());
        assert_eq!(reloaded.records().unwrap(), filtered.records().unwrap());
    }

    #[test]
    fn empty_table_exports_header_only() {
        let empty = RecordTable::empty(crate::data::DatasetKind::Biometric);
        let text = String::from_utf8(to_csv_bytes(&empty).unwrap()).unwrap();
        assert_eq!(
            text.trim_end(),
            "date,state,district,pincode,bio_age_5_17,bio_age_17_"
        );
    }
}
