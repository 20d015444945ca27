//! Schema Normalizer
//! Maps raw CSV headers onto the canonical schema of a dataset kind and
//! coerces every value into its canonical type.

use super::kind::{DatasetKind, DATE, DATE_FORMAT, DISTRICT, PINCODE, STATE};
use super::table::{Record, RecordTable};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

/// Width that all-digit pincodes are left-padded to.
pub const PINCODE_WIDTH: usize = 6;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("{kind} data has no '{field}' column (accepted headers: {accepted})")]
    MissingColumn {
        kind: DatasetKind,
        field: &'static str,
        accepted: String,
    },
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// What happened to the rows of one raw table during normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    /// Rows dropped because the date was missing or not day-month-year.
    pub dropped_dates: usize,
}

/// Header normalization applied before alias lookup.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Parse a day-month-year date; `/` is accepted as a separator as well.
///
/// The year must have exactly four digits (`05-03-23` is rejected).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim().replace('/', "-");
    let year = raw.rsplit('-').next()?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).ok()
}

/// Missing, unparseable, negative or non-finite counts become zero.
pub fn coerce_count(raw: Option<&str>) -> f64 {
    raw.map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// Pincodes stay text. A trailing `.0` from float rendering is removed and
/// short all-digit codes are zero-padded on the left.
pub fn normalize_pincode(raw: &str) -> String {
    let mut code = raw.trim();
    if let Some(stripped) = code.strip_suffix(".0") {
        if !stripped.is_empty() && stripped.bytes().all(|b| b.is_ascii_digit()) {
            code = stripped;
        }
    }
    if !code.is_empty() && code.len() < PINCODE_WIDTH && code.bytes().all(|b| b.is_ascii_digit())
    {
        format!("{code:0>width$}", width = PINCODE_WIDTH)
    } else {
        code.to_string()
    }
}

/// Find the raw header that feeds each canonical field.
///
/// Returns canonical field -> raw header name; optional fields that are
/// absent are simply not in the map.
pub fn resolve_columns(
    raw: &DataFrame,
    kind: DatasetKind,
) -> Result<HashMap<&'static str, String>, SchemaError> {
    let mut by_normalized: HashMap<String, String> = HashMap::new();
    for name in raw.get_column_names() {
        by_normalized
            .entry(normalize_header(name.as_str()))
            .or_insert_with(|| name.to_string());
    }

    let mut resolved = HashMap::new();
    for field in kind.canonical_columns() {
        let aliases = kind.aliases(field);
        let found = aliases
            .iter()
            .find_map(|alias| by_normalized.get(*alias).cloned());
        match found {
            Some(raw_name) => {
                resolved.insert(field, raw_name);
            }
            None if kind.is_required(field) => {
                return Err(SchemaError::MissingColumn {
                    kind,
                    field,
                    accepted: aliases.join(", "),
                });
            }
            None => {}
        }
    }
    Ok(resolved)
}

fn text_values(
    raw: &DataFrame,
    name: Option<&String>,
    height: usize,
) -> PolarsResult<Vec<Option<String>>> {
    let Some(name) = name else {
        return Ok(vec![None; height]);
    };
    let column = raw.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Normalize a raw table (any column types) into a Record Table.
///
/// Rows whose date cannot be parsed are dropped and counted in the report.
pub fn normalize(
    raw: &DataFrame,
    kind: DatasetKind,
) -> Result<(RecordTable, NormalizeReport), SchemaError> {
    let resolved = resolve_columns(raw, kind)?;
    let height = raw.height();

    let dates = text_values(raw, resolved.get(DATE), height)?;
    let states = text_values(raw, resolved.get(STATE), height)?;
    let districts = text_values(raw, resolved.get(DISTRICT), height)?;
    let pincodes = text_values(raw, resolved.get(PINCODE), height)?;
    let buckets = kind
        .bucket_columns()
        .iter()
        .map(|field| text_values(raw, resolved.get(field), height))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut records = Vec::with_capacity(height);
    let mut dropped_dates = 0;
    for i in 0..height {
        let Some(date) = dates[i].as_deref().and_then(parse_date) else {
            dropped_dates += 1;
            continue;
        };
        records.push(Record {
            date,
            state: states[i].as_deref().unwrap_or_default().trim().to_string(),
            district: districts[i].as_deref().unwrap_or_default().trim().to_string(),
            pincode: normalize_pincode(pincodes[i].as_deref().unwrap_or_default()),
            buckets: buckets
                .iter()
                .map(|values| coerce_count(values[i].as_deref()))
                .collect(),
        });
    }

    let report = NormalizeReport {
        rows_read: height,
        rows_kept: records.len(),
        dropped_dates,
    };
    Ok((RecordTable::from_records(kind, &records)?, report))
}
