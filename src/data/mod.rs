//! Data module - CSV loading, schema normalization, filtering and export

mod export;
mod filter;
mod kind;
mod loader;
mod schema;
pub(crate) mod table;

pub use export::{export_frame, frame_to_csv_bytes, to_csv_bytes, write_csv};
pub use filter::{apply_filter, FilterCriteria, PincodeMatch};
pub use kind::{DatasetKind, DATE, DATE_FORMAT, DISTRICT, KEY_COLUMNS, PINCODE, STATE};
pub use loader::{
    load_bytes, load_source, CacheKey, DataLoader, LoadError, LoadOutcome, LoadWarning, Source,
    SourceId,
};
pub use schema::{
    coerce_count, normalize, normalize_header, normalize_pincode, parse_date, NormalizeReport,
    SchemaError,
};
pub use table::{date_to_days, days_to_date, Record, RecordTable};
