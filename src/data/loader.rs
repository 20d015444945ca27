//! CSV Data Loader Module
//! Reads one or more CSV sources per dataset kind, normalizes them and
//! caches the concatenated Record Table per (kind, source set).

use super::kind::DatasetKind;
use super::schema::{normalize, NormalizeReport, SchemaError};
use super::table::RecordTable;
use polars::prelude::*;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Source not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read {source_name}: {error}")]
    Read {
        source_name: String,
        #[source]
        error: PolarsError,
    },
    #[error("{source_name}: {error}")]
    Schema {
        source_name: String,
        #[source]
        error: SchemaError,
    },
}

/// Where the rows of a dataset kind come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// A CSV file on disk.
    Path(PathBuf),
    /// An in-memory CSV payload, e.g. an uploaded file.
    Upload { name: String, bytes: Arc<[u8]> },
}

impl Source {
    pub fn upload(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Source::Upload {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Display name used in warnings and logs.
    pub fn name(&self) -> String {
        match self {
            Source::Path(path) => path.display().to_string(),
            Source::Upload { name, .. } => format!("upload:{name}"),
        }
    }

    /// Identity used in cache keys. Uploads are identified by content.
    pub fn id(&self) -> SourceId {
        match self {
            Source::Path(path) => SourceId::Path(path.clone()),
            Source::Upload { name, bytes } => {
                let mut hasher = DefaultHasher::new();
                bytes.hash(&mut hasher);
                SourceId::Upload {
                    name: name.clone(),
                    len: bytes.len(),
                    digest: hasher.finish(),
                }
            }
        }
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    Path(PathBuf),
    Upload { name: String, len: usize, digest: u64 },
}

/// Cache key: a dataset kind plus the ordered identities of its sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: DatasetKind,
    pub sources: Vec<SourceId>,
}

impl CacheKey {
    pub fn new(kind: DatasetKind, sources: &[Source]) -> Self {
        Self {
            kind,
            sources: sources.iter().map(Source::id).collect(),
        }
    }
}

/// Non-fatal notices produced while loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadWarning {
    /// A source could not be read or normalized and was left out.
    SourceSkipped { source: String, reason: String },
    /// Rows without a parseable day-month-year date were dropped.
    DatesDropped { source: String, rows: usize },
    /// The kind ended up with zero rows (every source failed or was empty).
    EmptyResult { kind: DatasetKind },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::SourceSkipped { source, reason } => {
                write!(f, "skipped {source}: {reason}")
            }
            LoadWarning::DatesDropped { source, rows } => {
                write!(f, "{source}: dropped {rows} row(s) with an unparseable date")
            }
            LoadWarning::EmptyResult { kind } => write!(f, "no {kind} data loaded"),
        }
    }
}

/// Result of loading one dataset kind. Immutable once cached.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub table: Arc<RecordTable>,
    pub warnings: Vec<LoadWarning>,
    /// Number of sources that contributed rows (or an empty but valid table).
    pub loaded_sources: usize,
}

impl LoadOutcome {
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Read a CSV file with every column as text; the normalizer does the typing.
fn read_csv_path(path: &Path) -> Result<DataFrame, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .and_then(|lazy| lazy.collect())
        .map_err(|error| LoadError::Read {
            source_name: path.display().to_string(),
            error,
        })
}

fn read_csv_bytes(name: &str, bytes: &[u8]) -> Result<DataFrame, LoadError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()
        .map_err(|error| LoadError::Read {
            source_name: format!("upload:{name}"),
            error,
        })
}

/// Read and normalize a single source.
pub fn load_source(
    kind: DatasetKind,
    source: &Source,
) -> Result<(RecordTable, NormalizeReport), LoadError> {
    let raw = match source {
        Source::Path(path) => read_csv_path(path)?,
        Source::Upload { name, bytes } => read_csv_bytes(name, bytes)?,
    };
    debug!(source = %source.name(), rows = raw.height(), "read csv source");
    normalize(&raw, kind).map_err(|error| LoadError::Schema {
        source_name: source.name(),
        error,
    })
}

/// Parse an in-memory CSV payload into a Record Table.
pub fn load_bytes(
    kind: DatasetKind,
    name: &str,
    bytes: &[u8],
) -> Result<(RecordTable, NormalizeReport), LoadError> {
    load_source(kind, &Source::upload(name, bytes))
}

/// Loads dataset kinds from CSV sources with a per-session cache.
///
/// A cache entry is written once and never modified; a different source set
/// produces a different key.
#[derive(Debug, Default)]
pub struct DataLoader {
    cache: HashMap<CacheKey, Arc<LoadOutcome>>,
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and concatenate `sources` for `kind`.
    ///
    /// Sources that fail are skipped with a warning. When every source fails
    /// the outcome holds an empty table and an `EmptyResult` warning.
    pub fn load(&mut self, kind: DatasetKind, sources: &[Source]) -> Arc<LoadOutcome> {
        let key = CacheKey::new(kind, sources);
        if let Some(hit) = self.cache.get(&key) {
            debug!(%kind, sources = sources.len(), "load cache hit");
            return Arc::clone(hit);
        }

        let outcome = Arc::new(Self::load_uncached(kind, sources));
        self.cache.insert(key, Arc::clone(&outcome));
        outcome
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn load_uncached(kind: DatasetKind, sources: &[Source]) -> LoadOutcome {
        let mut table: Option<RecordTable> = None;
        let mut warnings = Vec::new();
        let mut loaded_sources = 0;

        for source in sources {
            match load_source(kind, source) {
                Ok((part, report)) => {
                    loaded_sources += 1;
                    if report.dropped_dates > 0 {
                        warn!(
                            source = %source.name(),
                            rows = report.dropped_dates,
                            "dropped rows with unparseable dates"
                        );
                        warnings.push(LoadWarning::DatesDropped {
                            source: source.name(),
                            rows: report.dropped_dates,
                        });
                    }
                    let merged = match table.as_mut() {
                        Some(acc) => acc.append(&part),
                        None => {
                            table = Some(part);
                            Ok(())
                        }
                    };
                    if let Err(error) = merged {
                        loaded_sources -= 1;
                        warn!(source = %source.name(), %error, "could not concatenate source");
                        warnings.push(LoadWarning::SourceSkipped {
                            source: source.name(),
                            reason: error.to_string(),
                        });
                    }
                }
                Err(error) => {
                    warn!(source = %source.name(), %error, "skipping source");
                    warnings.push(LoadWarning::SourceSkipped {
                        source: source.name(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        let table = table.unwrap_or_else(|| RecordTable::empty(kind));
        if table.is_empty() {
            warnings.push(LoadWarning::EmptyResult { kind });
        }
        info!(
            %kind,
            rows = table.height(),
            loaded = loaded_sources,
            skipped = sources.len() - loaded_sources,
            "dataset loaded"
        );

        LoadOutcome {
            table: Arc::new(table),
            warnings,
            loaded_sources,
        }
    }
}
