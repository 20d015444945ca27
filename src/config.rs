//! Configuration file handling.
//!
//! Loads the optional `uidai_dashboard.toml` and resolves the default CSV
//! sources of every dataset kind against the data directory.

use crate::data::{DatasetKind, Source};
use crate::stats::{DEFAULT_PIVOT_STATES, DEFAULT_TOP_N};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "UIDAI_DATA_DIR";

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "uidai_dashboard.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {error}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("Failed to parse {}: {error}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        error: toml::de::Error,
    },
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Directory searched for the default files before the working directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Entries in top-N rankings.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// State columns in the month x state pivot.
    #[serde(default = "default_pivot_states")]
    pub pivot_states: usize,

    /// Default file names per dataset kind.
    #[serde(default)]
    pub sources: SourceFiles,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            top_n: default_top_n(),
            pivot_states: default_pivot_states(),
            sources: SourceFiles::default(),
        }
    }
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_pivot_states() -> usize {
    DEFAULT_PIVOT_STATES
}

/// Default CSV file names of each dataset kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFiles {
    #[serde(default = "default_enrolment_files")]
    pub enrolment: Vec<String>,
    #[serde(default = "default_demographic_files")]
    pub demographic: Vec<String>,
    #[serde(default = "default_biometric_files")]
    pub biometric: Vec<String>,
}

impl Default for SourceFiles {
    fn default() -> Self {
        Self {
            enrolment: default_enrolment_files(),
            demographic: default_demographic_files(),
            biometric: default_biometric_files(),
        }
    }
}

fn default_enrolment_files() -> Vec<String> {
    vec![
        "enrollment_all (1).csv".to_string(),
        "enrollment_all (1)_2.csv".to_string(),
        "enrollment_all (1)_3.csv".to_string(),
    ]
}

fn default_demographic_files() -> Vec<String> {
    vec![
        "demo_all (1).csv".to_string(),
        "demo_all (1)_2.csv".to_string(),
    ]
}

fn default_biometric_files() -> Vec<String> {
    vec![
        "mightymerge.io__xzzeu4zp.csv".to_string(),
        "mightymerge.io__xzzeu4zp (1)_2.csv".to_string(),
    ]
}

impl SourceFiles {
    pub fn for_kind(&self, kind: DatasetKind) -> &[String] {
        match kind {
            DatasetKind::Enrolment => &self.enrolment,
            DatasetKind::Demographic => &self.demographic,
            DatasetKind::Biometric => &self.biometric,
        }
    }
}

impl DashboardConfig {
    /// Parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        toml::from_str(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Load `path` if given, else `uidai_dashboard.toml` when present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).is_file() => Self::load(Path::new(CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }

    /// Apply a data directory override (CLI flag or environment).
    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = data_dir.filter(|d| !d.as_os_str().is_empty()) {
            self.data_dir = Some(dir);
        }
        self
    }

    /// Resolve one default file name: `data_dir/<name>` when it exists,
    /// otherwise the name relative to the working directory.
    pub fn resolve_file(&self, name: &str) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            let candidate = dir.join(name);
            if candidate.exists() {
                return candidate;
            }
        }
        PathBuf::from(name)
    }

    /// Default file sources of a dataset kind, in configured order.
    pub fn default_sources(&self, kind: DatasetKind) -> Vec<Source> {
        self.sources
            .for_kind(kind)
            .iter()
            .map(|name| Source::Path(self.resolve_file(name)))
            .collect()
    }

    /// Commented TOML with every default spelled out.
    pub fn default_toml() -> String {
        let body = toml::to_string_pretty(&Self::default()).unwrap_or_default();
        format!(
            "# uidai_dashboard configuration\n# {DATA_DIR_ENV} overrides data_dir when set.\n\n{body}"
        )
    }
}
