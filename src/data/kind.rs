//! Dataset kinds and their canonical schemas.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DATE: &str = "date";
pub const STATE: &str = "state";
pub const DISTRICT: &str = "district";
pub const PINCODE: &str = "pincode";

/// Columns shared by every dataset kind, in canonical order.
pub const KEY_COLUMNS: [&str; 4] = [DATE, STATE, DISTRICT, PINCODE];

/// Fixed input date format (day-month-year).
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// One of the three record families the dashboard understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Enrolment,
    Demographic,
    Biometric,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::Enrolment,
        DatasetKind::Demographic,
        DatasetKind::Biometric,
    ];

    /// Age-bucket columns carried by this kind, in canonical order.
    pub fn bucket_columns(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::Enrolment => &["age_0_5", "age_5_17", "age_18_greater"],
            DatasetKind::Demographic => &["demo_age_5_17", "demo_age_17_"],
            DatasetKind::Biometric => &["bio_age_5_17", "bio_age_17_"],
        }
    }

    /// Name of the derived per-row total column.
    pub fn total_column(&self) -> &'static str {
        match self {
            DatasetKind::Enrolment => "total_enrolments",
            DatasetKind::Demographic => "total_demographic",
            DatasetKind::Biometric => "total_biometric",
        }
    }

    /// Full canonical column order: key columns followed by the buckets.
    pub fn canonical_columns(&self) -> Vec<&'static str> {
        KEY_COLUMNS
            .iter()
            .chain(self.bucket_columns().iter())
            .copied()
            .collect()
    }

    /// Raw header aliases accepted for a canonical field, in priority order.
    ///
    /// Aliases are compared against headers after trimming, lowercasing and
    /// turning spaces and hyphens into underscores.
    pub fn aliases(&self, field: &str) -> &'static [&'static str] {
        match field {
            DATE => &["date", "record_date", "enrolment_date", "update_date"],
            STATE => &["state", "state_name", "st_name"],
            DISTRICT => &["district", "district_name", "dist_name"],
            PINCODE => &["pincode", "pin_code", "pin", "postal_code"],
            "age_0_5" => &["age_0_5", "age_0_to_5", "age_0_4"],
            "age_5_17" => &["age_5_17", "age_5_to_17"],
            "age_18_greater" => &["age_18_greater", "age_18_plus", "age_18_above"],
            "demo_age_5_17" => &["demo_age_5_17", "demo_age_5_to_17"],
            "demo_age_17_" => &["demo_age_17_", "demo_age_17_plus", "demo_age_17_greater"],
            "bio_age_5_17" => &["bio_age_5_17", "bio_age_5_to_17"],
            "bio_age_17_" => &["bio_age_17_", "bio_age_17_plus", "bio_age_17_greater"],
            _ => &[],
        }
    }

    /// Whether a missing canonical field aborts normalization.
    pub fn is_required(&self, field: &str) -> bool {
        field == DATE || field == STATE || self.bucket_columns().contains(&field)
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetKind::Enrolment => "Enrolment",
            DatasetKind::Demographic => "Demographic",
            DatasetKind::Biometric => "Biometric",
        };
        f.write_str(name)
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enrolment" | "enrollment" => Ok(DatasetKind::Enrolment),
            "demographic" | "demo" => Ok(DatasetKind::Demographic),
            "biometric" | "bio" => Ok(DatasetKind::Biometric),
            other => Err(format!(
                "unknown dataset kind '{other}', expected enrolment, demographic or biometric"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_columns_start_with_keys() {
        assert_eq!(
            DatasetKind::Enrolment.canonical_columns(),
            vec!["date", "state", "district", "pincode", "age_0_5", "age_5_17", "age_18_greater"]
        );
        assert_eq!(
            DatasetKind::Biometric.canonical_columns(),
            vec!["date", "state", "district", "pincode", "bio_age_5_17", "bio_age_17_"]
        );
    }

    #[test]
    fn every_canonical_column_accepts_itself() {
        for kind in DatasetKind::ALL {
            for column in kind.canonical_columns() {
                assert_eq!(kind.aliases(column).first(), Some(&column));
            }
        }
    }

    #[test]
    fn district_and_pincode_are_optional() {
        let kind = DatasetKind::Demographic;
        assert!(kind.is_required(DATE));
        assert!(kind.is_required("demo_age_17_"));
        assert!(!kind.is_required(DISTRICT));
        assert!(!kind.is_required(PINCODE));
        assert!(!kind.is_required("age_0_5"));
    }

    #[test]
    fn parses_kind_names() {
        assert_eq!("Enrollment".parse::<DatasetKind>(), Ok(DatasetKind::Enrolment));
        assert_eq!(" bio ".parse::<DatasetKind>(), Ok(DatasetKind::Biometric));
        assert!("combined".parse::<DatasetKind>().is_err());
    }
}
