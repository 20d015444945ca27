//! UIDAI dashboard - enrolment, demographic and biometric CSV analytics
//!
//! Loads the three dataset kinds from CSV, normalizes their schemas, filters
//! them by date range and location and derives KPIs, rankings, time series,
//! pivots and charts.

pub mod charts;
pub mod config;
pub mod data;
pub mod session;
pub mod stats;

pub use config::{ConfigError, DashboardConfig};
pub use session::{CombinedReport, Dashboard, FilterOptions, SessionError, SummaryReport, View};
