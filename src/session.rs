//! Dashboard session: configuration, load cache and per-kind upload overrides.

use crate::config::DashboardConfig;
use crate::data::{
    apply_filter, load_bytes, DataLoader, DatasetKind, FilterCriteria, LoadError, LoadOutcome,
    LoadWarning, NormalizeReport, RecordTable, Source, DISTRICT, STATE,
};
use crate::stats::{
    AggregateError, AggregateOptions, AggregateResult, Aggregator, CombinedView, GroupLevel,
    GroupStats, StatsCalculator, Summary,
};
use chrono::NaiveDate;
use polars::prelude::PolarsError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// A filtered table together with the notices of the load that produced it.
#[derive(Debug, Clone)]
pub struct View {
    pub table: RecordTable,
    pub warnings: Vec<LoadWarning>,
    /// True when the unfiltered kind has no rows at all.
    pub no_data: bool,
}

impl View {
    pub fn kind(&self) -> DatasetKind {
        self.table.kind()
    }
}

/// Values offered by a filter control surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub states: Vec<String>,
    pub districts: Vec<String>,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub warnings: Vec<LoadWarning>,
}

/// Combined view of all kinds plus the load notices of each of them.
#[derive(Debug, Clone)]
pub struct CombinedReport {
    pub view: CombinedView,
    pub warnings: Vec<LoadWarning>,
    /// True when no kind has any rows before filtering.
    pub no_data: bool,
}

/// Headline KPIs plus per-state descriptive statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub summary: Summary,
    pub per_state: Vec<GroupStats>,
    pub aggregate: AggregateResult,
}

pub struct Dashboard {
    config: DashboardConfig,
    loader: DataLoader,
    uploads: HashMap<DatasetKind, Source>,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            loader: DataLoader::new(),
            uploads: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Aggregation defaults taken from the configuration.
    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            top_n: self.config.top_n,
            pivot_states: self.config.pivot_states,
            ..AggregateOptions::default()
        }
    }

    /// Sources in effect for `kind`: the upload when present, else the defaults.
    pub fn sources(&self, kind: DatasetKind) -> Vec<Source> {
        match self.uploads.get(&kind) {
            Some(upload) => vec![upload.clone()],
            None => self.config.default_sources(kind),
        }
    }

    pub fn load(&mut self, kind: DatasetKind) -> Arc<LoadOutcome> {
        let sources = self.sources(kind);
        self.loader.load(kind, &sources)
    }

    /// Replace the default sources of `kind` with an uploaded CSV.
    ///
    /// The payload is parsed up front; a payload that fails to parse leaves
    /// the previous sources in effect.
    pub fn upload(
        &mut self,
        kind: DatasetKind,
        name: &str,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<NormalizeReport, LoadError> {
        let bytes: Arc<[u8]> = bytes.into();
        let (_, report) = load_bytes(kind, name, &bytes)?;
        info!(%kind, name, rows = report.rows_kept, "upload replaces default sources");
        self.uploads.insert(kind, Source::upload(name, bytes));
        Ok(report)
    }

    /// Return `kind` to its default sources. Returns whether an upload was set.
    pub fn clear_upload(&mut self, kind: DatasetKind) -> bool {
        self.uploads.remove(&kind).is_some()
    }

    pub fn has_upload(&self, kind: DatasetKind) -> bool {
        self.uploads.contains_key(&kind)
    }

    /// Load `kind` and narrow it to `criteria`.
    pub fn view(
        &mut self,
        kind: DatasetKind,
        criteria: &FilterCriteria,
    ) -> Result<View, SessionError> {
        let outcome = self.load(kind);
        let table = apply_filter(&outcome.table, criteria)?;
        Ok(View {
            table,
            warnings: outcome.warnings.clone(),
            no_data: outcome.is_empty(),
        })
    }

    /// Sorted states of `kind` and the districts of `state` (all districts
    /// when no state is given), plus the observed date range.
    pub fn filter_options(
        &mut self,
        kind: DatasetKind,
        state: Option<&str>,
    ) -> Result<FilterOptions, SessionError> {
        let outcome = self.load(kind);
        let table = outcome.table.as_ref();
        let bounds = table.date_bounds()?;

        let districts = match state {
            Some(state) => apply_filter(table, &FilterCriteria::new().state(state))?
                .distinct_values(DISTRICT)?,
            None => table.distinct_values(DISTRICT)?,
        };

        Ok(FilterOptions {
            states: table.distinct_values(STATE)?,
            districts: districts.into_iter().filter(|d| !d.is_empty()).collect(),
            min_date: bounds.map(|(min, _)| min),
            max_date: bounds.map(|(_, max)| max),
            warnings: outcome.warnings.clone(),
        })
    }

    /// KPIs, per-state statistics and the full aggregation of one view.
    pub fn summary(
        &mut self,
        kind: DatasetKind,
        criteria: &FilterCriteria,
        options: &AggregateOptions,
    ) -> Result<SummaryReport, SessionError> {
        let view = self.view(kind, criteria)?;
        let agg = Aggregator::new(&view.table, &options.measure)?;
        Ok(SummaryReport {
            summary: StatsCalculator::summarize(&agg),
            per_state: StatsCalculator::compute_group_stats_parallel(&agg, GroupLevel::State),
            aggregate: agg.summarize(options),
        })
    }

    /// Combined view of all three kinds under the same criteria.
    pub fn combined(&mut self, criteria: &FilterCriteria) -> Result<CombinedReport, SessionError> {
        let mut tables = Vec::with_capacity(DatasetKind::ALL.len());
        let mut warnings = Vec::new();
        let mut no_data = true;
        for kind in DatasetKind::ALL {
            let view = self.view(kind, criteria)?;
            no_data &= view.no_data;
            warnings.extend(view.warnings);
            tables.push(view.table);
        }
        let refs: Vec<&RecordTable> = tables.iter().collect();
        Ok(CombinedReport {
            view: CombinedView::build(&refs)?,
            warnings,
            no_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ENROLMENT_CSV: &str = "Date,State,District,Pincode,Age_0_5,Age_5_17,Age_18_Greater\n\
01-01-2023,KA,Bangalore,560001,5,10,20\n\
02-01-2023,MH,Pune,411001,1,2,3\n\
03-01-2023,KA,Mysore,570001,0,4,1\n";

    fn dashboard_with_enrolment(dir: &TempDir) -> Dashboard {
        fs::write(dir.path().join("enrol.csv"), ENROLMENT_CSV).unwrap();
        let mut config = DashboardConfig::default().with_data_dir(Some(dir.path().to_path_buf()));
        config.sources.enrolment = vec!["enrol.csv".to_string()];
        config.sources.demographic = vec!["missing-demo.csv".to_string()];
        config.sources.biometric = vec!["missing-bio.csv".to_string()];
        Dashboard::new(config)
    }

    #[test]
    fn view_filters_the_loaded_kind() {
        let dir = TempDir::new().unwrap();
        let mut dashboard = dashboard_with_enrolment(&dir);
        let view = dashboard
            .view(DatasetKind::Enrolment, &FilterCriteria::new().state("ka"))
            .unwrap();
        assert_eq!(view.table.height(), 2);
        assert!(!view.no_data);
        assert!(view.warnings.is_empty());
    }

    #[test]
    fn missing_kind_is_an_empty_view() {
        let dir = TempDir::new().unwrap();
        let mut dashboard = dashboard_with_enrolment(&dir);
        let view = dashboard
            .view(DatasetKind::Biometric, &FilterCriteria::new())
            .unwrap();
        assert!(view.no_data);
        assert!(view.table.is_empty());
        assert!(view
            .warnings
            .iter()
            .any(|w| matches!(w, LoadWarning::EmptyResult { .. })));
    }

    #[test]
    fn upload_overrides_and_clear_restores() {
        let dir = TempDir::new().unwrap();
        let mut dashboard = dashboard_with_enrolment(&dir);
        let uploaded = "date,state,district,pincode,age_0_5,age_5_17,age_18_greater\n\
05-03-2023,TN,Chennai,600001,1,1,1\n";

        let report = dashboard
            .upload(DatasetKind::Enrolment, "new.csv", uploaded.as_bytes())
            .unwrap();
        assert_eq!(report.rows_kept, 1);
        assert!(dashboard.has_upload(DatasetKind::Enrolment));

        let options = dashboard.filter_options(DatasetKind::Enrolment, None).unwrap();
        assert_eq!(options.states, vec!["TN"]);

        assert!(dashboard.clear_upload(DatasetKind::Enrolment));
        let options = dashboard.filter_options(DatasetKind::Enrolment, None).unwrap();
        assert_eq!(options.states, vec!["KA", "MH"]);
    }

    #[test]
    fn broken_upload_keeps_previous_sources() {
        let dir = TempDir::new().unwrap();
        let mut dashboard = dashboard_with_enrolment(&dir);
        let result = dashboard.upload(DatasetKind::Enrolment, "bad.csv", b"a,b\n1,2\n".as_slice());
        assert!(result.is_err());
        assert!(!dashboard.has_upload(DatasetKind::Enrolment));
        assert_eq!(dashboard.load(DatasetKind::Enrolment).table.height(), 3);
    }

    #[test]
    fn filter_options_follow_the_selected_state() {
        let dir = TempDir::new().unwrap();
        let mut dashboard = dashboard_with_enrolment(&dir);
        let options = dashboard
            .filter_options(DatasetKind::Enrolment, Some("KA"))
            .unwrap();
        assert_eq!(options.districts, vec!["Bangalore", "Mysore"]);
        assert_eq!(options.min_date, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(options.max_date, NaiveDate::from_ymd_opt(2023, 1, 3));
        assert!(options.warnings.is_empty());
    }

    #[test]
    fn filter_options_carry_load_warnings() {
        let dir = TempDir::new().unwrap();
        let mut dashboard = dashboard_with_enrolment(&dir);
        let options = dashboard.filter_options(DatasetKind::Demographic, None).unwrap();
        assert!(options.states.is_empty());
        assert!(options
            .warnings
            .iter()
            .any(|w| matches!(w, LoadWarning::SourceSkipped { .. })));
        assert!(options
            .warnings
            .contains(&LoadWarning::EmptyResult { kind: DatasetKind::Demographic }));
    }

    #[test]
    fn summary_uses_configured_top_n() {
        let dir = TempDir::new().unwrap();
        let mut dashboard = dashboard_with_enrolment(&dir);
        let mut options = dashboard.aggregate_options();
        options.top_n = 1;
        let report = dashboard
            .summary(DatasetKind::Enrolment, &FilterCriteria::new(), &options)
            .unwrap();
        assert_eq!(report.summary.records, 3);
        assert_eq!(report.aggregate.top_states.len(), 1);
        assert_eq!(report.aggregate.top_states[0].name, "KA");
        assert_eq!(report.per_state.len(), 2);
    }

    #[test]
    fn combined_view_spans_all_kinds() {
        let dir = TempDir::new().unwrap();
        let mut dashboard = dashboard_with_enrolment(&dir);
        let report = dashboard.combined(&FilterCriteria::new()).unwrap();
        assert!(!report.no_data);
        assert_eq!(report.view.rows.len(), 3);
        assert_eq!(report.view.total(DatasetKind::Enrolment), 46.0);
        assert_eq!(report.view.total(DatasetKind::Biometric), 0.0);
    }

    #[test]
    fn combined_report_keeps_every_kinds_warnings() {
        let dir = TempDir::new().unwrap();
        let mut dashboard = dashboard_with_enrolment(&dir);
        let report = dashboard.combined(&FilterCriteria::new()).unwrap();
        for kind in [DatasetKind::Demographic, DatasetKind::Biometric] {
            assert!(report.warnings.contains(&LoadWarning::EmptyResult { kind }));
        }
        let skipped = report
            .warnings
            .iter()
            .filter(|w| matches!(w, LoadWarning::SourceSkipped { .. }))
            .count();
        assert_eq!(skipped, 2);
    }

    #[test]
    fn combined_report_flags_no_data() {
        let dir = TempDir::new().unwrap();
        let mut dashboard = dashboard_with_enrolment(&dir);
        dashboard.config.sources.enrolment = vec!["missing-enrol.csv".to_string()];
        let report = dashboard.combined(&FilterCriteria::new()).unwrap();
        assert!(report.no_data);
        assert!(report.view.is_empty());
        assert_eq!(report.warnings.len(), 6);
    }
}
