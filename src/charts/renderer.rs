//! Static Chart Renderer
//! Generates SVG charts of aggregate results with plotters.
//!
//! Charts:
//! 1. Trend: measure per period as a line with point markers
//! 2. Ranking: top-N contributors as vertical bars
//! 3. Age distribution: one bar per age bucket
//!
//! An empty input renders a blank canvas with an empty-state message instead
//! of failing.

use crate::stats::{AgeDistribution, GroupTotal, TimePoint};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use std::fs;
use std::path::Path;
use thiserror::Error;

// Colors
const LINE_COLOR: RGBColor = RGBColor(91, 155, 213);
const MUTED: RGBColor = RGBColor(120, 120, 120);

pub const PALETTE: [RGBColor; 6] = [
    RGBColor(91, 155, 213), // Blue
    RGBColor(237, 125, 49), // Orange
    RGBColor(112, 173, 71), // Green
    RGBColor(155, 89, 182), // Purple
    RGBColor(26, 188, 156), // Teal
    RGBColor(233, 30, 99),  // Pink
];

/// Default canvas size in pixels.
pub const DEFAULT_SIZE: (u32, u32) = (900, 480);

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Chart drawing failed: {0}")]
    Draw(String),
    #[error("Failed to write chart: {0}")]
    Io(#[from] std::io::Error),
}

fn draw_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Draw(e.to_string())
}

fn font(size: f64) -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, size, FontStyle::Normal)
}

/// Label of the nearest integer position, blank between positions.
fn index_label(labels: &[String], x: f64) -> String {
    if (x - x.round()).abs() > 1e-6 || x < 0.0 {
        return String::new();
    }
    labels.get(x.round() as usize).cloned().unwrap_or_default()
}

/// Upper y bound with some headroom; never zero so the axis stays valid.
fn y_upper(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    fn empty_state(
        root: &DrawingArea<SVGBackend<'_>, Shift>,
        title: &str,
        size: (u32, u32),
    ) -> Result<(), ChartError> {
        let (w, h) = (size.0 as i32, size.1 as i32);
        root.draw(&Text::new(title.to_string(), (20, 20), font(20.0)))
            .map_err(draw_err)?;
        root.draw(&Text::new(
            "No data for the current filters".to_string(),
            (w / 2 - 130, h / 2),
            font(16.0).color(&MUTED),
        ))
        .map_err(draw_err)?;
        Ok(())
    }

    /// Line chart of a time series; sparse series are drawn point to point.
    pub fn time_series_svg(
        series: &[TimePoint],
        title: &str,
        y_label: &str,
        size: (u32, u32),
    ) -> Result<String, ChartError> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;

            if series.is_empty() {
                Self::empty_state(&root, title, size)?;
            } else {
                let labels: Vec<String> = series.iter().map(|p| p.label.clone()).collect();
                let x_max = (series.len().max(2) - 1) as f64;
                let y_max = y_upper(series.iter().map(|p| p.value));

                let mut chart = ChartBuilder::on(&root)
                    .caption(title, font(20.0))
                    .margin(15)
                    .x_label_area_size(45)
                    .y_label_area_size(70)
                    .build_cartesian_2d(-0.25f64..x_max + 0.25, 0f64..y_max)
                    .map_err(draw_err)?;

                chart
                    .configure_mesh()
                    .x_labels(series.len().min(12))
                    .x_label_formatter(&|x| index_label(&labels, *x))
                    .y_desc(y_label)
                    .label_style(font(12.0))
                    .draw()
                    .map_err(draw_err)?;

                let points: Vec<(f64, f64)> = series
                    .iter()
                    .enumerate()
                    .map(|(i, p)| (i as f64, p.value))
                    .collect();
                chart
                    .draw_series(LineSeries::new(points.clone(), LINE_COLOR.stroke_width(2)))
                    .map_err(draw_err)?;
                chart
                    .draw_series(points.into_iter().map(|p| Circle::new(p, 3, LINE_COLOR.filled())))
                    .map_err(draw_err)?;
            }
            root.present().map_err(draw_err)?;
        }
        Ok(svg)
    }

    /// Bars for labelled values, in the given order.
    fn bars_svg(
        bars: &[(String, f64)],
        title: &str,
        y_label: &str,
        size: (u32, u32),
    ) -> Result<String, ChartError> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;

            if bars.is_empty() {
                Self::empty_state(&root, title, size)?;
            } else {
                let labels: Vec<String> = bars.iter().map(|(name, _)| name.clone()).collect();
                let y_max = y_upper(bars.iter().map(|(_, v)| *v));

                let mut chart = ChartBuilder::on(&root)
                    .caption(title, font(20.0))
                    .margin(15)
                    .x_label_area_size(45)
                    .y_label_area_size(70)
                    .build_cartesian_2d(-0.5f64..bars.len() as f64 - 0.5, 0f64..y_max)
                    .map_err(draw_err)?;

                chart
                    .configure_mesh()
                    .disable_x_mesh()
                    .x_labels(bars.len())
                    .x_label_formatter(&|x| index_label(&labels, *x))
                    .y_desc(y_label)
                    .label_style(font(12.0))
                    .draw()
                    .map_err(draw_err)?;

                chart
                    .draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
                        let x = i as f64;
                        let color = PALETTE[i % PALETTE.len()];
                        Rectangle::new([(x - 0.35, 0.0), (x + 0.35, *value)], color.filled())
                    }))
                    .map_err(draw_err)?;
            }
            root.present().map_err(draw_err)?;
        }
        Ok(svg)
    }

    /// Ranking of the largest contributors.
    pub fn ranking_svg(
        groups: &[GroupTotal],
        title: &str,
        y_label: &str,
        size: (u32, u32),
    ) -> Result<String, ChartError> {
        let bars: Vec<(String, f64)> = groups.iter().map(|g| (g.name.clone(), g.value)).collect();
        Self::bars_svg(&bars, title, y_label, size)
    }

    /// Absolute totals per age bucket. An all-zero distribution is drawn as
    /// the empty state.
    pub fn age_distribution_svg(
        distribution: &AgeDistribution,
        title: &str,
        size: (u32, u32),
    ) -> Result<String, ChartError> {
        let bars: Vec<(String, f64)> = if distribution.total > 0.0 {
            distribution
                .buckets
                .iter()
                .map(|b| (b.column.clone(), b.total))
                .collect()
        } else {
            Vec::new()
        };
        Self::bars_svg(&bars, title, "count", size)
    }

    pub fn write_svg(path: &Path, svg: &str) -> Result<(), ChartError> {
        fs::write(path, svg)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::AgeBucket;
    use chrono::NaiveDate;

    fn point(day: u32, value: f64) -> TimePoint {
        let period = NaiveDate::from_ymd_opt(2023, 1, day).unwrap();
        TimePoint {
            period,
            label: period.format("%Y-%m-%d").to_string(),
            value,
            rows: 1,
        }
    }

    #[test]
    fn index_labels_only_on_integers() {
        let labels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(index_label(&labels, 1.0), "b");
        assert_eq!(index_label(&labels, 0.5), "");
        assert_eq!(index_label(&labels, 5.0), "");
        assert_eq!(index_label(&labels, -1.0), "");
    }

    #[test]
    fn y_axis_never_collapses() {
        assert_eq!(y_upper([0.0, 0.0].into_iter()), 1.0);
        assert!((y_upper([10.0, 4.0].into_iter()) - 11.0).abs() < 1e-9);
    }

    #[test]
    fn renders_trend_svg() {
        let svg = StaticChartRenderer::time_series_svg(
            &[point(1, 10.0), point(2, 4.0), point(5, 7.0)],
            "Daily trend",
            "total",
            DEFAULT_SIZE,
        )
        .unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Daily trend"));
    }

    #[test]
    fn renders_single_point_series() {
        let svg =
            StaticChartRenderer::time_series_svg(&[point(1, 3.0)], "One", "total", DEFAULT_SIZE)
                .unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn empty_inputs_render_empty_state() {
        let svg =
            StaticChartRenderer::ranking_svg(&[], "Top states", "total", DEFAULT_SIZE).unwrap();
        assert!(svg.contains("No data for the current filters"));

        let zero = AgeDistribution {
            buckets: vec![AgeBucket {
                column: "bio_age_5_17".into(),
                total: 0.0,
                share: 0.0,
            }],
            total: 0.0,
        };
        let svg = StaticChartRenderer::age_distribution_svg(&zero, "Ages", DEFAULT_SIZE).unwrap();
        assert!(svg.contains("No data for the current filters"));
    }

    #[test]
    fn renders_ranking_bars() {
        let groups = vec![
            GroupTotal {
                name: "KA".into(),
                value: 35.0,
                rows: 1,
            },
            GroupTotal {
                name: "MH".into(),
                value: 6.0,
                rows: 1,
            },
        ];
        let svg =
            StaticChartRenderer::ranking_svg(&groups, "Top states", "total", DEFAULT_SIZE).unwrap();
        assert!(svg.contains("<rect"));
        assert!(svg.contains("Top states"));
    }
}
