//! Charts module - Static chart rendering

mod renderer;

pub use renderer::{ChartError, StaticChartRenderer, DEFAULT_SIZE, PALETTE};
