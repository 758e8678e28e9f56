//! Plot Generator
//!
//! Produces a line chart and a step chart for a query. The primary source is the
//! executed result table (first two columns); when that is unusable the measurement
//! snippets among the retrieved entries are parsed into a depth profile instead.

pub mod chart;

use crate::error::{OceanError, Result};
use crate::execution::ResultTable;
use crate::retrieval::RetrievedEntry;
use chart::{ChartSpec, ChartStyle, XValues};
use lazy_static::lazy_static;
use plotters::style::RGBColor;
use polars::prelude::*;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

pub use chart::load_font;

pub const LINE_COLOR: RGBColor = RGBColor(0x00, 0x7b, 0xff);
pub const STEP_COLOR: RGBColor = RGBColor(0xff, 0x45, 0x00);
pub const SALINITY_COLOR: RGBColor = RGBColor(0x00, 0x00, 0xff);
pub const TEMPERATURE_COLOR: RGBColor = RGBColor(0xff, 0x45, 0x00);

/// Minimum number of parsed measurements for the fallback profile
pub const MIN_FALLBACK_POINTS: usize = 2;

lazy_static! {
    static ref MEASUREMENT_SUMMARY: Regex = Regex::new(
        r"^Measurement in profile (\d+\.\d+) at depth ([\d.]+)m: Temp ([\d.]+) °C, Salinity ([\d.]+) PSU"
    )
    .unwrap();
}

/// Base64 PNGs for the two chart styles
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPair {
    pub line: String,
    pub step: String,
}

/// One measurement parsed out of a retrieved snippet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementPoint {
    pub profile_id: f64,
    pub depth: f64,
    pub temperature: f64,
    pub salinity: f64,
}

/// Charts for a query, or `None` when neither source yields a plot.
pub fn generate(
    table: Option<&ResultTable>,
    entries: &[RetrievedEntry],
    query: &str,
) -> Option<ChartPair> {
    if let Some(table) = table.filter(|t| !t.is_empty() && t.width() >= 2) {
        match table_chart(table).and_then(|spec| render_pair(&spec, LINE_COLOR, STEP_COLOR)) {
            Ok(pair) => return Some(pair),
            Err(e) => warn!("Plotting the query result failed, trying retrieved measurements: {}", e),
        }
    }

    let points = measurement_points(entries);
    if points.len() < MIN_FALLBACK_POINTS {
        debug!(points = points.len(), "Not enough measurements to plot");
        return None;
    }

    let (spec, color) = profile_chart(points, query);
    match render_pair(&spec, color, color) {
        Ok(pair) => Some(pair),
        Err(e) => {
            warn!("Plotting retrieved measurements failed: {}", e);
            None
        }
    }
}

fn render_pair(spec: &ChartSpec, line_color: RGBColor, step_color: RGBColor) -> Result<ChartPair> {
    Ok(ChartPair {
        line: chart::render(spec, ChartStyle::Line, line_color)?,
        step: chart::render(spec, ChartStyle::Step, step_color)?,
    })
}

/// First column on X, second on Y; swapped when the second is not numeric.
fn table_chart(table: &ResultTable) -> Result<ChartSpec> {
    let columns = table.frame().get_columns();
    let (mut x_col, mut y_col) = (&columns[0], &columns[1]);
    if !y_col.dtype().is_numeric() {
        std::mem::swap(&mut x_col, &mut y_col);
    }
    if !y_col.dtype().is_numeric() {
        return Err(OceanError::Plot(format!(
            "Neither '{}' nor '{}' is numeric",
            x_col.name(),
            y_col.name()
        )));
    }

    let y_values: Vec<Option<f64>> = y_col
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect();

    let x = match x_col.dtype() {
        DataType::Date => {
            let days = x_col.cast(&DataType::Int32)?;
            let secs = days.i32()?.into_iter().map(|d| d.map(|d| d as f64 * 86_400.0));
            AxisColumn::Temporal(secs.collect())
        }
        DataType::Datetime(unit, _) => {
            let per_second = match unit {
                TimeUnit::Nanoseconds => 1e9,
                TimeUnit::Microseconds => 1e6,
                TimeUnit::Milliseconds => 1e3,
            };
            let raw = x_col.cast(&DataType::Int64)?;
            let secs = raw.i64()?.into_iter().map(|v| v.map(|v| v as f64 / per_second));
            AxisColumn::Temporal(secs.collect())
        }
        dtype if dtype.is_numeric() => {
            AxisColumn::Numeric(x_col.cast(&DataType::Float64)?.f64()?.into_iter().collect())
        }
        _ => {
            let text = x_col.cast(&DataType::String)?;
            let labels = text.str()?.into_iter().map(|s| s.map(str::to_string));
            AxisColumn::Categorical(labels.collect())
        }
    };

    let (x, y) = x.paired_with(&y_values);
    let x_label = capitalize(x_col.name());
    let y_label = capitalize(y_col.name());
    Ok(ChartSpec {
        x,
        y,
        title: format!("{} over {}", y_label, x_label),
        x_label,
        y_label,
        invert_y: y_col.name().to_lowercase().contains("depth"),
    })
}

/// X column values before rows with missing cells are dropped
enum AxisColumn {
    Numeric(Vec<Option<f64>>),
    Temporal(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl AxisColumn {
    /// Keep rows where both cells are present. Temporal axes are sorted by time.
    fn paired_with(&self, y: &[Option<f64>]) -> (XValues, Vec<f64>) {
        match self {
            AxisColumn::Numeric(xs) => {
                let (xs, ys): (Vec<f64>, Vec<f64>) = complete_pairs(xs, y).into_iter().unzip();
                (XValues::Numeric(xs), ys)
            }
            AxisColumn::Temporal(xs) => {
                let mut pairs = complete_pairs(xs, y);
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
                let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
                (XValues::Temporal(xs), ys)
            }
            AxisColumn::Categorical(xs) => {
                let (xs, ys): (Vec<String>, Vec<f64>) = complete_pairs(xs, y).into_iter().unzip();
                (XValues::Categorical(xs), ys)
            }
        }
    }
}

fn complete_pairs<T: Clone>(xs: &[Option<T>], ys: &[Option<f64>]) -> Vec<(T, f64)> {
    xs.iter()
        .zip(ys)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some((x.clone(), *y)),
            _ => None,
        })
        .collect()
}

/// Parse measurement snippets (source `measurements`) into points, sorted by depth.
pub fn measurement_points(entries: &[RetrievedEntry]) -> Vec<MeasurementPoint> {
    let mut points: Vec<MeasurementPoint> = entries
        .iter()
        .filter(|e| matches!(e, RetrievedEntry::Structured { .. }) && e.source() == "measurements")
        .filter_map(|e| MEASUREMENT_SUMMARY.captures(e.summary()))
        .filter_map(|caps| {
            Some(MeasurementPoint {
                profile_id: caps[1].parse().ok()?,
                depth: caps[2].parse().ok()?,
                temperature: caps[3].parse().ok()?,
                salinity: caps[4].parse().ok()?,
            })
        })
        .collect();
    points.sort_by(|a, b| a.depth.total_cmp(&b.depth));
    points
}

/// Depth profile: the measured value on X, depth downwards on Y.
fn profile_chart(points: Vec<MeasurementPoint>, query: &str) -> (ChartSpec, RGBColor) {
    let salinity = query.to_lowercase().contains("salinity");
    let (values, label, color): (Vec<f64>, &str, RGBColor) = if salinity {
        (
            points.iter().map(|p| p.salinity).collect(),
            "Salinity (PSU)",
            SALINITY_COLOR,
        )
    } else {
        (
            points.iter().map(|p| p.temperature).collect(),
            "Temperature (°C)",
            TEMPERATURE_COLOR,
        )
    };

    let spec = ChartSpec {
        x: XValues::Numeric(values),
        y: points.iter().map(|p| p.depth).collect(),
        x_label: label.to_string(),
        y_label: "Depth (m)".to_string(),
        title: "Measurements vs. Depth".to_string(),
        invert_y: true,
    };
    (spec, color)
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duckdb::types::Value;

    fn measurement(depth: f64, temp: f64, psal: f64) -> RetrievedEntry {
        RetrievedEntry::structured(
            format!(
                "Measurement in profile 1901234.0 at depth {}m: Temp {} °C, Salinity {} PSU",
                depth, temp, psal
            ),
            "measurements",
        )
    }

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultTable {
        ResultTable::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn test_numeric_table_gives_both_charts() {
        let t = table(
            &["depth_m", "temp"],
            vec![
                vec![Value::Double(5.0), Value::Double(28.4)],
                vec![Value::Double(50.0), Value::Double(27.9)],
            ],
        );
        let pair = generate(Some(&t), &[], "temperature by depth").expect("charts");
        assert!(!pair.line.is_empty());
        assert!(!pair.step.is_empty());
        assert_ne!(pair.line, pair.step);
    }

    #[test]
    fn test_empty_table_and_too_few_measurements_gives_none() {
        let empty = table(&["depth_m", "temp"], Vec::new());
        assert!(generate(Some(&empty), &[measurement(5.0, 28.0, 35.0)], "temp").is_none());
        assert!(generate(None, &[], "temp").is_none());
    }

    #[test]
    fn test_fallback_from_measurements() {
        let entries = vec![
            measurement(100.0, 20.1, 35.4),
            RetrievedEntry::Plain("Measurement in profile 1.0 at depth 3m: Temp 1 °C, Salinity 1 PSU".into()),
            measurement(5.0, 28.4, 35.1),
        ];
        assert!(generate(None, &entries, "salinity near the surface").is_some());
    }

    #[test]
    fn test_measurement_points_parse_and_sort() {
        let entries = vec![
            measurement(100.0, 20.1, 35.4),
            measurement(5.5, 28.4, 35.1),
            RetrievedEntry::structured("Profile 1.0 at lat 10", "profiles"),
            RetrievedEntry::structured("Measurement in profile 7.0 at depth 1m: Temp 1 °C, Salinity 2 PSU", "calibration"),
        ];
        let points = measurement_points(&entries);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].depth, 5.5);
        assert_eq!(points[0].temperature, 28.4);
        assert_eq!(points[1].salinity, 35.4);
        assert_eq!(points[1].profile_id, 1901234.0);
    }

    #[test]
    fn test_profile_chart_selects_series() {
        let points = vec![
            MeasurementPoint { profile_id: 1.0, depth: 5.0, temperature: 28.0, salinity: 35.0 },
            MeasurementPoint { profile_id: 1.0, depth: 50.0, temperature: 25.0, salinity: 35.5 },
        ];
        let (spec, color) = profile_chart(points.clone(), "Salinity profile");
        assert_eq!(spec.x, XValues::Numeric(vec![35.0, 35.5]));
        assert_eq!(spec.x_label, "Salinity (PSU)");
        assert_eq!(color, SALINITY_COLOR);
        assert!(spec.invert_y);

        let (spec, color) = profile_chart(points, "how warm is it");
        assert_eq!(spec.x, XValues::Numeric(vec![28.0, 25.0]));
        assert_eq!(spec.x_label, "Temperature (°C)");
        assert_eq!(color, TEMPERATURE_COLOR);
        assert_eq!(spec.title_for(ChartStyle::Step), "Measurements vs. Depth (Step Chart)");
    }

    #[test]
    fn test_table_chart_swaps_and_inverts() {
        let t = table(
            &["max_depth", "platform_number"],
            vec![
                vec![Value::Double(1500.0), Value::Text("1900042".into())],
                vec![Value::Double(2000.0), Value::Text("1900043".into())],
            ],
        );
        let spec = table_chart(&t).unwrap();
        assert_eq!(spec.x, XValues::Categorical(vec!["1900042".into(), "1900043".into()]));
        assert_eq!(spec.y, vec![1500.0, 2000.0]);
        assert!(spec.invert_y);
        assert_eq!(spec.title, "Max_depth over Platform_number");
    }

    #[test]
    fn test_table_chart_sorts_temporal_axis_and_drops_nulls() {
        let t = table(
            &["day", "avg_temp"],
            vec![
                vec![Value::Date32(19360), Value::Double(27.0)],
                vec![Value::Date32(19358), Value::Double(28.0)],
                vec![Value::Date32(19359), Value::Null],
            ],
        );
        let spec = table_chart(&t).unwrap();
        assert_eq!(spec.x, XValues::Temporal(vec![19358.0 * 86_400.0, 19360.0 * 86_400.0]));
        assert_eq!(spec.y, vec![28.0, 27.0]);
        assert!(!spec.invert_y);
    }

    #[test]
    fn test_non_numeric_table_falls_through() {
        let t = table(
            &["platform_type", "project_name"],
            vec![vec![Value::Text("APEX".into()), Value::Text("ARGO".into())]],
        );
        assert!(table_chart(&t).is_err());
        assert!(generate(Some(&t), &[], "platforms").is_none());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("avg_TEMP"), "Avg_temp");
        assert_eq!(capitalize(""), "");
    }
}
