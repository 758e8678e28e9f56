//! Chart rendering: plotters into an in-memory RGB buffer, PNG-encoded, base64 text.

use crate::error::{OceanError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::DateTime;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 600;

const FONT_FAMILY: &str = "sans-serif";

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT_LOADED: OnceLock<bool> = OnceLock::new();

/// Register the font used for captions and axis labels. Only the first call has an
/// effect. Returns whether a font is available; without one charts are drawn bare.
pub fn load_font(preferred: Option<&Path>) -> bool {
    *FONT_LOADED.get_or_init(|| {
        let candidates = preferred
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
                Ok(()) => {
                    info!("Chart font loaded from {}", path.display());
                    return true;
                }
                Err(_) => warn!("Unusable chart font {}", path.display()),
            }
        }
        warn!("No chart font found; charts will be rendered without text");
        false
    })
}

/// X values of a chart. Temporal values are seconds since the Unix epoch;
/// categorical values are plotted at their positions 0, 1, 2, ...
#[derive(Debug, Clone, PartialEq)]
pub enum XValues {
    Numeric(Vec<f64>),
    Temporal(Vec<f64>),
    Categorical(Vec<String>),
}

impl XValues {
    pub fn len(&self) -> usize {
        match self {
            XValues::Numeric(v) | XValues::Temporal(v) => v.len(),
            XValues::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn positions(&self) -> Vec<f64> {
        match self {
            XValues::Numeric(v) | XValues::Temporal(v) => v.clone(),
            XValues::Categorical(v) => (0..v.len()).map(|i| i as f64).collect(),
        }
    }

    fn tick_label(&self, value: f64) -> String {
        match self {
            XValues::Numeric(_) => format_number(value),
            XValues::Temporal(_) => DateTime::from_timestamp(value as i64, 0)
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            XValues::Categorical(labels) => {
                let rounded = value.round();
                if (value - rounded).abs() > 0.01 || rounded < 0.0 {
                    return String::new();
                }
                labels.get(rounded as usize).cloned().unwrap_or_default()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartStyle {
    Line,
    /// Step changes at each point (`post`), with markers
    Step,
}

impl ChartStyle {
    fn title_suffix(&self) -> &'static str {
        match self {
            ChartStyle::Line => "Line Chart",
            ChartStyle::Step => "Step Chart",
        }
    }
}

/// Everything needed to draw one series.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub x: XValues,
    pub y: Vec<f64>,
    pub x_label: String,
    pub y_label: String,
    /// Title without the `(Line Chart)` / `(Step Chart)` suffix
    pub title: String,
    /// Grow the Y axis downwards (depth)
    pub invert_y: bool,
}

impl ChartSpec {
    pub fn title_for(&self, style: ChartStyle) -> String {
        format!("{} ({})", self.title, style.title_suffix())
    }

    /// Data points in drawing coordinates. Inverted axes are drawn on negated values.
    fn points(&self) -> Vec<(f64, f64)> {
        let sign = if self.invert_y { -1.0 } else { 1.0 };
        self.x
            .positions()
            .into_iter()
            .zip(self.y.iter())
            .map(|(x, y)| (x, y * sign))
            .collect()
    }

    fn y_tick_label(&self, value: f64) -> String {
        let shown = if self.invert_y { -value } else { value };
        format_number(shown)
    }
}

/// Render one chart and return the PNG as standard base64.
pub fn render(spec: &ChartSpec, style: ChartStyle, color: RGBColor) -> Result<String> {
    if spec.x.is_empty() || spec.x.len() != spec.y.len() {
        return Err(OceanError::Plot(format!(
            "Cannot plot {} x values against {} y values",
            spec.x.len(),
            spec.y.len()
        )));
    }

    let mut buffer = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    if let Err(e) = draw(&mut buffer, spec, style, color, true) {
        warn!("Chart text could not be drawn ({}); rendering without labels", e);
        buffer.iter_mut().for_each(|b| *b = 0);
        draw(&mut buffer, spec, style, color, false)?;
    }

    encode_png(&buffer)
}

fn draw(
    buffer: &mut [u8],
    spec: &ChartSpec,
    style: ChartStyle,
    color: RGBColor,
    with_text: bool,
) -> Result<()> {
    let points = spec.points();
    let x_range = padded_range(points.iter().map(|p| p.0));
    let y_range = padded_range(points.iter().map(|p| p.1));

    let root = BitMapBackend::with_buffer(buffer, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if with_text {
        builder
            .caption(spec.title_for(style), (FONT_FAMILY, 22).into_font())
            .x_label_area_size(50)
            .y_label_area_size(70);
    }
    let mut chart = builder
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    if with_text {
        let x_formatter = |v: &f64| spec.x.tick_label(*v);
        let y_formatter = |v: &f64| spec.y_tick_label(*v);
        chart
            .configure_mesh()
            .x_desc(spec.x_label.as_str())
            .y_desc(spec.y_label.as_str())
            .x_label_formatter(&x_formatter)
            .y_label_formatter(&y_formatter)
            .draw()
            .map_err(plot_err)?;
    }

    let path = match style {
        ChartStyle::Line => points.clone(),
        ChartStyle::Step => step_post(&points),
    };
    chart
        .draw_series(LineSeries::new(path, color.stroke_width(2)))
        .map_err(plot_err)?;
    chart
        .draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
        )
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Step path where each value holds until the next x.
fn step_post(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(points.len() * 2);
    for (i, &(x, y)) in points.iter().enumerate() {
        out.push((x, y));
        if let Some(&(next_x, _)) = points.get(i + 1) {
            out.push((next_x, y));
        }
    }
    out
}

fn padded_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    let span = max - min;
    let pad = if span > 0.0 {
        span * 0.05
    } else {
        (min.abs() * 0.05).max(1.0)
    };
    (min - pad)..(max + pad)
}

fn format_number(value: f64) -> String {
    if value.fract().abs() < 1e-9 || value.abs() >= 1000.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn encode_png(rgb: &[u8]) -> Result<String> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, WIDTH, HEIGHT);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(plot_err)?;
        writer.write_image_data(rgb).map_err(plot_err)?;
        writer.finish().map_err(plot_err)?;
    }
    Ok(STANDARD.encode(out))
}

fn plot_err<E: std::fmt::Display>(e: E) -> OceanError {
    OceanError::Plot(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn spec(x: XValues, y: Vec<f64>, invert_y: bool) -> ChartSpec {
        ChartSpec {
            x,
            y,
            x_label: "Depth_m".to_string(),
            y_label: "Temp".to_string(),
            title: "Temp over Depth_m".to_string(),
            invert_y,
        }
    }

    #[test]
    fn test_render_produces_png() {
        let chart = spec(XValues::Numeric(vec![5.0, 50.0, 100.0]), vec![28.4, 27.9, 20.1], false);
        for style in [ChartStyle::Line, ChartStyle::Step] {
            let encoded = render(&chart, style, RGBColor(0x00, 0x7b, 0xff)).unwrap();
            let bytes = STANDARD.decode(encoded).unwrap();
            assert_eq!(&bytes[..8], &PNG_SIGNATURE);
        }
    }

    #[test]
    fn test_render_single_point_and_categories() {
        let single = spec(XValues::Numeric(vec![1.0]), vec![1.0], true);
        assert!(render(&single, ChartStyle::Line, RGBColor(0, 0, 255)).is_ok());

        let categories = spec(
            XValues::Categorical(vec!["APEX".into(), "SOLO".into()]),
            vec![3.0, 7.0],
            false,
        );
        assert!(render(&categories, ChartStyle::Step, RGBColor(0, 0, 255)).is_ok());
    }

    #[test]
    fn test_unusable_font_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();

        // falls through to the system fonts, if any
        let loaded = load_font(Some(path.as_path()));
        assert_eq!(loaded, load_font(None));

        let chart = spec(XValues::Numeric(vec![5.0, 50.0]), vec![28.4, 27.9], true);
        assert!(render(&chart, ChartStyle::Line, RGBColor(0, 0, 255)).is_ok());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let bad = spec(XValues::Numeric(vec![1.0, 2.0]), vec![1.0], false);
        assert!(matches!(
            render(&bad, ChartStyle::Line, RGBColor(0, 0, 0)),
            Err(OceanError::Plot(_))
        ));
    }

    #[test]
    fn test_step_post_path() {
        let path = step_post(&[(0.0, 1.0), (1.0, 2.0), (3.0, 0.5)]);
        assert_eq!(
            path,
            vec![(0.0, 1.0), (1.0, 1.0), (1.0, 2.0), (3.0, 2.0), (3.0, 0.5)]
        );
    }

    #[test]
    fn test_inverted_axis_labels_show_original_values() {
        let chart = spec(XValues::Numeric(vec![1.0, 2.0]), vec![10.0, 20.0], true);
        assert_eq!(chart.points(), vec![(1.0, -10.0), (2.0, -20.0)]);
        assert_eq!(chart.y_tick_label(-20.0), "20");
    }

    #[test]
    fn test_tick_labels() {
        let temporal = XValues::Temporal(vec![1_672_531_200.0]);
        assert_eq!(temporal.tick_label(1_672_531_200.0), "2023-01-01");

        let categorical = XValues::Categorical(vec!["a".into(), "b".into()]);
        assert_eq!(categorical.tick_label(1.0), "b");
        assert_eq!(categorical.tick_label(0.5), "");
        assert_eq!(categorical.tick_label(7.0), "");
        assert_eq!(format_number(35.127), "35.13");
        assert_eq!(format_number(1500.4), "1500");
    }
}
