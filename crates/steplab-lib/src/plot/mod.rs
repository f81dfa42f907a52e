use crate::metrics::poles::PolePair;
use crate::metrics::summary::Histogram;
use crate::signal::LabeledSeries;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

/// Series colors, assigned in order and reused cyclically.
pub const PALETTE: [Color; 6] = [
    Color(0xFF0000),
    Color(0x0000FF),
    Color(0x008000),
    Color(0x800080),
    Color(0xFFA500),
    Color(0x000000),
];

pub const HISTOGRAM_COLOR: Color = Color(0x87CEEB);

pub fn palette_color(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub radius: u32,
    pub color: Color,
}

/// Bars as `[left, right, height]`, all rising from zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarSeries {
    pub name: String,
    pub bars: Vec<[f64; 3]>,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Scatter(ScatterSeries),
    Bars(BarSeries),
}

impl Series {
    pub fn name(&self) -> &str {
        match self {
            Series::Line(s) => &s.name,
            Series::Scatter(s) => &s.name,
            Series::Bars(s) => &s.name,
        }
    }

    /// Every point the series covers, bar corners included.
    fn extent(&self) -> Vec<[f64; 2]> {
        match self {
            Series::Line(s) => s.points.clone(),
            Series::Scatter(s) => s.points.clone(),
            Series::Bars(s) => s
                .bars
                .iter()
                .flat_map(|[l, r, h]| [[*l, 0.0], [*r, *h]])
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    /// Draw the `x = 0` and `y = 0` lines and keep the origin in view.
    pub origin_axes: bool,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            origin_axes: false,
            series: Vec::new(),
        }
    }

    pub fn with_axes(mut self, x: &str, y: &str) -> Self {
        self.x.label = Some(x.into());
        self.y.label = Some(y.into());
        self
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over the finite points of every series,
    /// widened so neither range is empty. `None` when nothing is plottable.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points: Vec<[f64; 2]> = self
            .series
            .iter()
            .flat_map(Series::extent)
            .filter(|[x, y]| x.is_finite() && y.is_finite())
            .collect();
        if points.is_empty() {
            return None;
        }
        if self.origin_axes {
            points.push([0.0, 0.0]);
        }
        let (mut x0, mut x1) = span(points.iter().map(|p| p[0]));
        let (mut y0, mut y1) = span(points.iter().map(|p| p[1]));
        widen(&mut x0, &mut x1);
        widen(&mut y0, &mut y1);
        Some((x0, x1, y0, y1))
    }
}

fn span(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn widen(lo: &mut f64, hi: &mut f64) {
    if *hi - *lo <= f64::EPSILON * lo.abs().max(1.0) {
        let pad = (lo.abs() * 0.05).max(0.5);
        *lo -= pad;
        *hi += pad;
    }
}

pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        let sample = points[start];
        result.push(sample);
    }
    result
}

/// One line per labeled step response, in palette order.
pub fn figure_from_responses(series: &[LabeledSeries], max_points: usize) -> Figure {
    let mut fig = Figure::new(Some("Step Response Data".into())).with_axes("Time (s)", "Output");
    for (i, item) in series.iter().enumerate() {
        fig.add_series(Series::Line(LineSeries {
            name: item.label.clone(),
            points: decimate_points(&item.series.points(), max_points),
            style: Style {
                width: 1.6,
                dash: None,
                color: palette_color(i),
            },
        }));
    }
    fig
}

/// Root-locus scatter of `(label, poles)` pairs. Both conjugates are plotted
/// and labels become one series each, in order of first appearance.
pub fn figure_from_poles(poles: &[(String, PolePair)]) -> Figure {
    let mut groups: Vec<(&str, Vec<[f64; 2]>)> = Vec::new();
    for (label, pair) in poles {
        let idx = match groups.iter().position(|(name, _)| *name == label.as_str()) {
            Some(idx) => idx,
            None => {
                groups.push((label.as_str(), Vec::new()));
                groups.len() - 1
            }
        };
        for p in pair.as_array() {
            groups[idx].1.push([p.re, p.im]);
        }
    }

    let mut fig = Figure::new(Some("Limited Root Locus".into())).with_axes("Real Axis", "Imaginary Axis");
    fig.origin_axes = true;
    for (i, (name, points)) in groups.into_iter().enumerate() {
        fig.add_series(Series::Scatter(ScatterSeries {
            name: name.to_string(),
            points,
            radius: 4,
            color: palette_color(i),
        }));
    }
    fig
}

/// Density bars for one metric column.
pub fn figure_from_histogram(column: &str, hist: &Histogram) -> Figure {
    let mut fig = Figure::new(Some(format!("Distribution of {}", column))).with_axes(column, "Density");
    let bars = hist
        .edges
        .windows(2)
        .zip(&hist.density)
        .map(|(edge, d)| [edge[0], edge[1], *d])
        .collect();
    fig.add_series(Series::Bars(BarSeries {
        name: column.to_string(),
        bars,
        color: HISTOGRAM_COLOR,
    }));
    fig
}
