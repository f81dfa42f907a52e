use crate::metrics::transient::{MetricColumn, TransientMetrics};
use serde::{Deserialize, Serialize};

/// Density-normalised histogram: bar areas sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `bins + 1` ascending bin edges.
    pub edges: Vec<f64>,
    pub density: Vec<f64>,
    /// Number of finite values binned.
    pub count: usize,
}

impl Histogram {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Bin the finite entries of `values` into `bins` equal-width bins spanning
/// `[min, max]`; the last bin is closed. A zero-width range is widened to
/// `[v - 0.5, v + 0.5]`.
pub fn histogram(values: &[f64], bins: usize) -> Histogram {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Histogram {
            edges: Vec::new(),
            density: Vec::new(),
            count: 0,
        };
    }
    let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + i as f64 * width).collect();
    let mut counts = vec![0usize; bins];
    for v in &finite {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let norm = finite.len() as f64 * width;
    Histogram {
        edges,
        density: counts.iter().map(|&c| c as f64 / norm).collect(),
        count: finite.len(),
    }
}

/// Histogram of one metrics column across many records.
pub fn column_histogram(records: &[TransientMetrics], column: MetricColumn, bins: usize) -> Histogram {
    let values: Vec<f64> = records.iter().map(|m| column.get(m)).collect();
    histogram(&values, bins)
}
