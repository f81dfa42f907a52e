use crate::error::TransientResult;
use crate::signal::SampleSeries;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to subtract from every value before the second negative-value pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OffsetMode {
    /// The first remaining sample's value, so the response starts at zero.
    #[default]
    FirstSample,
    Constant(f64),
    None,
}

impl fmt::Display for OffsetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetMode::FirstSample => f.write_str("first-sample"),
            OffsetMode::Constant(c) => write!(f, "{}", c),
            OffsetMode::None => f.write_str("none"),
        }
    }
}

impl FromStr for OffsetMode {
    type Err = String;

    /// `first-sample`, `none`, or a number for a constant offset.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-sample" | "first" => Ok(OffsetMode::FirstSample),
            "none" => Ok(OffsetMode::None),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|c| c.is_finite())
                .map(OffsetMode::Constant)
                .ok_or_else(|| {
                    format!(
                        "unknown offset '{}', expected first-sample, none or a number",
                        other
                    )
                }),
        }
    }
}

/// Clean-up applied to a raw logged response before analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionConfig {
    /// Drop samples after this time (seconds). `None` keeps everything.
    pub max_time: Option<f64>,
    pub offset: OffsetMode,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            max_time: Some(4.0),
            offset: OffsetMode::FirstSample,
        }
    }
}

/// Trim, drop negative samples, remove the offset, drop negatives again and
/// re-zero time. The result may be empty.
pub fn condition(series: &SampleSeries, cfg: &ConditionConfig) -> TransientResult<SampleSeries> {
    let kept: Vec<(f64, f64)> = series
        .iter()
        .filter(|(t, _)| cfg.max_time.map_or(true, |max| *t <= max))
        .filter(|(_, v)| *v >= 0.0)
        .collect();

    let offset = match cfg.offset {
        OffsetMode::FirstSample => kept.first().map_or(0.0, |(_, v)| *v),
        OffsetMode::Constant(c) => c,
        OffsetMode::None => 0.0,
    };
    let shifted: Vec<(f64, f64)> = kept
        .into_iter()
        .map(|(t, v)| (t, v - offset))
        .filter(|(_, v)| *v >= 0.0)
        .collect();

    let t0 = shifted.first().map_or(0.0, |(t, _)| *t);
    debug!(
        "conditioned {} -> {} samples (offset {:.4}, t0 {:.4})",
        series.len(),
        shifted.len(),
        offset,
        t0
    );
    SampleSeries::from_pairs(shifted.into_iter().map(|(t, v)| (t - t0, v)))
}
