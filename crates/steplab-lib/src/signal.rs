use crate::error::{TransientError, TransientResult};
use serde::{Deserialize, Serialize};

/// Time-ordered `(time, value)` samples of one recorded response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleSeries {
    time: Vec<f64>,
    value: Vec<f64>,
}

impl SampleSeries {
    /// Build a series from parallel columns. Time must be strictly increasing
    /// and every entry finite.
    pub fn new(time: Vec<f64>, value: Vec<f64>) -> TransientResult<Self> {
        if time.len() != value.len() {
            return Err(TransientError::LengthMismatch {
                time: time.len(),
                value: value.len(),
            });
        }
        for (index, (t, v)) in time.iter().zip(&value).enumerate() {
            if !t.is_finite() || !v.is_finite() {
                return Err(TransientError::NonFiniteSample { index });
            }
            if index > 0 && *t <= time[index - 1] {
                return Err(TransientError::NonIncreasingTime { index });
            }
        }
        Ok(Self { time, value })
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> TransientResult<Self> {
        let (time, value): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        Self::new(time, value)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    pub fn time(&self) -> &[f64] {
        &self.time
    }
    pub fn value(&self) -> &[f64] {
        &self.value
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time.iter().copied().zip(self.value.iter().copied())
    }

    pub fn points(&self) -> Vec<[f64; 2]> {
        self.iter().map(|(t, v)| [t, v]).collect()
    }

    /// Elapsed time between the first and last sample.
    pub fn duration(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
}

/// A local maximum of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub index: usize,
    pub time: f64,
    pub value: f64,
}

/// A series with a caller-chosen label, the unit of batch analysis.
#[derive(Debug, Clone, Serialize)]
pub struct LabeledSeries {
    pub label: String,
    pub series: SampleSeries,
}

impl LabeledSeries {
    pub fn new(label: impl Into<String>, series: SampleSeries) -> Self {
        Self {
            label: label.into(),
            series,
        }
    }
}
