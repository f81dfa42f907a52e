use crate::signal::{Peak, SampleSeries};
use serde::{Deserialize, Serialize};

/// Local-maximum test applied by [`find_peaks`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeakPolicy {
    /// `v[i] > v[i-1] && v[i] > v[i+1]`. A flat top yields no peak.
    #[default]
    Strict,
    /// A rise followed by a run of equal samples and then a fall is one
    /// peak, placed at the middle of the run (lower middle for even runs).
    /// A run that is followed by a further rise is a shoulder, not a peak.
    Plateau,
}

kebab_names!(PeakPolicy { Strict => "strict", Plateau => "plateau" });

/// Locate local maxima in time order. Endpoints are never peaks; series
/// shorter than three samples have none.
pub fn find_peaks(series: &SampleSeries, policy: PeakPolicy) -> Vec<Peak> {
    let indices = match policy {
        PeakPolicy::Strict => strict_maxima(series.value()),
        PeakPolicy::Plateau => plateau_maxima(series.value()),
    };
    let time = series.time();
    let value = series.value();
    indices
        .into_iter()
        .map(|index| Peak {
            index,
            time: time[index],
            value: value[index],
        })
        .collect()
}

fn strict_maxima(data: &[f64]) -> Vec<usize> {
    if data.len() < 3 {
        return Vec::new();
    }
    let mut peaks = Vec::new();
    for i in 1..data.len() - 1 {
        if data[i] > data[i - 1] && data[i] > data[i + 1] {
            peaks.push(i);
        }
    }
    peaks
}

fn plateau_maxima(data: &[f64]) -> Vec<usize> {
    if data.len() < 3 {
        return Vec::new();
    }
    let last = data.len() - 1;
    let mut peaks = Vec::new();
    let mut i = 1;
    while i < last {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead < last && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}
