use crate::error::TransientResult;
use crate::io::csv::read_step_csv;
use crate::metrics::poles::PolePair;
use crate::metrics::transient::{analyze, TransientConfig, TransientMetrics};
use crate::signal::LabeledSeries;
use anyhow::Result;
use log::{debug, warn};
use rayon::prelude::*;
use std::path::PathBuf;

/// Outcome of analyzing one labeled series.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMetrics {
    pub label: String,
    pub result: TransientResult<TransientMetrics>,
}

impl LabeledMetrics {
    pub fn metrics(&self) -> Option<&TransientMetrics> {
        self.result.as_ref().ok()
    }

    pub fn poles(&self) -> Option<PolePair> {
        self.metrics().and_then(PolePair::from_metrics)
    }
}

/// Analyze every series with the same configuration, in parallel. The output
/// keeps input order and a failure in one series leaves the others intact.
pub fn analyze_batch(series: &[LabeledSeries], cfg: &TransientConfig) -> Vec<LabeledMetrics> {
    series
        .par_iter()
        .map(|item| {
            let result = analyze(&item.series, cfg);
            if let Err(err) = &result {
                warn!("{}: {}", item.label, err);
            }
            LabeledMetrics {
                label: item.label.clone(),
                result,
            }
        })
        .collect()
}

/// Load `(label, csv path)` entries, skipping missing files with a warning.
/// A file that exists but cannot be parsed is an error.
pub fn load_labeled(entries: &[(String, PathBuf)]) -> Result<Vec<LabeledSeries>> {
    let mut out = Vec::with_capacity(entries.len());
    for (label, path) in entries {
        if !path.exists() {
            warn!("{}: file {} not found, skipping", label, path.display());
            continue;
        }
        let series = read_step_csv(path)?;
        debug!("{}: loaded {} samples from {}", label, series.len(), path.display());
        out.push(LabeledSeries::new(label.clone(), series));
    }
    Ok(out)
}
