use crate::signal::SampleSeries;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse `time value` pairs, one per line, separated by whitespace or a comma.
/// Blank lines and `#` comments are ignored.
pub fn parse_sample_pairs(text: &str) -> Result<SampleSeries> {
    let mut pairs = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut fields = trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty());
        let (Some(t), Some(v), None) = (fields.next(), fields.next(), fields.next()) else {
            anyhow::bail!("line {} is not a `time value` pair: {}", idx + 1, trimmed);
        };
        let t: f64 = t
            .parse()
            .with_context(|| format!("line {} time is not f64: {}", idx + 1, t))?;
        let v: f64 = v
            .parse()
            .with_context(|| format!("line {} value is not f64: {}", idx + 1, v))?;
        pairs.push((t, v));
    }
    if pairs.is_empty() {
        anyhow::bail!("no samples found");
    }
    Ok(SampleSeries::from_pairs(pairs)?)
}

/// Read `time value` pairs from disk.
pub fn read_sample_pairs(path: &Path) -> Result<SampleSeries> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_sample_pairs(&text)
}
