use crate::metrics::poles::PolePair;
use crate::metrics::transient::{MetricColumn, TransientMetrics};
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const SYSTEM_HEADER: &str = "System";
pub const SOURCE_HEADER: &str = "Source";
pub const POLE_HEADERS: [&str; 3] = ["Pole Real", "Pole Imag +", "Pole Imag -"];

/// One row of a metrics table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRow {
    pub system: String,
    pub metrics: TransientMetrics,
}

/// One row of a pole table: a metrics row, the table it came from and its
/// pole pair when defined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoleRow {
    pub source: String,
    pub system: String,
    pub metrics: TransientMetrics,
    pub poles: Option<PolePair>,
}

impl PoleRow {
    pub fn from_metrics_row(source: impl Into<String>, row: MetricsRow) -> Self {
        let poles = PolePair::from_metrics(&row.metrics);
        Self {
            source: source.into(),
            system: row.system,
            metrics: row.metrics,
            poles,
        }
    }
}

/// Cell text for a number: empty for `NaN`, optionally rounded.
fn format_cell(value: f64, decimals: Option<u32>) -> String {
    if value.is_nan() {
        return String::new();
    }
    match decimals {
        Some(d) => {
            let scale = 10f64.powi(d as i32);
            let rounded = (value * scale).round() / scale;
            // avoid "-0" for values that round to zero
            if rounded == 0.0 {
                "0".to_string()
            } else {
                rounded.to_string()
            }
        }
        None => value.to_string(),
    }
}

fn metric_cells(metrics: &TransientMetrics, decimals: Option<u32>) -> impl Iterator<Item = String> + '_ {
    MetricColumn::ALL
        .into_iter()
        .map(move |col| format_cell(col.get(metrics), decimals))
}

pub fn write_metrics_table<W: Write>(writer: W, rows: &[MetricsRow], decimals: Option<u32>) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    let header = std::iter::once(SYSTEM_HEADER).chain(MetricColumn::ALL.into_iter().map(|c| c.header()));
    writer.write_record(header)?;
    for row in rows {
        let record = std::iter::once(row.system.clone()).chain(metric_cells(&row.metrics, decimals));
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_metrics_table(path: &Path, rows: &[MetricsRow], decimals: Option<u32>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_metrics_table(file, rows, decimals).with_context(|| format!("writing {}", path.display()))
}

pub fn write_pole_table<W: Write>(writer: W, rows: &[PoleRow], decimals: Option<u32>) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    let header = [SOURCE_HEADER, SYSTEM_HEADER]
        .into_iter()
        .chain(MetricColumn::ALL.into_iter().map(|c| c.header()))
        .chain(POLE_HEADERS);
    writer.write_record(header)?;
    for row in rows {
        let (re, im_pos, im_neg) = match row.poles {
            Some(p) => (p.upper.re, p.upper.im, p.lower.im),
            None => (f64::NAN, f64::NAN, f64::NAN),
        };
        let record = [row.source.clone(), row.system.clone()]
            .into_iter()
            .chain(metric_cells(&row.metrics, decimals))
            .chain([re, im_pos, im_neg].map(|v| format_cell(v, decimals)));
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_pole_table(path: &Path, rows: &[PoleRow], decimals: Option<u32>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_pole_table(file, rows, decimals).with_context(|| format!("writing {}", path.display()))
}

/// Read a metrics table. Only `System`, the natural-frequency and the
/// damping-ratio columns are required; other metric columns read as `NaN`
/// when absent.
pub fn read_metrics_table(path: &Path) -> Result<Vec<MetricsRow>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_metrics_table(file).with_context(|| format!("reading {}", path.display()))
}

pub fn parse_metrics_table<R: Read>(reader: R) -> Result<Vec<MetricsRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers().context("reading header")?.clone();

    let system_idx = locate_column(&headers, SYSTEM_HEADER)?;
    let mut columns = Vec::new();
    for col in MetricColumn::ALL {
        let idx = match col {
            MetricColumn::NaturalFrequency | MetricColumn::DampingRatio => {
                Some(locate_column(&headers, col.header())?)
            }
            _ => locate_column(&headers, col.header()).ok(),
        };
        if let Some(idx) = idx {
            columns.push((col, idx));
        }
    }

    let mut rows = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.context("reading record")?;
        let line = row + 2;
        let system = record.get(system_idx).unwrap_or_default().to_string();
        let mut metrics = TransientMetrics::undefined();
        for (col, idx) in &columns {
            col.set(&mut metrics, parse_cell(&record, *idx, line, col.header())?);
        }
        rows.push(MetricsRow { system, metrics });
    }
    Ok(rows)
}

fn locate_column(headers: &StringRecord, requested: &str) -> Result<usize> {
    headers
        .iter()
        .position(|name| name.trim().eq_ignore_ascii_case(requested))
        .ok_or_else(|| anyhow!("missing column '{}'", requested))
}

fn parse_cell(record: &StringRecord, idx: usize, line: usize, header: &str) -> Result<f64> {
    let raw = record.get(idx).unwrap_or_default();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .with_context(|| format!("line {}: '{}' is not a number: {}", line, header, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metrics() -> TransientMetrics {
        TransientMetrics {
            rise_time: 0.123456,
            rise_time_start: 0.1,
            rise_time_end: 0.223456,
            threshold_low: 0.1,
            threshold_high: 0.9,
            settling_time: f64::NAN,
            overshoot_pct: 25.0,
            steady_state: 1.0,
            natural_frequency: 5.0,
            damping_ratio: 0.6,
        }
    }

    #[test]
    fn metrics_table_round_trips_with_rounding() {
        let rows = vec![MetricsRow {
            system: "P_100".into(),
            metrics: sample_metrics(),
        }];
        let mut buf = Vec::new();
        write_metrics_table(&mut buf, &rows, Some(3)).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("System,Rise Time (s),Rise Time start (s)"));
        assert!(header.contains("Threshhold 10 %"));
        assert!(text.contains("P_100,0.123,0.1,0.223,0.1,0.9,,25,1,5,0.6"), "{text}");

        let back = parse_metrics_table(buf.as_slice()).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].system, "P_100");
        assert_eq!(back[0].metrics.rise_time, 0.123);
        assert!(back[0].metrics.settling_time.is_nan());
        assert_eq!(back[0].metrics.damping_ratio, 0.6);
    }

    #[test]
    fn minimal_table_fills_missing_columns_with_nan() {
        let text = "System,Undamped Natural Freq (rad/s),Damping Ratio\na,4.0,0.2\nb,,nan\n";
        let rows = parse_metrics_table(text.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].metrics.natural_frequency, 4.0);
        assert!(rows[0].metrics.rise_time.is_nan());
        assert!(rows[1].metrics.natural_frequency.is_nan());
        assert!(rows[1].metrics.damping_ratio.is_nan());
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let err = parse_metrics_table("System,Damping Ratio\na,0.2\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Undamped Natural Freq"), "{err}");
    }

    #[test]
    fn pole_table_leaves_undefined_pairs_empty() {
        let defined = PoleRow::from_metrics_row(
            "run1",
            MetricsRow {
                system: "a".into(),
                metrics: sample_metrics(),
            },
        );
        let undefined = PoleRow::from_metrics_row(
            "run1",
            MetricsRow {
                system: "b".into(),
                metrics: TransientMetrics::undefined(),
            },
        );
        assert!(undefined.poles.is_none());
        let mut buf = Vec::new();
        write_pole_table(&mut buf, &[defined, undefined], Some(3)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Source,System,"));
        assert!(lines[0].ends_with("Pole Real,Pole Imag +,Pole Imag -"));
        assert!(lines[1].ends_with(",-3,4,-4"), "{}", lines[1]);
        assert!(lines[2].ends_with(",,,"), "{}", lines[2]);
    }
}
