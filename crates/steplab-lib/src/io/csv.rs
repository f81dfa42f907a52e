use crate::signal::SampleSeries;
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Default header written for step-response files.
pub const STEP_HEADER: [&str; 2] = ["Time", "Output"];

/// Read a step-response CSV: one header row, then `(time, value)` in the first
/// two columns regardless of their names.
pub fn read_step_csv(path: &Path) -> Result<SampleSeries> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_step_csv(file).with_context(|| format!("reading {}", path.display()))
}

pub fn parse_step_csv<R: Read>(reader: R) -> Result<SampleSeries> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers().context("reading header")?;
    if headers.len() < 2 {
        return Err(anyhow!(
            "expected at least two columns, header has {}",
            headers.len()
        ));
    }

    let mut pairs = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.context("reading record")?;
        let line = row + 2;
        let time = parse_cell(&record, 0, line, "time")?;
        let value = parse_cell(&record, 1, line, "value")?;
        pairs.push((time, value));
    }
    Ok(SampleSeries::from_pairs(pairs)?)
}

fn parse_cell(record: &csv::StringRecord, idx: usize, line: usize, what: &str) -> Result<f64> {
    let raw = record
        .get(idx)
        .ok_or_else(|| anyhow!("line {}: missing {} column", line, what))?;
    raw.parse::<f64>()
        .with_context(|| format!("line {}: {} is not a number: {}", line, what, raw))
}

/// Write `series` with the default header.
pub fn write_step_csv(path: &Path, series: &SampleSeries) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_step_to(file, series).with_context(|| format!("writing {}", path.display()))
}

pub fn write_step_to<W: Write>(writer: W, series: &SampleSeries) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(STEP_HEADER)?;
    for (t, v) in series.iter() {
        writer.write_record([t.to_string(), v.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn workspace_file(rel: &str) -> PathBuf {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        manifest_dir
            .parent()
            .and_then(|p| p.parent())
            .expect("workspace")
            .join(rel)
    }

    #[test]
    fn reads_reference_step() {
        let series = read_step_csv(&workspace_file("test_data/e2e_step.csv")).unwrap();
        assert_eq!(series.len(), 7);
        assert_eq!(series.time()[3], 3.0);
        assert_eq!(series.value()[2], 9.0);
    }

    #[test]
    fn columns_are_positional() {
        let text = "t_s, velocity, extra\n0.0, 1.5, x\n0.5, 2.5, y\n";
        let series = parse_step_csv(text.as_bytes()).unwrap();
        assert_eq!(series.points(), vec![[0.0, 1.5], [0.5, 2.5]]);
    }

    #[test]
    fn reports_bad_cells_with_line_numbers() {
        let err = parse_step_csv("Time,Output\n0,1\n1,oops\n".as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"), "{err:#}");
        assert!(parse_step_csv("Time\n0\n".as_bytes()).is_err());
        assert!(parse_step_csv("Time,Output\n1,1\n0,2\n".as_bytes()).is_err());
    }

    #[test]
    fn written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("step.csv");
        let series = SampleSeries::from_pairs([(0.0, 0.0), (0.01, 0.125), (0.02, 0.5)]).unwrap();
        write_step_csv(&path, &series).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Time,Output\n"));
        assert_eq!(read_step_csv(&path).unwrap(), series);
    }
}
