use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde_json::json;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};
use steplab_lib::{
    batch::{analyze_batch, load_labeled},
    config::{read_manifest, ComparisonManifest, SeriesEntry, DEFAULT_DATA_FILE},
    detectors::peaks::PeakPolicy,
    io::{
        csv as csv_io,
        table::{self, MetricsRow, PoleRow},
        text as text_io,
    },
    metrics::{
        poles::PolePair,
        summary::column_histogram,
        transient::{
            analyze, DampingMethod, MetricColumn, SettlingPolicy, ThresholdPolicy,
            TransientConfig,
        },
    },
    plot::{
        figure_from_histogram, figure_from_poles, figure_from_responses, Figure, PlotBackend,
        Series,
    },
    preprocess::{condition, ConditionConfig, OffsetMode},
    signal::SampleSeries,
    simulate::{second_order_step, SecondOrderSpec},
};

#[derive(Parser)]
#[command(
    name = "steplab",
    version,
    about = "Step-response transient analysis and pole extraction"
)]
struct Cli {
    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the analysis configuration; unset flags keep the base value.
#[derive(Args, Debug, Clone, Default)]
struct AnalysisArgs {
    /// Threshold crossing policy: sample | interpolate
    #[arg(long)]
    threshold_policy: Option<ThresholdPolicy>,
    /// Lower rise-time fraction of steady-state
    #[arg(long)]
    rise_low: Option<f64>,
    /// Upper rise-time fraction of steady-state
    #[arg(long)]
    rise_high: Option<f64>,
    /// Share of trailing samples averaged for steady-state
    #[arg(long)]
    tail_fraction: Option<f64>,
    /// Settling band half-width as a fraction of steady-state
    #[arg(long)]
    settling_tolerance: Option<f64>,
    /// Settling policy: permanent | first-entry
    #[arg(long)]
    settling_policy: Option<SettlingPolicy>,
    /// Damping estimator: overshoot | log-decrement
    #[arg(long)]
    damping_method: Option<DampingMethod>,
    /// Peak detection: strict | plateau
    #[arg(long)]
    peak_policy: Option<PeakPolicy>,
}

impl AnalysisArgs {
    fn apply(&self, mut cfg: TransientConfig) -> TransientConfig {
        if let Some(v) = self.threshold_policy {
            cfg.threshold_policy = v;
        }
        if let Some(v) = self.rise_low {
            cfg.rise_low = v;
        }
        if let Some(v) = self.rise_high {
            cfg.rise_high = v;
        }
        if let Some(v) = self.tail_fraction {
            cfg.tail_fraction = v;
        }
        if let Some(v) = self.settling_tolerance {
            cfg.settling_tolerance = v;
        }
        if let Some(v) = self.settling_policy {
            cfg.settling_policy = v;
        }
        if let Some(v) = self.damping_method {
            cfg.damping_method = v;
        }
        if let Some(v) = self.peak_policy {
            cfg.peak_policy = v;
        }
        cfg
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Trim, de-offset and re-zero a raw step-response CSV
    Preprocess {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Drop samples after this time (seconds)
        #[arg(long, default_value_t = 4.0)]
        max_time: f64,
        /// Keep every sample regardless of time
        #[arg(long, conflicts_with = "max_time")]
        no_max_time: bool,
        /// Offset removed from every value: first-sample | none | <number>
        #[arg(long, default_value = "first-sample")]
        offset: OffsetMode,
    },
    /// Write a synthetic second-order step response as CSV
    Simulate {
        /// Undamped natural frequency (rad/s)
        #[arg(long)]
        wn: f64,
        #[arg(long)]
        zeta: f64,
        #[arg(long, default_value_t = 1.0)]
        gain: f64,
        #[arg(long, default_value_t = 0.01)]
        dt: f64,
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
        /// Half-width of uniform measurement noise
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Output file; stdout when absent
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Transient metrics and poles of one response (CSV file, or `time value` text)
    Analyze {
        #[arg(long)]
        input: Option<PathBuf>,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Analyze several labeled responses and write the metrics table
    Compare {
        /// TOML manifest listing the series
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// LABEL=PATH, where PATH is a CSV file or a directory holding one
        #[arg(long = "series", value_parser = parse_labeled_path)]
        series: Vec<(String, PathBuf)>,
        /// Metrics table to write
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = 3)]
        decimals: u32,
        /// Render the response overlay to a PNG
        #[arg(long)]
        plot: Option<PathBuf>,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Pole pairs from one or more metrics tables
    Poles {
        #[arg(long, required = true, num_args = 1..)]
        table: Vec<PathBuf>,
        #[arg(long, default_value = "poles_output.csv")]
        out: PathBuf,
        /// Round written values; full precision when absent
        #[arg(long)]
        decimals: Option<u32>,
        /// Render the limited root locus to a PNG
        #[arg(long)]
        plot: Option<PathBuf>,
    },
    /// Per-metric density histograms of a metrics table
    Distribution {
        #[arg(long)]
        table: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 10)]
        bins: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();
    match cli.command {
        Commands::Preprocess {
            input,
            out,
            max_time,
            no_max_time,
            offset,
        } => {
            let cfg = ConditionConfig {
                max_time: (!no_max_time).then_some(max_time),
                offset,
            };
            cmd_preprocess(&input, &out, &cfg)?
        }
        Commands::Simulate {
            wn,
            zeta,
            gain,
            dt,
            duration,
            noise,
            seed,
            out,
        } => {
            let spec = SecondOrderSpec {
                natural_frequency: wn,
                damping_ratio: zeta,
                gain,
                dt,
                duration,
                noise,
                seed,
            };
            cmd_simulate(&spec, out.as_deref())?
        }
        Commands::Analyze { input, analysis } => cmd_analyze(input.as_deref(), &analysis)?,
        Commands::Compare {
            manifest,
            series,
            out,
            decimals,
            plot,
            analysis,
        } => cmd_compare(
            manifest.as_deref(),
            series,
            out.as_deref(),
            decimals,
            plot.as_deref(),
            &analysis,
        )?,
        Commands::Poles {
            table,
            out,
            decimals,
            plot,
        } => cmd_poles(&table, &out, decimals, plot.as_deref())?,
        Commands::Distribution { table, out, bins } => cmd_distribution(&table, &out, bins)?,
    }
    Ok(())
}

fn parse_labeled_path(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((label, path)) if !label.trim().is_empty() && !path.trim().is_empty() => {
            Ok((label.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("expected LABEL=PATH, got '{}'", raw)),
    }
}

/// CSV files by extension, `time value` text otherwise; stdin is text.
fn read_series(input: Option<&Path>) -> Result<SampleSeries> {
    match input {
        Some(path)
            if path
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("csv")) =>
        {
            csv_io::read_step_csv(path)
        }
        Some(path) => text_io::read_sample_pairs(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_sample_pairs(&buf)
        }
    }
}

fn cmd_preprocess(input: &Path, out: &Path, cfg: &ConditionConfig) -> Result<()> {
    let raw = csv_io::read_step_csv(input)?;
    let processed = condition(&raw, cfg)?;
    if processed.is_empty() {
        warn!("{}: no samples left after conditioning", input.display());
    }
    csv_io::write_step_csv(out, &processed)?;
    info!("processed data saved to {}", out.display());
    let js = json!({
        "input_samples": raw.len(),
        "output_samples": processed.len(),
        "out": out.display().to_string(),
    });
    println!("{}", js);
    Ok(())
}

fn cmd_simulate(spec: &SecondOrderSpec, out: Option<&Path>) -> Result<()> {
    let series = second_order_step(spec)?;
    match out {
        Some(path) => csv_io::write_step_csv(path, &series),
        None => csv_io::write_step_to(io::stdout().lock(), &series),
    }
}

fn cmd_analyze(input: Option<&Path>, analysis: &AnalysisArgs) -> Result<()> {
    let series = read_series(input)?;
    let cfg = analysis.apply(TransientConfig::default());
    let metrics = analyze(&series, &cfg)?;
    let js = json!({
        "metrics": metrics,
        "poles": PolePair::from_metrics(&metrics),
    });
    println!("{}", js);
    Ok(())
}

fn cmd_compare(
    manifest: Option<&Path>,
    series: Vec<(String, PathBuf)>,
    out: Option<&Path>,
    decimals: u32,
    plot: Option<&Path>,
    analysis: &AnalysisArgs,
) -> Result<()> {
    let manifest = match (manifest, series.is_empty()) {
        (Some(path), true) => read_manifest(path)?,
        (None, false) => ComparisonManifest {
            name: "command line".into(),
            data_file: DEFAULT_DATA_FILE.into(),
            analysis: TransientConfig::default(),
            series: series
                .into_iter()
                .map(|(label, path)| SeriesEntry { label, path })
                .collect(),
            base_dir: PathBuf::new(),
        },
        (Some(_), false) => bail!("use either --manifest or --series, not both"),
        (None, true) => bail!("nothing to compare: pass --manifest or at least one --series"),
    };
    let cfg = analysis.apply(manifest.analysis);

    let loaded = load_labeled(&manifest.resolved_entries())?;
    if loaded.is_empty() {
        bail!("none of the listed series could be found");
    }
    let results = analyze_batch(&loaded, &cfg);

    let report: Vec<serde_json::Value> = results
        .iter()
        .map(|item| match &item.result {
            Ok(metrics) => json!({ "label": item.label, "metrics": metrics }),
            Err(err) => json!({ "label": item.label, "error": err.to_string() }),
        })
        .collect();
    println!("{}", serde_json::to_string(&report)?);

    if let Some(path) = out {
        let rows: Vec<MetricsRow> = results
            .iter()
            .filter_map(|item| {
                item.metrics().map(|metrics| MetricsRow {
                    system: item.label.clone(),
                    metrics: *metrics,
                })
            })
            .collect();
        table::save_metrics_table(path, &rows, Some(decimals))?;
        info!("wrote {} row(s) to {}", rows.len(), path.display());
    }
    if let Some(path) = plot {
        PngBackend::new(path, (1000, 600)).draw(&figure_from_responses(&loaded, 2000))?;
    }
    Ok(())
}

fn cmd_poles(tables: &[PathBuf], out: &Path, decimals: Option<u32>, plot: Option<&Path>) -> Result<()> {
    let mut rows = Vec::new();
    for path in tables {
        if !path.exists() {
            warn!("metrics table {} not found, skipping", path.display());
            continue;
        }
        let source = path.display().to_string();
        for row in table::read_metrics_table(path)? {
            let row = PoleRow::from_metrics_row(source.clone(), row);
            if row.poles.is_none() {
                warn!("{} / {}: poles undefined", row.source, row.system);
            }
            rows.push(row);
        }
    }
    if rows.is_empty() {
        bail!("no metrics rows found in {} table(s)", tables.len());
    }
    table::save_pole_table(out, &rows, decimals)?;
    println!("{}", serde_json::to_string(&rows)?);

    if let Some(path) = plot {
        let poles: Vec<(String, PolePair)> = rows
            .iter()
            .filter_map(|row| row.poles.map(|p| (row.source.clone(), p)))
            .collect();
        PngBackend::new(path, (1000, 600)).draw(&figure_from_poles(&poles))?;
    }
    Ok(())
}

fn cmd_distribution(table_path: &Path, out: &Path, bins: usize) -> Result<()> {
    if bins == 0 {
        bail!("--bins must be at least 1");
    }
    let rows = table::read_metrics_table(table_path)?;
    let records: Vec<_> = rows.iter().map(|row| row.metrics).collect();
    let figures: Vec<Figure> = MetricColumn::ALL
        .into_iter()
        .filter_map(|column| {
            let hist = column_histogram(&records, column, bins);
            if hist.is_empty() {
                warn!("{}: no finite values, skipping", column.header());
                return None;
            }
            Some(figure_from_histogram(column.header(), &hist))
        })
        .collect();
    if figures.is_empty() {
        bail!("{} has no finite metric values", table_path.display());
    }
    draw_grid(out, &figures, 2)
}

struct PngBackend {
    path: PathBuf,
    size: (u32, u32),
}

impl PngBackend {
    fn new(path: &Path, size: (u32, u32)) -> Self {
        Self {
            path: path.to_path_buf(),
            size,
        }
    }
}

impl PlotBackend for PngBackend {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        let root = BitMapBackend::new(&self.path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        draw_plotters_figure(&root, fig)?;
        root.present()
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

fn draw_grid(path: &Path, figs: &[Figure], cols: usize) -> Result<()> {
    let rows = (figs.len() + cols - 1) / cols;
    let root = BitMapBackend::new(path, (600 * cols as u32, 360 * rows as u32)).into_drawing_area();
    root.fill(&WHITE)?;
    for (area, fig) in root.split_evenly((rows, cols)).iter().zip(figs) {
        draw_plotters_figure(area, fig)?;
    }
    root.present()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn rgb(color: steplab_lib::plot::Color) -> RGBColor {
    let (r, g, b) = color.rgb();
    RGBColor(r, g, b)
}

fn draw_plotters_figure(area: &DrawingArea<BitMapBackend<'_>, Shift>, fig: &Figure) -> Result<()> {
    let (x_min, x_max, y_min, y_max) = fig
        .bounds()
        .ok_or_else(|| anyhow!("nothing to plot in {:?}", fig.title))?;
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;

    if fig.origin_axes {
        chart.draw_series(LineSeries::new([(x_min, 0.0), (x_max, 0.0)], &BLACK))?;
        chart.draw_series(LineSeries::new([(0.0, y_min), (0.0, y_max)], &BLACK))?;
    }

    let mut legend = false;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let color = rgb(line.style.color);
                chart
                    .draw_series(LineSeries::new(
                        line.points.iter().map(|p| (p[0], p[1])),
                        color.stroke_width(line.style.width.round().max(1.0) as u32),
                    ))?
                    .label(line.name.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
                legend = true;
            }
            Series::Scatter(scatter) => {
                let color = rgb(scatter.color);
                let radius = scatter.radius;
                chart
                    .draw_series(
                        scatter
                            .points
                            .iter()
                            .filter(|p| p[0].is_finite() && p[1].is_finite())
                            .map(|p| Circle::new((p[0], p[1]), radius, color.filled())),
                    )?
                    .label(scatter.name.as_str())
                    .legend(move |(x, y)| Circle::new((x, y), radius, color.filled()));
                legend = true;
            }
            Series::Bars(bars) => {
                let color = rgb(bars.color);
                chart.draw_series(
                    bars.bars
                        .iter()
                        .map(|b| Rectangle::new([(b[0], 0.0), (b[1], b[2])], color.filled())),
                )?;
            }
        }
    }
    if legend {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}
