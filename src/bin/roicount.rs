use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roicount::report::{cadence_for_fps, CountWriter, ReportKind};
use roicount::{CounterConfig, FramePipeline, JsonLinesSource, Reading, RoiConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Count tracks currently inside the ROI
    Presence,
    /// Count in/out crossings of the line inside the ROI
    Crossing,
}

#[derive(Parser)]
#[command(
    name = "roicount",
    about = "Stable object counting inside a region of interest from tracker output",
    version = "0.1.0"
)]
struct Args {
    /// Tracker output, one JSON object per frame
    #[arg(short, long)]
    detections: PathBuf,

    /// ROI JSON: {"roi": [[x, y], ...], "line": [[x1, y1], [x2, y2]]}
    #[arg(short, long)]
    roi: PathBuf,

    /// Optional threshold config JSON; CLI flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Mode::Presence)]
    mode: Mode,

    /// Minimum box area (px²)
    #[arg(long)]
    area_min: Option<f32>,

    /// Frames inside before a track is counted
    #[arg(long)]
    min_hits: Option<u32>,

    /// Frames missed before a counted track is dropped
    #[arg(long)]
    max_miss: Option<u32>,

    #[arg(long)]
    iou_threshold: Option<f32>,

    #[arg(long)]
    containment_threshold: Option<f32>,

    /// Crossing mode: frames before an idle track's side is forgotten
    #[arg(long)]
    memory_ttl: Option<u64>,

    /// Process one frame out of every N
    #[arg(long)]
    skip: Option<u32>,

    /// Source frame rate; one CSV row is written per second of video
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// CSV output path
    #[arg(short, long, default_value = "output/counts.csv")]
    output: PathBuf,

    /// Log every rejected box and state change
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn counter_config(&self) -> Result<CounterConfig> {
        let mut config = match &self.config {
            Some(path) => CounterConfig::from_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => CounterConfig::default(),
        };

        if let Some(v) = self.area_min {
            config.area_min = v;
        }
        if let Some(v) = self.min_hits {
            config.min_hits = v;
        }
        if let Some(v) = self.max_miss {
            config.max_miss = v;
        }
        if let Some(v) = self.iou_threshold {
            config.iou_reject_threshold = v;
        }
        if let Some(v) = self.containment_threshold {
            config.containment_reject_threshold = v;
        }
        if self.memory_ttl.is_some() {
            config.memory_ttl = self.memory_ttl;
        }
        if let Some(v) = self.skip {
            config.skip = v;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "roicount=debug" } else { "roicount=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.counter_config()?;
    let geometry = RoiConfig::from_file(&args.roi)
        .with_context(|| format!("Failed to load ROI {:?}", args.roi))?;
    let roi = geometry.polygon()?;

    let mut pipeline = match args.mode {
        Mode::Presence => FramePipeline::presence(roi, &config),
        Mode::Crossing => {
            let line = geometry
                .crossing_line()?
                .context("Crossing mode needs a \"line\" entry in the ROI file")?;
            FramePipeline::crossing(roi, line, &config)
        }
    };

    let mut source = JsonLinesSource::open(&args.detections)
        .with_context(|| format!("Failed to open detections {:?}", args.detections))?;
    let mut writer = CountWriter::create(
        &args.output,
        ReportKind::for_mode(pipeline.mode()),
        cadence_for_fps(args.fps),
    )
    .with_context(|| format!("Failed to create {:?}", args.output))?;

    info!(
        mode = ?args.mode,
        min_hits = config.min_hits,
        max_miss = config.max_miss,
        area_min = config.area_min,
        skip = config.skip,
        "processing {:?}",
        args.detections
    );

    let frames = pipeline.run(&mut source, |report| {
        writer.record(report)?;
        Ok(())
    })?;
    writer.flush()?;

    info!(frames, rows = writer.rows(), "CSV saved to {:?}", args.output);
    match pipeline.reading() {
        Reading::Present(n) => println!("Objects in ROI: {}", n),
        Reading::Crossed(t) => println!("In: {}  Out: {}", t.in_count, t.out_count),
    }
    Ok(())
}
