use anyhow::{Context, Result};
use clap::Parser;
use nalgebra::Point2;
use std::path::PathBuf;

use roicount::RoiConfig;

/// Validate an ROI file and optionally probe points against it.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// ROI JSON file
    #[arg(long)]
    roi: PathBuf,

    /// Point to test, as X Y (repeatable)
    #[arg(long, num_args = 2, value_names = ["X", "Y"])]
    point: Vec<f32>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = RoiConfig::from_file(&args.roi)
        .with_context(|| format!("Failed to load ROI {:?}", args.roi))?;
    let roi = cfg.polygon().context("Invalid ROI polygon")?;
    let line = cfg.crossing_line().context("Invalid crossing line")?;

    let (min_x, min_y, max_x, max_y) = roi.points().iter().fold(
        (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
        |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
    );
    println!("ROI OK: {} vertices, area {:.1} px²", roi.points().len(), roi.area());
    println!("  bounds: [{:.1}, {:.1}] - [{:.1}, {:.1}]", min_x, min_y, max_x, max_y);
    if let Some(line) = &line {
        println!(
            "  line: ({:.1}, {:.1}) -> ({:.1}, {:.1})",
            line.start.x, line.start.y, line.end.x, line.end.y
        );
    }

    for xy in args.point.chunks_exact(2) {
        let p = Point2::new(xy[0], xy[1]);
        let side = line
            .as_ref()
            .map(|l| format!(", side={}", l.side(&p)))
            .unwrap_or_default();
        println!("  ({:.1}, {:.1}): inside={}{}", p.x, p.y, roi.contains(&p), side);
    }

    Ok(())
}
