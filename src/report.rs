//! CSV persistence of counter readings at a fixed frame cadence.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::{CountError, Result};
use crate::pipeline::{CountMode, FrameReport, Reading};

/// Column layout of the CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Presence,
    Crossing,
}

impl ReportKind {
    pub fn for_mode(mode: &CountMode) -> Self {
        match mode {
            CountMode::Presence(_) => ReportKind::Presence,
            CountMode::Crossing(_) => ReportKind::Crossing,
        }
    }

    fn header(&self) -> &'static [&'static str] {
        match self {
            ReportKind::Presence => &["timestamp", "vehicles_in_roi"],
            ReportKind::Crossing => &["timestamp", "in_count", "out_count"],
        }
    }
}

/// Frames between rows for a given frame rate: one row per second of video.
/// Falls back to every frame when the rate is unknown or below 1.
pub fn cadence_for_fps(fps: f64) -> u64 {
    let frames = fps.round();
    if frames.is_finite() && frames >= 1.0 {
        frames as u64
    } else {
        1
    }
}

pub struct CountWriter<W: Write> {
    writer: csv::Writer<W>,
    cadence: u64,
    rows: u64,
}

impl CountWriter<File> {
    /// Create (or truncate) `path`, making parent directories as needed.
    pub fn create(path: impl AsRef<Path>, kind: ReportKind, cadence: u64) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Self::new(File::create(path)?, kind, cadence)
    }
}

impl<W: Write> CountWriter<W> {
    pub fn new(inner: W, kind: ReportKind, cadence: u64) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(kind.header())?;
        Ok(Self {
            writer,
            cadence: cadence.max(1),
            rows: 0,
        })
    }

    /// Data rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Write a row stamped with the current local time if `report` falls on
    /// the cadence. Returns whether a row was written.
    pub fn record(&mut self, report: &FrameReport) -> Result<bool> {
        self.record_at(report, Local::now())
    }

    pub fn record_at(&mut self, report: &FrameReport, timestamp: DateTime<Local>) -> Result<bool> {
        if report.frame_index % self.cadence != 0 {
            return Ok(false);
        }
        let ts = timestamp.to_rfc3339();
        match report.reading {
            Reading::Present(count) => self.writer.write_record([ts, count.to_string()])?,
            Reading::Crossed(totals) => self.writer.write_record([
                ts,
                totals.in_count.to_string(),
                totals.out_count.to_string(),
            ])?,
        }
        self.rows += 1;
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| CountError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crossing::Totals;
    use chrono::TimeZone;

    fn report(frame_index: u64, reading: Reading) -> FrameReport {
        FrameReport {
            frame_index,
            reading,
            accepted: 0,
            rejected: 0,
        }
    }

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_cadence_for_fps() {
        assert_eq!(cadence_for_fps(29.97), 30);
        assert_eq!(cadence_for_fps(25.0), 25);
        assert_eq!(cadence_for_fps(0.0), 1);
        assert_eq!(cadence_for_fps(f64::NAN), 1);
    }

    #[test]
    fn test_presence_rows_on_cadence() {
        let mut w = CountWriter::new(Vec::new(), ReportKind::Presence, 3).unwrap();
        for i in 0..7 {
            w.record_at(&report(i, Reading::Present(i as usize)), noon()).unwrap();
        }
        assert_eq!(w.rows(), 3);

        let text = String::from_utf8(w.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,vehicles_in_roi");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("2024-05-01T12:00:00"));
        assert!(lines[1].ends_with(",0"));
        assert!(lines[2].ends_with(",3"));
        assert!(lines[3].ends_with(",6"));
    }

    #[test]
    fn test_crossing_columns() {
        let mut w = CountWriter::new(Vec::new(), ReportKind::Crossing, 1).unwrap();
        let totals = Totals {
            in_count: 4,
            out_count: 2,
        };
        assert!(w.record_at(&report(0, Reading::Crossed(totals)), noon()).unwrap());

        let text = String::from_utf8(w.finish().unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("timestamp,in_count,out_count"));
        assert!(lines.next().unwrap().ends_with(",4,2"));
    }
}
