//! Where per-frame detections come from.
//!
//! The counting core never runs a detector itself; the host injects any
//! [`DetectionSource`]. [`JsonLinesSource`] replays tracker output dumped as
//! one JSON object per frame:
//!
//! ```text
//! {"detections": [{"track_id": 3, "bbox": [12, 40, 80, 120], "confidence": 0.91}]}
//! {"detections": []}
//! ```

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use serde::Deserialize;

use crate::detection::Detection;
use crate::error::{CountError, Result};

pub trait DetectionSource {
    /// Detections of the next frame, `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Vec<Detection>>>;
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    #[serde(default)]
    detections: Vec<Detection>,
}

pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> DetectionSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<Vec<Detection>>> {
        for line in self.lines.by_ref() {
            let line = line?;
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let record: FrameRecord =
                serde_json::from_str(&line).map_err(|source| CountError::MalformedFrame {
                    line: self.line_no,
                    source,
                })?;
            return Ok(Some(record.detections));
        }
        Ok(None)
    }
}

/// In-memory frames, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    frames: VecDeque<Vec<Detection>>,
}

impl From<Vec<Vec<Detection>>> for MemorySource {
    fn from(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl DetectionSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<Vec<Detection>>> {
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_replay_frames_in_order() {
        let data = concat!(
            r#"{"detections": [{"track_id": 1, "bbox": [0, 0, 10, 10], "confidence": 0.8}]}"#,
            "\n\n",
            r#"{"detections": []}"#,
            "\n",
            r#"{}"#,
            "\n",
        );
        let mut src = JsonLinesSource::new(Cursor::new(data));

        let first = src.next_frame().unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].track_id, 1);
        assert!(src.next_frame().unwrap().unwrap().is_empty());
        assert!(src.next_frame().unwrap().unwrap().is_empty());
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let data = "{\"detections\": []}\n{\"detections\": [{\"track_id\": 1}]}\n";
        let mut src = JsonLinesSource::new(Cursor::new(data));

        src.next_frame().unwrap();
        match src.next_frame() {
            Err(CountError::MalformedFrame { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed frame, got {:?}", other),
        }
    }

    #[test]
    fn test_memory_source() {
        let mut src = MemorySource::from(vec![vec![], vec![]]);
        assert!(src.next_frame().unwrap().is_some());
        assert!(src.next_frame().unwrap().is_some());
        assert!(src.next_frame().unwrap().is_none());
    }
}
