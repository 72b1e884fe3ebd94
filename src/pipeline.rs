//! Per-frame orchestration of the deduplicator and the active counter.

use tracing::{debug, info};

use crate::config::CounterConfig;
use crate::crossing::{CrossingCounter, Totals};
use crate::dedup::FrameDeduplicator;
use crate::detection::Detection;
use crate::error::Result;
use crate::geometry::{CrossingLine, Roi};
use crate::presence::PresenceCounter;
use crate::source::DetectionSource;

/// Which counter the pipeline drives.
#[derive(Debug, Clone)]
pub enum CountMode {
    Presence(PresenceCounter),
    Crossing(CrossingCounter),
}

/// Counter output after a processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    Present(usize),
    Crossed(Totals),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Zero-based index of the frame in the input stream, skipped frames included.
    pub frame_index: u64,
    pub reading: Reading,
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone)]
pub struct FramePipeline {
    dedup: FrameDeduplicator,
    mode: CountMode,
    skip: u64,
    frames_seen: u64,
}

impl FramePipeline {
    pub fn new(dedup: FrameDeduplicator, mode: CountMode) -> Self {
        Self {
            dedup,
            mode,
            skip: 1,
            frames_seen: 0,
        }
    }

    /// Presence counting over `roi` with thresholds from `config`.
    pub fn presence(roi: Roi, config: &CounterConfig) -> Self {
        let counter = PresenceCounter::new(roi, config.hysteresis());
        Self::new(FrameDeduplicator::new(config.dedup()), CountMode::Presence(counter))
            .with_skip(config.skip)
    }

    /// Line-crossing counting inside `roi`.
    pub fn crossing(roi: Roi, line: CrossingLine, config: &CounterConfig) -> Self {
        let counter = CrossingCounter::new(roi, line).with_memory_ttl(config.memory_ttl);
        Self::new(FrameDeduplicator::new(config.dedup()), CountMode::Crossing(counter))
            .with_skip(config.skip)
    }

    /// Only every `skip`-th frame reaches the counter. Zero is treated as one.
    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = u64::from(skip.max(1));
        self
    }

    pub fn mode(&self) -> &CountMode {
        &self.mode
    }

    /// Frames consumed so far, skipped ones included.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn reading(&self) -> Reading {
        match &self.mode {
            CountMode::Presence(c) => Reading::Present(c.current_count()),
            CountMode::Crossing(c) => Reading::Crossed(c.totals()),
        }
    }

    /// Run one frame through the pipeline. Skipped frames return `None`.
    pub fn process(&mut self, detections: &[Detection]) -> Option<FrameReport> {
        let frame_index = self.frames_seen;
        self.frames_seen += 1;
        if frame_index % self.skip != 0 {
            return None;
        }

        let (accepted, rejected) = match &mut self.mode {
            CountMode::Presence(counter) => {
                let filtered = self.dedup.partition(detections);
                counter.start_frame();
                for det in &filtered.accepted {
                    counter.update(det.track_id, &det.bbox);
                }
                counter.finalize_frame();
                (filtered.accepted.len(), filtered.rejected.len())
            }
            CountMode::Crossing(counter) => {
                // Crossing reacts to raw tracker output; only unassigned ids are dropped.
                let mut accepted = 0;
                for det in detections.iter().filter(|d| d.is_assigned()) {
                    counter.update(det.track_id, &det.bbox);
                    accepted += 1;
                }
                counter.end_frame();
                (accepted, detections.len() - accepted)
            }
        };

        let report = FrameReport {
            frame_index,
            reading: self.reading(),
            accepted,
            rejected,
        };
        debug!(
            frame = frame_index,
            accepted,
            rejected,
            reading = ?report.reading,
            "frame processed"
        );
        Some(report)
    }

    /// Drain `source`, calling `on_frame` after every processed frame.
    /// Returns the number of frames consumed.
    pub fn run<S, F>(&mut self, source: &mut S, mut on_frame: F) -> Result<u64>
    where
        S: DetectionSource + ?Sized,
        F: FnMut(&FrameReport) -> Result<()>,
    {
        let start = self.frames_seen;
        while let Some(detections) = source.next_frame()? {
            if let Some(report) = self.process(&detections) {
                on_frame(&report)?;
            }
        }
        let consumed = self.frames_seen - start;
        info!(frames = consumed, reading = ?self.reading(), "source exhausted");
        Ok(consumed)
    }

    /// Reset counter state and the frame clock.
    pub fn clear(&mut self) {
        match &mut self.mode {
            CountMode::Presence(c) => c.clear(),
            CountMode::Crossing(c) => c.clear(),
        }
        self.frames_seen = 0;
    }
}
