//! Directional line-crossing counter.
//!
//! Remembers, per track id, on which side of the crossing line its centroid
//! was last seen while inside the ROI, and bumps the in/out totals whenever
//! that side flips. Only the immediately preceding side matters and no
//! debounce is applied: a track jittering across the line is counted on
//! every flip.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::geometry::{BBox, CrossingLine, Roi};

/// Direction of a counted crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Moved onto the `side() == true` half-plane.
    In,
    Out,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub in_count: u64,
    pub out_count: u64,
}

#[derive(Debug, Clone, Copy)]
struct SideEntry {
    side: bool,
    last_seen: u64,
}

#[derive(Debug, Clone)]
pub struct CrossingCounter {
    roi: Roi,
    line: CrossingLine,
    /// Frames an id may go unobserved before its side is forgotten.
    /// `None` keeps every side forever.
    memory_ttl: Option<u64>,
    sides: HashMap<i64, SideEntry>,
    totals: Totals,
    frame: u64,
}

impl CrossingCounter {
    pub fn new(roi: Roi, line: CrossingLine) -> Self {
        Self {
            roi,
            line,
            memory_ttl: None,
            sides: HashMap::new(),
            totals: Totals::default(),
            frame: 0,
        }
    }

    pub fn with_memory_ttl(mut self, ttl: Option<u64>) -> Self {
        self.memory_ttl = ttl;
        self
    }

    pub fn roi(&self) -> &Roi {
        &self.roi
    }

    pub fn line(&self) -> &CrossingLine {
        &self.line
    }

    /// Feed one observation. Returns the crossing it completed, if any.
    pub fn update(&mut self, track_id: i64, bbox: &BBox) -> Option<Direction> {
        let centroid = bbox.centroid();
        if !self.roi.contains(&centroid) {
            return None;
        }

        let side_now = self.line.side(&centroid);
        let previous = self.sides.insert(
            track_id,
            SideEntry {
                side: side_now,
                last_seen: self.frame,
            },
        );

        match previous {
            Some(prev) if prev.side != side_now => {
                let direction = if side_now {
                    self.totals.in_count += 1;
                    Direction::In
                } else {
                    self.totals.out_count += 1;
                    Direction::Out
                };
                debug!(track_id, ?direction, "line crossed");
                Some(direction)
            }
            _ => None,
        }
    }

    /// Advance the frame clock and drop side memory past its TTL.
    pub fn end_frame(&mut self) {
        self.frame += 1;

        if let Some(ttl) = self.memory_ttl {
            let now = self.frame;
            let before = self.sides.len();
            self.sides
                .retain(|_, entry| now.saturating_sub(entry.last_seen + 1) <= ttl);
            let dropped = before - self.sides.len();
            if dropped > 0 {
                debug!(dropped, "forgot idle track sides");
            }
        }
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn in_count(&self) -> u64 {
        self.totals.in_count
    }

    pub fn out_count(&self) -> u64 {
        self.totals.out_count
    }

    /// Last known side of `track_id`, if remembered.
    pub fn side_of(&self, track_id: i64) -> Option<bool> {
        self.sides.get(&track_id).map(|e| e.side)
    }

    /// Number of ids with a remembered side.
    pub fn tracked_ids(&self) -> usize {
        self.sides.len()
    }

    pub fn clear(&mut self) {
        self.sides.clear();
        self.totals = Totals::default();
        self.frame = 0;
    }
}
