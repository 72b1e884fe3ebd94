//! Presence counting with hit/miss hysteresis.
//!
//! A track is admitted to the count after `min_hits` observations with its
//! centroid inside the ROI and evicted once it accumulates more than
//! `max_miss` consecutive misses. A miss is either an observation outside
//! the ROI or a frame in which the tracker did not report the id at all.
//! Only counted tracks accumulate misses.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::error::Result;
use crate::geometry::{BBox, Roi};

/// Debounce thresholds for [`PresenceCounter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HysteresisConfig {
    /// Inside observations required before an id is counted.
    pub min_hits: u32,
    /// Consecutive misses tolerated before a counted id is evicted.
    pub max_miss: u32,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            min_hits: 3,
            max_miss: 7,
        }
    }
}

/// Per-id bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackState {
    pub hit_count: u32,
    pub miss_count: u32,
    pub counted: bool,
}

/// Result of applying one observation to a [`TrackState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Admitted,
    Evicted,
}

impl TrackState {
    /// Centroid seen inside the ROI: one more hit, miss streak broken.
    pub fn observe_inside(&mut self, config: &HysteresisConfig) -> Transition {
        self.hit_count = self.hit_count.saturating_add(1);
        self.miss_count = 0;
        if !self.counted && self.hit_count >= config.min_hits {
            self.counted = true;
            return Transition::Admitted;
        }
        Transition::Unchanged
    }

    /// Outside observation or tracker silence. No-op for uncounted ids.
    pub fn record_miss(&mut self, config: &HysteresisConfig) -> Transition {
        if !self.counted {
            return Transition::Unchanged;
        }
        self.miss_count = self.miss_count.saturating_add(1);
        if self.miss_count > config.max_miss {
            return Transition::Evicted;
        }
        Transition::Unchanged
    }
}

/// Counts the tracks currently present inside one ROI.
///
/// Driven once per frame:
///
/// ```
/// use roicount::geometry::{BBox, Roi};
/// use roicount::presence::{HysteresisConfig, PresenceCounter};
///
/// let roi = Roi::from_pairs(&[[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]]).unwrap();
/// let mut counter = PresenceCounter::new(roi, HysteresisConfig { min_hits: 1, max_miss: 0 });
///
/// counter.start_frame();
/// counter.update(7, &BBox::new(10.0, 10.0, 30.0, 30.0));
/// counter.finalize_frame();
/// assert_eq!(counter.current_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct PresenceCounter {
    roi: Roi,
    config: HysteresisConfig,
    tracks: HashMap<i64, TrackState>,
    seen_this_frame: HashSet<i64>,
}

impl PresenceCounter {
    pub fn new(roi: Roi, config: HysteresisConfig) -> Self {
        Self {
            roi,
            config,
            tracks: HashMap::new(),
            seen_this_frame: HashSet::new(),
        }
    }

    /// Validate raw polygon points and build a counter over them.
    pub fn from_points(points: &[[f32; 2]], config: HysteresisConfig) -> Result<Self> {
        Ok(Self::new(Roi::from_pairs(points)?, config))
    }

    pub fn roi(&self) -> &Roi {
        &self.roi
    }

    pub fn config(&self) -> &HysteresisConfig {
        &self.config
    }

    /// Open a new frame. Call once before the frame's `update` calls.
    pub fn start_frame(&mut self) {
        self.seen_this_frame.clear();
    }

    /// Record one post-dedup observation of `track_id` this frame.
    pub fn update(&mut self, track_id: i64, bbox: &BBox) {
        self.seen_this_frame.insert(track_id);

        let centroid = bbox.centroid();
        if self.roi.contains(&centroid) {
            let state = self.tracks.entry(track_id).or_default();
            trace!(track_id, hits = state.hit_count + 1, "inside ROI");
            if state.observe_inside(&self.config) == Transition::Admitted {
                debug!(track_id, hits = state.hit_count, "track counted");
            }
        } else {
            self.miss(track_id);
        }
    }

    /// Close the frame: counted ids the tracker did not report take a miss.
    pub fn finalize_frame(&mut self) {
        let silent: Vec<i64> = self
            .tracks
            .iter()
            .filter(|(id, state)| state.counted && !self.seen_this_frame.contains(*id))
            .map(|(id, _)| *id)
            .collect();

        for id in silent {
            self.miss(id);
        }
    }

    fn miss(&mut self, track_id: i64) {
        let transition = match self.tracks.get_mut(&track_id) {
            Some(state) => state.record_miss(&self.config),
            None => Transition::Unchanged,
        };
        if transition == Transition::Evicted {
            self.evict(track_id);
        }
    }

    /// Drop every trace of `track_id`. Unknown ids are ignored.
    fn evict(&mut self, track_id: i64) {
        if let Some(state) = self.tracks.remove(&track_id) {
            debug!(track_id, misses = state.miss_count, "track evicted");
        }
    }

    /// Number of tracks currently counted as present.
    pub fn current_count(&self) -> usize {
        self.tracks.values().filter(|s| s.counted).count()
    }

    /// Snapshot of the counted ids.
    pub fn ids_inside(&self) -> HashSet<i64> {
        self.tracks
            .iter()
            .filter(|(_, s)| s.counted)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_counted(&self, track_id: i64) -> bool {
        self.tracks.get(&track_id).map_or(false, |s| s.counted)
    }

    pub fn track_state(&self, track_id: i64) -> Option<TrackState> {
        self.tracks.get(&track_id).copied()
    }

    /// Forget everything, e.g. before processing another video.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.seen_this_frame.clear();
    }
}
