//! Per-frame suppression of redundant detections.
//!
//! Detections are processed in tracker output order; the first box accepted
//! wins against every later box that duplicates it. No state survives the
//! frame.

use std::fmt;

use tracing::{debug, trace};

use crate::detection::Detection;
use crate::geometry::{inside_ratio, iou, BBox};

/// Thresholds for [`FrameDeduplicator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupConfig {
    /// Minimum accepted box area in px².
    pub area_min: f32,
    /// IoU above which a later box is a duplicate.
    pub iou_reject_threshold: f32,
    /// Containment ratio (either direction) above which a later box is a duplicate.
    pub containment_reject_threshold: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            area_min: 400.0,
            iou_reject_threshold: 0.6,
            containment_reject_threshold: 0.8,
        }
    }
}

/// Why a detection did not make it past the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Tracker has not assigned an id yet.
    Unassigned,
    /// Box area below `area_min`, or a degenerate box.
    TooSmall,
    /// IoU with an accepted box above the threshold.
    Overlapping,
    /// Nested inside an accepted box, or wrapping one.
    Nested,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unassigned => "unassigned",
            Self::TooSmall => "too_small",
            Self::Overlapping => "overlapping",
            Self::Nested => "nested",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of filtering one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameFilter {
    pub accepted: Vec<Detection>,
    pub rejected: Vec<(Detection, Rejection)>,
}

#[derive(Debug, Clone)]
pub struct FrameDeduplicator {
    config: DedupConfig,
}

impl FrameDeduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Check `candidate` against the boxes already accepted this frame.
    /// Reasons are tested in order: area, IoU, containment.
    pub fn check(&self, candidate: &BBox, accepted: &[BBox]) -> Option<Rejection> {
        if candidate.is_degenerate() || candidate.area() < self.config.area_min {
            return Some(Rejection::TooSmall);
        }

        if accepted
            .iter()
            .any(|prev| iou(candidate, prev) > self.config.iou_reject_threshold)
        {
            return Some(Rejection::Overlapping);
        }

        let limit = self.config.containment_reject_threshold;
        if accepted
            .iter()
            .any(|prev| inside_ratio(candidate, prev) > limit || inside_ratio(prev, candidate) > limit)
        {
            return Some(Rejection::Nested);
        }

        None
    }

    /// Split one frame's detections into accepted and rejected, keeping order.
    pub fn partition(&self, detections: &[Detection]) -> FrameFilter {
        let mut out = FrameFilter::default();
        let mut accepted_boxes: Vec<BBox> = Vec::with_capacity(detections.len());

        for det in detections {
            let verdict = if det.is_assigned() {
                self.check(&det.bbox, &accepted_boxes)
            } else {
                Some(Rejection::Unassigned)
            };

            match verdict {
                None => {
                    trace!(track_id = det.track_id, "detection accepted");
                    accepted_boxes.push(det.bbox);
                    out.accepted.push(det.clone());
                }
                Some(reason) => {
                    debug!(track_id = det.track_id, %reason, bbox = ?det.bbox, "detection rejected");
                    out.rejected.push((det.clone(), reason));
                }
            }
        }

        out
    }

    /// Accepted subset of one frame, in input order.
    pub fn filter(&self, detections: &[Detection]) -> Vec<Detection> {
        self.partition(detections).accepted
    }
}

impl Default for FrameDeduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}
