use serde::{Deserialize, Serialize};

use crate::geometry::BBox;

/// Track id the tracker emits for boxes it has not associated yet.
pub const UNASSIGNED_TRACK_ID: i64 = -1;

/// A single tracked box handed over by the detector/tracker for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub track_id: i64,
    pub bbox: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Detection {
    pub fn new(track_id: i64, bbox: BBox, confidence: Option<f32>) -> Self {
        Self {
            track_id,
            bbox,
            confidence,
        }
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }

    pub fn is_assigned(&self) -> bool {
        self.track_id != UNASSIGNED_TRACK_ID
    }
}
