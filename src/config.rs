use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::dedup::DedupConfig;
use crate::error::{CountError, Result};
use crate::geometry::{CrossingLine, Roi};
use crate::presence::HysteresisConfig;

/// Tunable thresholds. Every field falls back to the reference value when
/// missing from the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Minimum detection area in px².
    pub area_min: f32,
    pub min_hits: u32,
    pub max_miss: u32,
    pub iou_reject_threshold: f32,
    pub containment_reject_threshold: f32,
    /// Crossing mode only: frames before an idle id's side is forgotten.
    pub memory_ttl: Option<u64>,
    /// Process one frame out of every `skip`.
    pub skip: u32,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            area_min: 400.0,
            min_hits: 3,
            max_miss: 7,
            iou_reject_threshold: 0.6,
            containment_reject_threshold: 0.8,
            memory_ttl: None,
            skip: 1,
        }
    }
}

impl CounterConfig {
    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let cfg: CounterConfig = serde_json::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.area_min.is_finite() || self.area_min < 0.0 {
            return Err(CountError::config(format!(
                "area_min must be a non-negative number, got {}",
                self.area_min
            )));
        }
        for (name, value) in [
            ("iou_reject_threshold", self.iou_reject_threshold),
            ("containment_reject_threshold", self.containment_reject_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CountError::config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.min_hits == 0 {
            return Err(CountError::config("min_hits must be at least 1"));
        }
        if self.skip == 0 {
            return Err(CountError::config("skip must be at least 1"));
        }
        Ok(())
    }

    pub fn dedup(&self) -> DedupConfig {
        DedupConfig {
            area_min: self.area_min,
            iou_reject_threshold: self.iou_reject_threshold,
            containment_reject_threshold: self.containment_reject_threshold,
        }
    }

    pub fn hysteresis(&self) -> HysteresisConfig {
        HysteresisConfig {
            min_hits: self.min_hits,
            max_miss: self.max_miss,
        }
    }
}

/// Geometry file: `{"roi": [[x, y], ...], "line": [[x1, y1], [x2, y2]]}`.
/// `line` is only needed in crossing mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiConfig {
    pub roi: Vec<[f32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<[[f32; 2]; 2]>,
}

impl RoiConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Validated polygon.
    pub fn polygon(&self) -> Result<Roi> {
        Roi::from_pairs(&self.roi)
    }

    /// Validated crossing line, `None` when the file has none.
    pub fn crossing_line(&self) -> Result<Option<CrossingLine>> {
        self.line.as_ref().map(CrossingLine::from_pairs).transpose()
    }
}
