pub mod config;
pub mod crossing;
pub mod dedup;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod presence;
pub mod report;
pub mod source;

// Re-export main types
pub use crate::config::{CounterConfig, RoiConfig};
pub use crate::crossing::{CrossingCounter, Direction, Totals};
pub use crate::dedup::{FrameDeduplicator, Rejection};
pub use crate::detection::{Detection, UNASSIGNED_TRACK_ID};
pub use crate::error::{CountError, Result};
pub use crate::geometry::{BBox, CrossingLine, Roi};
pub use crate::pipeline::{CountMode, FramePipeline, FrameReport, Reading};
pub use crate::presence::PresenceCounter;
pub use crate::source::{DetectionSource, JsonLinesSource};
