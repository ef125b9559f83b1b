// src/pipeline/frame_context.rs
//
// Everything the detector produced for one frame. Rendering and reporting
// read from here so every overlay reflects the same detection pass.

use crate::analysis::VehicleSnapshot;
use crate::heatmap::Heatmap;
use crate::types::BBox;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct FrameContext {
    pub frame_id: u64,
    pub timestamp_ms: f64,
    /// Every search window
    pub windows: Vec<BBox>,
    /// Windows the classifier marked as vehicle
    pub hot_windows: Vec<BBox>,
    /// Thresholded, clipped heat
    pub heatmap: Heatmap,
    /// Bounding boxes of heatmap components, before filtering
    pub label_boxes: Vec<BBox>,
    /// Label boxes that passed the outlier filter
    pub filtered_boxes: Vec<BBox>,
    /// Confirmed vehicles after this frame's tracker update
    pub vehicles: Vec<VehicleSnapshot>,
}

impl FrameContext {
    pub fn report(&self) -> FrameReport<'_> {
        FrameReport {
            frame: self.frame_id,
            timestamp_ms: self.timestamp_ms,
            hot_windows: self.hot_windows.len(),
            vehicles: &self.vehicles,
        }
    }
}

/// One JSON line of the per-video vehicle report
#[derive(Debug, Serialize)]
pub struct FrameReport<'a> {
    pub frame: u64,
    pub timestamp_ms: f64,
    pub hot_windows: usize,
    pub vehicles: &'a [VehicleSnapshot],
}
