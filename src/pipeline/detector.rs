// src/pipeline/detector.rs
//
// Per-frame orchestration:
//
//   windows → search → heatmap (add, threshold, clip) → labels
//           → outlier filter → tracker → FrameContext

use super::{FrameContext, PipelineMetrics};
use crate::analysis::{remove_outliers, BoxTracker};
use crate::classifier::WindowClassifier;
use crate::heatmap::Heatmap;
use crate::sliding_window::{build_windows, SlidingWindowSearch};
use crate::types::{BBox, Config, Frame};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub struct VehicleDetector {
    config: Config,
    search: SlidingWindowSearch,
    tracker: BoxTracker,
    metrics: PipelineMetrics,
    /// Window grid for the last seen frame size
    windows: Option<((usize, usize), Vec<BBox>)>,
    frame_id: u64,
}

impl VehicleDetector {
    pub fn new(config: Config, classifier: Arc<dyn WindowClassifier>) -> Self {
        let search = SlidingWindowSearch::new(classifier, config.search.parallel_jobs);
        let tracker = BoxTracker::new(config.tracker.clone());
        info!(
            "✓ Vehicle detector ready (classifier={}, regions={}, jobs={})",
            search.classifier_name(),
            config.search.regions.len(),
            config.search.parallel_jobs
        );
        Self {
            config,
            search,
            tracker,
            metrics: PipelineMetrics::new(),
            windows: None,
            frame_id: 0,
        }
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn tracker(&self) -> &BoxTracker {
        &self.tracker
    }

    /// Start a new video: drop tracked vehicles and counters
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.metrics = PipelineMetrics::new();
        self.frame_id = 0;
    }

    fn windows_for(&mut self, width: usize, height: usize) -> Vec<BBox> {
        if let Some((size, windows)) = &self.windows {
            if *size == (width, height) {
                return windows.clone();
            }
        }

        let windows = build_windows(width as i32, height as i32, &self.config.search.regions);
        info!(
            "Window grid for {}x{}: {} windows",
            width,
            height,
            windows.len()
        );
        self.windows = Some(((width, height), windows.clone()));
        windows
    }

    pub async fn process_frame(&mut self, frame: Arc<Frame>) -> Result<FrameContext> {
        self.frame_id += 1;
        let frame_id = self.frame_id;
        let windows = self.windows_for(frame.width, frame.height);

        // ── Sliding-window search ──
        let t0 = Instant::now();
        let hot_windows = self.search.search(Arc::clone(&frame), &windows).await?;
        self.metrics
            .add_timing(&self.metrics.search_time_us, t0.elapsed().as_micros() as u64);

        // ── Heatmap + labels ──
        let t1 = Instant::now();
        let mut heatmap = Heatmap::new(frame.width, frame.height);
        heatmap.add_heat(&hot_windows);
        heatmap.apply_threshold(self.config.heatmap.threshold);
        heatmap.clip(self.config.heatmap.clip_max);
        let label_boxes = heatmap.label().bounding_boxes();
        self.metrics
            .add_timing(&self.metrics.heatmap_time_us, t1.elapsed().as_micros() as u64);

        // ── Filter + track ──
        let t2 = Instant::now();
        let filtered_boxes = remove_outliers(label_boxes.clone(), &self.config.filter);
        self.tracker.update(&filtered_boxes);
        let vehicles = self.tracker.snapshot();
        self.metrics
            .add_timing(&self.metrics.tracking_time_us, t2.elapsed().as_micros() as u64);

        let m = &self.metrics;
        m.inc(&m.total_frames);
        m.add(&m.windows_searched, windows.len() as u64);
        m.add(&m.hot_windows, hot_windows.len() as u64);
        m.add(&m.label_boxes, label_boxes.len() as u64);
        m.add(&m.filtered_boxes, filtered_boxes.len() as u64);
        m.add(&m.vehicles_drawn, vehicles.len() as u64);
        if !vehicles.is_empty() {
            m.inc(&m.frames_with_vehicles);
        }

        debug!(
            "Frame {}: {} hot / {} windows, {} labels, {} kept, {} vehicles",
            frame_id,
            hot_windows.len(),
            windows.len(),
            label_boxes.len(),
            filtered_boxes.len(),
            vehicles.len()
        );

        Ok(FrameContext {
            frame_id,
            timestamp_ms: frame.timestamp_ms,
            windows,
            hot_windows,
            heatmap,
            label_boxes,
            filtered_boxes,
            vehicles,
        })
    }
}
