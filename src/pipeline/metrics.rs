// src/pipeline/metrics.rs
//
// Counts and stage timings for a detection run. Logged per video and
// written next to the annotated output.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub frames_with_vehicles: Arc<AtomicU64>,
    pub windows_searched: Arc<AtomicU64>,
    pub hot_windows: Arc<AtomicU64>,
    pub label_boxes: Arc<AtomicU64>,
    pub filtered_boxes: Arc<AtomicU64>,
    pub vehicles_drawn: Arc<AtomicU64>,
    pub search_time_us: Arc<AtomicU64>,
    pub heatmap_time_us: Arc<AtomicU64>,
    pub tracking_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            frames_with_vehicles: Arc::new(AtomicU64::new(0)),
            windows_searched: Arc::new(AtomicU64::new(0)),
            hot_windows: Arc::new(AtomicU64::new(0)),
            label_boxes: Arc::new(AtomicU64::new(0)),
            filtered_boxes: Arc::new(AtomicU64::new(0)),
            vehicles_drawn: Arc::new(AtomicU64::new(0)),
            search_time_us: Arc::new(AtomicU64::new(0)),
            heatmap_time_us: Arc::new(AtomicU64::new(0)),
            tracking_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Timings accumulate; `summary` divides by the frame count
    pub fn add_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let avg = |counter: &AtomicU64| counter.load(Ordering::Relaxed) / frames.max(1);
        MetricsSummary {
            total_frames: frames,
            fps: self.fps(),
            frames_with_vehicles: self.frames_with_vehicles.load(Ordering::Relaxed),
            windows_searched: self.windows_searched.load(Ordering::Relaxed),
            hot_windows: self.hot_windows.load(Ordering::Relaxed),
            label_boxes: self.label_boxes.load(Ordering::Relaxed),
            filtered_boxes: self.filtered_boxes.load(Ordering::Relaxed),
            vehicles_drawn: self.vehicles_drawn.load(Ordering::Relaxed),
            avg_search_us: avg(&self.search_time_us),
            avg_heatmap_us: avg(&self.heatmap_time_us),
            avg_tracking_us: avg(&self.tracking_time_us),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub frames_with_vehicles: u64,
    pub windows_searched: u64,
    pub hot_windows: u64,
    pub label_boxes: u64,
    pub filtered_boxes: u64,
    /// Sum over frames of confirmed vehicles drawn
    pub vehicles_drawn: u64,
    pub avg_search_us: u64,
    pub avg_heatmap_us: u64,
    pub avg_tracking_us: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_averages_timings_per_frame() {
        let metrics = PipelineMetrics::new();
        metrics.inc(&metrics.total_frames);
        metrics.inc(&metrics.total_frames);
        metrics.add(&metrics.hot_windows, 7);
        metrics.add_timing(&metrics.search_time_us, 300);
        metrics.add_timing(&metrics.search_time_us, 100);

        let summary = metrics.summary();
        assert_eq!(summary.total_frames, 2);
        assert_eq!(summary.hot_windows, 7);
        assert_eq!(summary.avg_search_us, 200);
        assert_eq!(summary.avg_tracking_us, 0);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = PipelineMetrics::new();
        let clone = metrics.clone();
        clone.inc(&clone.frames_with_vehicles);
        assert_eq!(metrics.summary().frames_with_vehicles, 1);
    }
}
