// src/sliding_window.rs
//
// Window grid generation and parallel window classification.

use crate::classifier::WindowClassifier;
use crate::preprocessing;
use crate::types::{BBox, Frame, SearchRegion};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

/// Windows covering `region`, row-major.
///
/// Missing bounds fall back to the frame edges. The number of windows per
/// axis is `floor(span / step) - 1`, so the last window never runs past the
/// span by more than one step.
pub fn slide_window(frame_w: i32, frame_h: i32, region: &SearchRegion) -> Vec<BBox> {
    let x_start = region.x_start.unwrap_or(0);
    let x_stop = region.x_stop.unwrap_or(frame_w);
    let y_start = region.y_start.unwrap_or(0);
    let y_stop = region.y_stop.unwrap_or(frame_h);

    let (win_w, win_h) = region.window;
    let x_step = (win_w as f32 * (1.0 - region.overlap.0)) as i32;
    let y_step = (win_h as f32 * (1.0 - region.overlap.1)) as i32;
    if x_step <= 0 || y_step <= 0 {
        return Vec::new();
    }

    let nx = (x_stop - x_start) / x_step - 1;
    let ny = (y_stop - y_start) / y_step - 1;
    if nx <= 0 || ny <= 0 {
        return Vec::new();
    }

    let mut windows = Vec::with_capacity((nx * ny) as usize);
    for ys in 0..ny {
        for xs in 0..nx {
            let x1 = xs * x_step + x_start;
            let y1 = ys * y_step + y_start;
            windows.push(BBox::new(x1, y1, x1 + win_w, y1 + win_h));
        }
    }
    windows
}

/// All windows of all regions, in region order
pub fn build_windows(frame_w: i32, frame_h: i32, regions: &[SearchRegion]) -> Vec<BBox> {
    regions
        .iter()
        .flat_map(|region| slide_window(frame_w, frame_h, region))
        .collect()
}

/// Classify `windows` of one frame, returning the positive ones.
fn search_chunk(
    classifier: &dyn WindowClassifier,
    frame: &Frame,
    windows: &[BBox],
) -> Result<Vec<BBox>> {
    let patch_size = classifier.patch_size();
    let mut kept = Vec::with_capacity(windows.len());
    let mut patches = Vec::with_capacity(windows.len());
    for window in windows {
        if let Some(patch) = preprocessing::extract_patch(frame, window, patch_size) {
            kept.push(*window);
            patches.push(patch);
        }
    }

    let verdicts = classifier.classify(&patches)?;
    Ok(kept
        .into_iter()
        .zip(verdicts)
        .filter_map(|(window, hot)| hot.then_some(window))
        .collect())
}

pub struct SlidingWindowSearch {
    classifier: Arc<dyn WindowClassifier>,
    parallel_jobs: usize,
}

impl SlidingWindowSearch {
    pub fn new(classifier: Arc<dyn WindowClassifier>, parallel_jobs: usize) -> Self {
        Self {
            classifier,
            parallel_jobs: parallel_jobs.max(1),
        }
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Split `windows` into contiguous chunks and classify them on the
    /// blocking pool. Hot windows come back in input order.
    pub async fn search(&self, frame: Arc<Frame>, windows: &[BBox]) -> Result<Vec<BBox>> {
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_size = (windows.len() / self.parallel_jobs).max(1);
        let mut handles = Vec::new();

        for chunk in windows.chunks(chunk_size) {
            let classifier = Arc::clone(&self.classifier);
            let frame = Arc::clone(&frame);
            let chunk = chunk.to_vec();
            handles.push(tokio::task::spawn_blocking(move || {
                search_chunk(classifier.as_ref(), &frame, &chunk)
            }));
        }

        debug!(
            "Searching {} windows in {} chunk(s) with {}",
            windows.len(),
            handles.len(),
            self.classifier.name()
        );

        let mut hot = Vec::new();
        for handle in handles {
            let found = handle.await.context("window search task panicked")??;
            hot.extend(found);
        }
        Ok(hot)
    }
}
