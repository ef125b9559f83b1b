// src/types.rs

use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub classifier: ClassifierConfig,
    pub search: SearchConfig,
    pub heatmap: HeatmapConfig,
    pub filter: FilterConfig,
    pub tracker: TrackerConfig,
    pub video: VideoConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    Svm,
    Onnx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub kind: ClassifierKind,
    pub model_path: String,
    /// Side length of the square patch every window is resized to
    pub patch_size: usize,
    /// Minimum vehicle score for the ONNX classifier
    pub onnx_threshold: f32,
    pub use_cuda: bool,
    pub num_threads: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::Svm,
            model_path: "model/svm_model.json".to_string(),
            patch_size: 64,
            onnx_threshold: 0.5,
            use_cuda: false,
            num_threads: 4,
        }
    }
}

/// One horizontal band of the frame searched with a fixed window size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRegion {
    #[serde(default)]
    pub x_start: Option<i32>,
    #[serde(default)]
    pub x_stop: Option<i32>,
    pub y_start: Option<i32>,
    pub y_stop: Option<i32>,
    pub window: (i32, i32),
    pub overlap: (f32, f32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub regions: Vec<SearchRegion>,
    /// Number of window chunks classified concurrently
    pub parallel_jobs: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            regions: vec![
                SearchRegion {
                    x_start: None,
                    x_stop: None,
                    y_start: Some(400),
                    y_stop: Some(483),
                    window: (64, 64),
                    overlap: (0.75, 0.75),
                },
                SearchRegion {
                    x_start: None,
                    x_stop: None,
                    y_start: Some(483),
                    y_stop: Some(650),
                    window: (96, 96),
                    overlap: (0.75, 0.75),
                },
            ],
            parallel_jobs: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Pixels with heat <= threshold are zeroed
    pub threshold: f32,
    pub clip_max: f32,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            clip_max: 255.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Boxes starting above this row are far away and may be small
    pub horizon_y: i32,
    pub far_min_size: i32,
    pub near_min_size: i32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            horizon_y: 450,
            far_min_size: 32,
            near_min_size: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum relative distance for a box to continue a vehicle
    pub match_distance: f32,
    /// Multiplier on match_distance when re-attaching hidden vehicles
    pub unhide_factor: f32,
    /// Frames without a box before a vehicle is dropped
    pub max_last_seen: u32,
    /// Boxes a vehicle needs before it is drawn; hidden vehicles younger
    /// than this are dropped
    pub min_age: u32,
    pub smoothing_frames: usize,
    pub hidden_inset_px: i32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_distance: 0.1,
            unhide_factor: 1.5,
            max_last_seen: 24,
            min_age: 8,
            smoothing_frames: 10,
            hidden_inset_px: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Smoothed boxes of confirmed vehicles plus the vehicle count
    Tracked,
    /// Every search window
    Windows,
    /// Windows the classifier marked as vehicle
    HotWindows,
    /// Thresholded heatmap as grayscale
    Heatmap,
    /// Bounding boxes of heatmap components
    Labels,
}

impl std::str::FromStr for RenderMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tracked" => Ok(Self::Tracked),
            "windows" => Ok(Self::Windows),
            "hot_windows" => Ok(Self::HotWindows),
            "heatmap" => Ok(Self::Heatmap),
            "labels" => Ok(Self::Labels),
            other => anyhow::bail!("unknown render mode '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub save_annotated: bool,
    pub write_report: bool,
    pub render_mode: RenderMode,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_dir: "videos".to_string(),
            output_dir: "output".to_string(),
            save_annotated: true,
            write_report: true,
            render_mode: RenderMode::Tracked,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// FRAME + GEOMETRY
// ============================================================================

/// RGB frame, row-major, 3 bytes per pixel
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: usize, height: usize, timestamp_ms: f64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
        }
    }

    #[cfg(test)]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }
}

/// Axis-aligned pixel box `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Integer center, halving width and height like the pixel grid does
    pub fn center(&self) -> (i32, i32) {
        (
            self.x1 + self.width().div_euclid(2),
            self.y1 + self.height().div_euclid(2),
        )
    }

    /// Shrink towards the center, never past it
    pub fn inset(&self, px: i32) -> Self {
        let dx = px.min(self.width() / 2).max(0);
        let dy = px.min(self.height() / 2).max(0);
        Self {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 - dx,
            y2: self.y2 - dy,
        }
    }

    /// Clamp to `[0, width] x [0, height]`
    pub fn clamp(&self, width: i32, height: i32) -> Self {
        Self {
            x1: self.x1.clamp(0, width),
            y1: self.y1.clamp(0, height),
            x2: self.x2.clamp(0, width),
            y2: self.y2.clamp(0, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_center_uses_integer_halving() {
        let b = BBox::new(10, 20, 15, 27);
        assert_eq!(b.center(), (12, 23));
    }

    #[test]
    fn test_inset_stops_at_center() {
        let b = BBox::new(0, 0, 30, 100);
        let inset = b.inset(25);
        assert_eq!(inset, BBox::new(15, 25, 15, 75));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "tracker:\n  max_last_seen: 12\nvideo:\n  render_mode: heatmap\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tracker.max_last_seen, 12);
        assert_eq!(config.tracker.min_age, 8);
        assert_eq!(config.video.render_mode, RenderMode::Heatmap);
        assert_eq!(config.search.regions.len(), 2);
        assert_eq!(config.classifier.kind, ClassifierKind::Svm);
    }

    #[test]
    fn test_render_mode_parse() {
        assert_eq!("hot_windows".parse::<RenderMode>().unwrap(), RenderMode::HotWindows);
        assert!("nope".parse::<RenderMode>().is_err());
    }
}
