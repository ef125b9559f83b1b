// src/video_processor.rs

use crate::pipeline::FrameContext;
use crate::types::{BBox, Frame, RenderMode, VideoConfig};
use anyhow::{Context, Result};
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst, VideoWriter},
};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

pub struct VideoProcessor {
    config: VideoConfig,
}

impl VideoProcessor {
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }

    pub fn find_video_files(&self) -> Result<Vec<PathBuf>> {
        let mut videos = Vec::new();

        for entry in WalkDir::new(&self.config.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_file() && is_video(path) {
                videos.push(path.to_path_buf());
            }
        }

        videos.sort();
        info!("Found {} video files", videos.len());
        Ok(videos)
    }

    pub fn open_video(&self, path: &Path) -> Result<VideoReader> {
        info!("Opening video: {}", path.display());

        let path_str = path
            .to_str()
            .with_context(|| format!("Non UTF-8 path: {}", path.display()))?;
        let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;

        if !cap.is_opened()? {
            anyhow::bail!("Failed to open video file {}", path.display());
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let total_frames = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)? as i32;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

        info!(
            "Video properties: {}x{} @ {:.1} FPS, {} frames",
            width, height, fps, total_frames
        );

        Ok(VideoReader {
            cap,
            fps: if fps > 0.0 { fps } else { 25.0 },
            total_frames,
            current_frame: 0,
            width,
            height,
        })
    }

    pub fn output_path(&self, input_path: &Path, suffix: &str) -> PathBuf {
        let stem = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());
        PathBuf::from(&self.config.output_dir).join(format!("{}_{}", stem, suffix))
    }

    pub fn create_writer(
        &self,
        input_path: &Path,
        width: i32,
        height: i32,
        fps: f64,
    ) -> Result<Option<VideoWriter>> {
        if !self.config.save_annotated {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.config.output_dir)?;

        let output_path = self.output_path(input_path, "annotated.mp4");
        info!("Output video: {}", output_path.display());

        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let writer = VideoWriter::new(
            &output_path.to_string_lossy(),
            fourcc,
            fps,
            core::Size::new(width, height),
            true,
        )?;

        Ok(Some(writer))
    }
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub struct VideoReader {
    pub cap: VideoCapture,
    pub fps: f64,
    pub total_frames: i32,
    pub current_frame: i32,
    pub width: i32,
    pub height: i32,
}

impl VideoReader {
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        use opencv::videoio::VideoCaptureTrait;

        let mut mat = Mat::default();

        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            return Ok(None);
        }

        self.current_frame += 1;
        let timestamp_ms = (self.current_frame as f64 / self.fps) * 1000.0;

        let mut rgb_mat = Mat::default();
        imgproc::cvt_color(&mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB, 0)?;

        let data = rgb_mat.data_bytes()?.to_vec();

        Ok(Some(Frame {
            data,
            width: rgb_mat.cols() as usize,
            height: rgb_mat.rows() as usize,
            timestamp_ms,
        }))
    }

    pub fn progress(&self) -> f32 {
        if self.total_frames == 0 {
            return 0.0;
        }
        (self.current_frame as f32 / self.total_frames as f32) * 100.0
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn bgr(r: f64, g: f64, b: f64) -> core::Scalar {
    core::Scalar::new(b, g, r, 0.0)
}

fn frame_to_bgr(frame: &Frame) -> Result<Mat> {
    let mat = Mat::from_slice(&frame.data)?;
    let mat = mat.reshape(3, frame.height as i32)?;
    let mut bgr_mat = Mat::default();
    imgproc::cvt_color(&mat, &mut bgr_mat, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr_mat)
}

fn draw_boxes(img: &mut Mat, boxes: &[BBox], color: core::Scalar, thickness: i32) -> Result<()> {
    for b in boxes {
        imgproc::rectangle_points(
            img,
            core::Point::new(b.x1, b.y1),
            core::Point::new(b.x2, b.y2),
            color,
            thickness,
            imgproc::LINE_8,
            0,
        )?;
    }
    Ok(())
}

/// Annotated BGR frame for `mode`
pub fn render(frame: &Frame, ctx: &FrameContext, mode: RenderMode) -> Result<Mat> {
    match mode {
        RenderMode::Windows => {
            let mut output = frame_to_bgr(frame)?;
            draw_boxes(&mut output, &ctx.windows, bgr(0.0, 0.0, 255.0), 2)?;
            Ok(output)
        }
        RenderMode::HotWindows => {
            let mut output = frame_to_bgr(frame)?;
            draw_boxes(&mut output, &ctx.hot_windows, bgr(0.0, 0.0, 255.0), 2)?;
            Ok(output)
        }
        RenderMode::Heatmap => {
            let gray = ctx.heatmap.to_gray();
            let mat = Mat::from_slice(&gray)?;
            let mat = mat.reshape(1, ctx.heatmap.height() as i32)?;
            let mut output = Mat::default();
            imgproc::cvt_color(&mat, &mut output, imgproc::COLOR_GRAY2BGR, 0)?;
            Ok(output)
        }
        RenderMode::Labels => {
            let mut output = frame_to_bgr(frame)?;
            draw_boxes(&mut output, &ctx.label_boxes, bgr(255.0, 0.0, 255.0), 6)?;
            Ok(output)
        }
        RenderMode::Tracked => {
            let mut output = frame_to_bgr(frame)?;
            let boxes: Vec<BBox> = ctx.vehicles.iter().map(|v| v.bbox).collect();
            draw_boxes(&mut output, &boxes, bgr(255.0, 50.0, 0.0), 2)?;

            imgproc::put_text(
                &mut output,
                &format!("Vehicles detected: {}", ctx.vehicles.len()),
                core::Point::new(50, 150),
                imgproc::FONT_HERSHEY_SIMPLEX,
                1.0,
                bgr(255.0, 255.0, 0.0),
                3,
                imgproc::LINE_8,
                false,
            )?;
            Ok(output)
        }
    }
}

// ============================================================================
// STILL IMAGES
// ============================================================================

pub fn load_image(path: &Path) -> Result<Frame> {
    let img = image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width as usize, height as usize, 0.0))
}

/// Save a rendered BGR Mat through the `image` crate
pub fn save_rendered(mat: &Mat, path: &Path) -> Result<()> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let data = rgb.data_bytes()?.to_vec();

    let img = image::RgbImage::from_raw(width, height, data)
        .context("Rendered frame has unexpected size")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    img.save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_case_insensitive() {
        assert!(is_video(Path::new("clip.MP4")));
        assert!(is_video(Path::new("dir/clip.mkv")));
        assert!(!is_video(Path::new("notes.txt")));
        assert!(!is_video(Path::new("no_extension")));
    }

    #[test]
    fn test_find_video_files_walks_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("day1")).unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("day1/b.MOV"), b"").unwrap();
        std::fs::write(dir.path().join("day1/readme.md"), b"").unwrap();

        let processor = VideoProcessor::new(VideoConfig {
            input_dir: dir.path().to_string_lossy().to_string(),
            ..VideoConfig::default()
        });
        let videos = processor.find_video_files().unwrap();
        assert_eq!(videos.len(), 2);
    }

    #[test]
    fn test_output_path_uses_stem() {
        let processor = VideoProcessor::new(VideoConfig {
            output_dir: "out".to_string(),
            ..VideoConfig::default()
        });
        assert_eq!(
            processor.output_path(Path::new("videos/project_video.mp4"), "vehicles.jsonl"),
            PathBuf::from("out/project_video_vehicles.jsonl")
        );
    }

    #[test]
    fn test_load_image_reads_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        let mut img = image::RgbImage::new(4, 3);
        img.put_pixel(1, 2, image::Rgb([10, 20, 30]));
        img.save(&path).unwrap();

        let frame = load_image(&path).unwrap();
        assert_eq!((frame.width, frame.height), (4, 3));
        assert_eq!(frame.pixel(1, 2), [10, 20, 30]);
    }
}
