// src/main.rs

mod analysis;
mod classifier;
mod config;
mod features;
mod heatmap;
mod pipeline;
mod preprocessing;
mod report;
mod sliding_window;
mod types;
mod video_processor;

use anyhow::Result;
use clap::{Parser, Subcommand};
use opencv::prelude::*;
use pipeline::{MetricsSummary, VehicleDetector};
use report::{ReportWriter, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use types::{Config, RenderMode};
use video_processor::VideoProcessor;

#[derive(Parser)]
#[command(name = "vehicle-detection", version, about = "Sliding-window vehicle detection for dashcam video")]
struct Cli {
    /// YAML configuration file (defaults apply when missing)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect and track vehicles in a video file or every video in input_dir
    Process {
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Override video.render_mode
        #[arg(long)]
        mode: Option<RenderMode>,
    },
    /// Run one detection pass on a still image and save the overlay
    DetectImage {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = "labels")]
        mode: RenderMode,
    },
    /// Print the search window grid for a frame size
    Windows {
        #[arg(long, default_value_t = 1280)]
        width: i32,
        #[arg(long, default_value_t = 720)]
        height: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "vehicle_detection={},ort=warn",
            config.logging.level
        ))
        .init();

    info!("🚗 Vehicle Detection starting");
    if cli.config.exists() {
        info!("✓ Configuration loaded from {}", cli.config.display());
    } else {
        warn!(
            "Config {} not found, using defaults",
            cli.config.display()
        );
    }

    match cli.command {
        Command::Process { input, mode } => {
            if let Some(mode) = mode {
                config.video.render_mode = mode;
            }
            run_videos(&config, input).await
        }
        Command::DetectImage {
            input,
            output,
            mode,
        } => detect_image(&config, &input, &output, mode).await,
        Command::Windows { width, height } => {
            print_windows(&config, width, height);
            Ok(())
        }
    }
}

async fn run_videos(config: &Config, input: Option<PathBuf>) -> Result<()> {
    let classifier = classifier::build_classifier(&config.classifier)?;
    let mut detector = VehicleDetector::new(config.clone(), classifier.clone());
    let video_processor = VideoProcessor::new(config.video.clone());

    let video_files = match input {
        Some(path) if path.is_file() => vec![path],
        Some(path) => {
            let mut video_config = config.video.clone();
            video_config.input_dir = path.to_string_lossy().to_string();
            VideoProcessor::new(video_config).find_video_files()?
        }
        None => video_processor.find_video_files()?,
    };

    if video_files.is_empty() {
        error!("No video files found in {}", config.video.input_dir);
        return Ok(());
    }

    info!("Found {} video file(s) to process", video_files.len());

    for (idx, video_path) in video_files.iter().enumerate() {
        info!("========================================");
        info!(
            "Processing video {}/{}: {}",
            idx + 1,
            video_files.len(),
            video_path.display()
        );
        info!("========================================");

        detector.reset();
        match process_video(video_path, &mut detector, &video_processor, config).await {
            Ok(stats) => {
                log_stats(&stats);
                if config.video.write_report {
                    let summary = RunSummary {
                        source: video_path.display().to_string(),
                        classifier: classifier.name(),
                        finished_at: chrono::Utc::now(),
                        metrics: stats,
                    };
                    let path = video_processor.output_path(video_path, "summary.json");
                    if let Err(e) = report::write_summary(&path, &summary) {
                        warn!("Failed to write summary: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("Failed to process video: {:#}", e);
            }
        }
    }

    Ok(())
}

async fn process_video(
    video_path: &Path,
    detector: &mut VehicleDetector,
    video_processor: &VideoProcessor,
    config: &Config,
) -> Result<MetricsSummary> {
    use opencv::videoio::VideoWriterTrait;

    let mut reader = video_processor.open_video(video_path)?;
    let mut writer =
        video_processor.create_writer(video_path, reader.width, reader.height, reader.fps)?;

    let mut report = if config.video.write_report {
        Some(ReportWriter::create(
            video_processor.output_path(video_path, "vehicles.jsonl"),
        )?)
    } else {
        None
    };

    let start_time = Instant::now();
    let mut frame_count: u64 = 0;

    while let Some(frame) = reader.read_frame()? {
        frame_count += 1;
        let frame = Arc::new(frame);
        let ctx = detector.process_frame(Arc::clone(&frame)).await?;

        if let Some(report) = report.as_mut() {
            report.write_frame(&ctx)?;
        }

        if let Some(writer) = writer.as_mut() {
            let annotated =
                video_processor::render(&frame, &ctx, config.video.render_mode)?;
            if annotated.cols() == reader.width && annotated.rows() == reader.height {
                writer.write(&annotated)?;
            }
        }

        if frame_count % 50 == 0 {
            info!(
                "Progress: {:.1}% ({} frames, {} confirmed / {} tracked vehicle(s), {:.1} FPS)",
                reader.progress(),
                frame_count,
                detector.tracker().confirmed_count(),
                detector.tracker().vehicles().len(),
                frame_count as f64 / start_time.elapsed().as_secs_f64().max(1e-3)
            );
        }
    }

    if let Some(report) = report {
        let lines = report.finish()?;
        info!("Report complete: {} frame(s)", lines);
    }

    Ok(detector.metrics().summary())
}

fn log_stats(stats: &MetricsSummary) {
    info!("✓ Video processed successfully!");
    info!("  Total frames: {}", stats.total_frames);
    info!(
        "  Frames with vehicles: {} ({:.1}%)",
        stats.frames_with_vehicles,
        100.0 * stats.frames_with_vehicles as f64 / stats.total_frames.max(1) as f64
    );
    info!(
        "  🔍 Windows searched: {} ({} hot)",
        stats.windows_searched, stats.hot_windows
    );
    info!(
        "  🔥 Heatmap blobs: {} ({} kept after filtering)",
        stats.label_boxes, stats.filtered_boxes
    );
    info!(
        "  🚙 Average vehicles per frame: {:.2}",
        stats.vehicles_drawn as f64 / stats.total_frames.max(1) as f64
    );
    info!(
        "  ⏱  Stage timings: search {}µs | heatmap {}µs | tracking {}µs",
        stats.avg_search_us, stats.avg_heatmap_us, stats.avg_tracking_us
    );
    info!("  Processing Speed: {:.1} FPS", stats.fps);
}

async fn detect_image(config: &Config, input: &Path, output: &Path, mode: RenderMode) -> Result<()> {
    let classifier = classifier::build_classifier(&config.classifier)?;
    let mut detector = VehicleDetector::new(config.clone(), classifier);

    let frame = Arc::new(video_processor::load_image(input)?);
    info!("Image {}: {}x{}", input.display(), frame.width, frame.height);

    let ctx = detector.process_frame(Arc::clone(&frame)).await?;
    info!(
        "{} hot window(s), {} blob(s), {} after filtering",
        ctx.hot_windows.len(),
        ctx.label_boxes.len(),
        ctx.filtered_boxes.len()
    );

    let rendered = video_processor::render(&frame, &ctx, mode)?;
    video_processor::save_rendered(&rendered, output)?;
    info!("✓ Saved {}", output.display());
    Ok(())
}

fn print_windows(config: &Config, width: i32, height: i32) {
    let mut total = 0;
    for (i, region) in config.search.regions.iter().enumerate() {
        let windows = sliding_window::slide_window(width, height, region);
        total += windows.len();
        println!(
            "region {}: y {:?}..{:?}, window {}x{}, overlap {:.2}/{:.2} -> {} windows",
            i,
            region.y_start,
            region.y_stop,
            region.window.0,
            region.window.1,
            region.overlap.0,
            region.overlap.1,
            windows.len()
        );
    }
    println!("total: {} windows for {}x{}", total, width, height);
}
