// src/pipeline/mod.rs

pub mod detector;
pub mod frame_context;
pub mod metrics;

pub use detector::VehicleDetector;
pub use frame_context::{FrameContext, FrameReport};
pub use metrics::{MetricsSummary, PipelineMetrics};
