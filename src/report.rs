// src/report.rs
//
// Per-video outputs next to the annotated video:
//   <stem>_vehicles.jsonl  one FrameReport per line
//   <stem>_summary.json    run metadata + metrics summary

use crate::pipeline::{FrameContext, MetricsSummary};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct ReportWriter {
    path: PathBuf,
    out: BufWriter<File>,
    lines: u64,
}

impl ReportWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)
            .with_context(|| format!("Failed to create report {}", path.display()))?;
        info!("💾 Vehicle report: {}", path.display());
        Ok(Self {
            path,
            out: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn write_frame(&mut self, ctx: &FrameContext) -> Result<()> {
        serde_json::to_writer(&mut self.out, &ctx.report())?;
        self.out.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<u64> {
        self.out
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(self.lines)
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub source: String,
    pub classifier: &'a str,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub metrics: MetricsSummary,
}

pub fn write_summary(path: impl AsRef<Path>, summary: &RunSummary<'_>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write summary {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::VehicleSnapshot;
    use crate::heatmap::Heatmap;
    use crate::pipeline::PipelineMetrics;
    use crate::types::BBox;

    fn ctx(frame_id: u64, vehicles: Vec<VehicleSnapshot>) -> FrameContext {
        FrameContext {
            frame_id,
            timestamp_ms: frame_id as f64 * 40.0,
            windows: Vec::new(),
            hot_windows: vec![BBox::new(0, 0, 64, 64)],
            heatmap: Heatmap::new(4, 4),
            label_boxes: Vec::new(),
            filtered_boxes: Vec::new(),
            vehicles,
        }
    }

    #[test]
    fn test_jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/video_vehicles.jsonl");

        let mut writer = ReportWriter::create(&path).unwrap();
        writer.write_frame(&ctx(1, Vec::new())).unwrap();
        writer
            .write_frame(&ctx(
                2,
                vec![VehicleSnapshot {
                    id: 3,
                    bbox: BBox::new(10, 20, 110, 90),
                    hidden: false,
                    hits: 9,
                    age: 9,
                }],
            ))
            .unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["frame"], 1);
        assert_eq!(lines[0]["hot_windows"], 1);
        assert_eq!(lines[1]["vehicles"][0]["id"], 3);
        assert_eq!(lines[1]["vehicles"][0]["box"]["x2"], 110);
    }

    #[test]
    fn test_summary_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = RunSummary {
            source: "clip.mp4".to_string(),
            classifier: "linear-svm",
            finished_at: chrono::Utc::now(),
            metrics: PipelineMetrics::new().summary(),
        };
        write_summary(&path, &summary).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["classifier"], "linear-svm");
        assert_eq!(value["metrics"]["total_frames"], 0);
    }
}
