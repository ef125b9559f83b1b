// src/classifier/onnx.rs

use super::WindowClassifier;
use crate::preprocessing::{self, Patch};
use crate::types::ClassifierConfig;
use anyhow::{Context, Result};
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
};
use parking_lot::Mutex;
use tracing::{debug, info};

/// CNN window classifier exported to ONNX.
///
/// Input `[N, 3, P, P]` RGB in [0, 1]; output `[N, C]` where the last
/// column is the vehicle score.
pub struct OnnxWindowClassifier {
    session: Mutex<Session>,
    patch_size: usize,
    threshold: f32,
}

impl OnnxWindowClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        info!("Loading ONNX window classifier: {}", config.model_path);

        let mut session_builder = Session::builder()?;

        if config.use_cuda {
            info!("Enabling CUDA execution provider");
            session_builder = session_builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build()])?;
        }

        let session = session_builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.num_threads)?
            .with_inter_threads(1)?
            .commit_from_file(&config.model_path)
            .context("Failed to load window classifier model")?;

        info!("✓ ONNX window classifier initialized");

        Ok(Self {
            session: Mutex::new(session),
            patch_size: config.patch_size,
            threshold: config.onnx_threshold,
        })
    }

    fn scores(&self, patches: &[Patch]) -> Result<Vec<f32>> {
        let n = self.patch_size;
        let mut input = Vec::with_capacity(patches.len() * 3 * n * n);
        for patch in patches {
            preprocessing::to_chw(patch, &mut input);
        }

        let shape = [patches.len(), 3, n, n];
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), input.into_boxed_slice()))?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![input_value])?;
        let output = &outputs[0];
        let (_, data) = output.try_extract_tensor::<f32>()?;

        vehicle_scores(data, patches.len())
    }
}

/// Pick the last column of a row-major `[n, C]` score matrix
fn vehicle_scores(data: &[f32], n: usize) -> Result<Vec<f32>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    if data.len() % n != 0 || data.is_empty() {
        anyhow::bail!(
            "classifier output of {} values does not split into {} rows",
            data.len(),
            n
        );
    }
    let columns = data.len() / n;
    Ok(data.chunks(columns).map(|row| row[columns - 1]).collect())
}

impl WindowClassifier for OnnxWindowClassifier {
    fn name(&self) -> &'static str {
        "onnx-cnn"
    }

    fn patch_size(&self) -> usize {
        self.patch_size
    }

    fn classify(&self, patches: &[Patch]) -> Result<Vec<bool>> {
        if patches.is_empty() {
            return Ok(Vec::new());
        }
        let scores = self.scores(patches)?;
        debug!("ONNX: scored {} windows", scores.len());
        Ok(scores.into_iter().map(|s| s >= self.threshold).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_scores_takes_last_column() {
        let data = [0.9, 0.1, 0.2, 0.8, 0.6, 0.4];
        assert_eq!(vehicle_scores(&data, 3).unwrap(), vec![0.1, 0.8, 0.4]);
    }

    #[test]
    fn test_vehicle_scores_single_column() {
        assert_eq!(vehicle_scores(&[0.3, 0.7], 2).unwrap(), vec![0.3, 0.7]);
    }

    #[test]
    fn test_vehicle_scores_rejects_ragged_output() {
        assert!(vehicle_scores(&[0.3, 0.7, 0.1], 2).is_err());
    }
}
