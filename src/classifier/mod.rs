// src/classifier/mod.rs
//
// Window classifiers. Each one answers "is there a vehicle in this patch?"
// for a batch of patches, in order.

pub mod onnx;
pub mod svm;

pub use onnx::OnnxWindowClassifier;
pub use svm::LinearSvmClassifier;

use crate::preprocessing::Patch;
use crate::types::{ClassifierConfig, ClassifierKind};
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;

pub trait WindowClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Side length patches must be resized to before `classify`
    fn patch_size(&self) -> usize;

    /// One verdict per patch, `true` = vehicle
    fn classify(&self, patches: &[Patch]) -> Result<Vec<bool>>;
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} has {actual} values, expected {expected}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("feature parameters produce an empty feature vector")]
    EmptyFeatures,
    #[error("pca has no components")]
    EmptyComponents,
}

pub fn build_classifier(config: &ClassifierConfig) -> Result<Arc<dyn WindowClassifier>> {
    let classifier: Arc<dyn WindowClassifier> = match config.kind {
        ClassifierKind::Svm => Arc::new(LinearSvmClassifier::load(
            &config.model_path,
            config.patch_size,
        )?),
        ClassifierKind::Onnx => Arc::new(OnnxWindowClassifier::new(config)?),
    };
    Ok(classifier)
}
