// src/classifier/svm.rs
//
// Linear SVM over hand-crafted features.
//
//   patch → features::extract → standardize → (PCA) → w·z + b > 0
//
// The model file is JSON so it can be exported from any training stack:
//
//   {
//     "features": { "color_space": "YUV", "orient": 8, ... },
//     "scaler":   { "mean": [...], "scale": [...] },
//     "pca":      { "mean": [...], "components": [[...], ...] },   // optional
//     "svm":      { "weights": [...], "intercept": -0.3 }
//   }

use super::{ModelError, WindowClassifier};
use crate::features::{self, FeatureParams};
use crate::preprocessing::Patch;
use anyhow::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerModel {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaModel {
    pub mean: Vec<f32>,
    pub components: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmModel {
    pub weights: Vec<f32>,
    pub intercept: f32,
}

/// On-disk layout of a trained linear model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelFile {
    #[serde(default)]
    pub features: FeatureParams,
    pub scaler: ScalerModel,
    #[serde(default)]
    pub pca: Option<PcaModel>,
    pub svm: SvmModel,
}

struct Pca {
    mean: Array1<f32>,
    components: Array2<f32>,
}

pub struct LinearSvmClassifier {
    params: FeatureParams,
    patch_size: usize,
    scaler_mean: Array1<f32>,
    scaler_scale: Array1<f32>,
    pca: Option<Pca>,
    weights: Array1<f32>,
    intercept: f32,
}

impl LinearSvmClassifier {
    pub fn load(path: impl AsRef<Path>, patch_size: usize) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading linear SVM model: {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: LinearModelFile =
            serde_json::from_str(&contents).map_err(|source| ModelError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        let classifier = Self::from_model(file, patch_size)?;
        info!(
            "✓ Linear SVM ready ({:?}, {} features, pca={})",
            classifier.feature_params().color_space,
            classifier.scaler_mean.len(),
            classifier.pca.is_some()
        );
        Ok(classifier)
    }

    pub fn from_model(file: LinearModelFile, patch_size: usize) -> Result<Self, ModelError> {
        let feature_len = features::feature_len(&file.features, patch_size);
        if feature_len == 0 {
            return Err(ModelError::EmptyFeatures);
        }

        check_len("scaler.mean", file.scaler.mean.len(), feature_len)?;
        check_len("scaler.scale", file.scaler.scale.len(), feature_len)?;

        let pca = match file.pca {
            Some(pca) => {
                check_len("pca.mean", pca.mean.len(), feature_len)?;
                let rows = pca.components.len();
                if rows == 0 {
                    return Err(ModelError::EmptyComponents);
                }
                for row in &pca.components {
                    check_len("pca.components[]", row.len(), feature_len)?;
                }
                let flat: Vec<f32> = pca.components.into_iter().flatten().collect();
                let components = Array2::from_shape_vec((rows, feature_len), flat)
                    .map_err(|_| ModelError::EmptyComponents)?;
                Some(Pca {
                    mean: Array1::from(pca.mean),
                    components,
                })
            }
            None => None,
        };

        let decision_len = pca
            .as_ref()
            .map(|p| p.components.nrows())
            .unwrap_or(feature_len);
        check_len("svm.weights", file.svm.weights.len(), decision_len)?;

        // Zero-variance features carry no information; keep them finite
        let scale = file
            .scaler
            .scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect::<Vec<_>>();

        Ok(Self {
            params: file.features,
            patch_size,
            scaler_mean: Array1::from(file.scaler.mean),
            scaler_scale: Array1::from(scale),
            pca,
            weights: Array1::from(file.svm.weights),
            intercept: file.svm.intercept,
        })
    }

    pub fn feature_params(&self) -> &FeatureParams {
        &self.params
    }

    /// Signed distance to the separating hyperplane
    pub fn decision(&self, patch: &Patch) -> f32 {
        let raw = Array1::from(features::extract(patch, &self.params));
        self.decision_from_features(raw)
    }

    fn decision_from_features(&self, raw: Array1<f32>) -> f32 {
        let scaled = (raw - &self.scaler_mean) / &self.scaler_scale;
        let z = match &self.pca {
            Some(pca) => pca.components.dot(&(scaled - &pca.mean)),
            None => scaled,
        };
        self.weights.dot(&z) + self.intercept
    }
}

fn check_len(field: &'static str, actual: usize, expected: usize) -> Result<(), ModelError> {
    if actual != expected {
        return Err(ModelError::DimensionMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

impl WindowClassifier for LinearSvmClassifier {
    fn name(&self) -> &'static str {
        "linear-svm"
    }

    fn patch_size(&self) -> usize {
        self.patch_size
    }

    fn classify(&self, patches: &[Patch]) -> Result<Vec<bool>> {
        let verdicts: Vec<bool> = patches.iter().map(|p| self.decision(p) > 0.0).collect();
        debug!(
            "SVM: {}/{} windows positive",
            verdicts.iter().filter(|v| **v).count(),
            verdicts.len()
        );
        Ok(verdicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{ColorSpace, HogChannel};

    /// Histogram-only features: 4 bins x 3 channels = 12 values
    fn hist_params() -> FeatureParams {
        FeatureParams {
            color_space: ColorSpace::Rgb,
            hog_channel: HogChannel::Single(0),
            spatial_feat: false,
            hist_feat: true,
            hog_feat: false,
            hist_bins: 4,
            ..FeatureParams::default()
        }
    }

    /// Positive when the red channel is mostly in its top bin
    fn red_model() -> LinearModelFile {
        let mut weights = vec![0.0; 12];
        weights[3] = 1.0;
        LinearModelFile {
            features: hist_params(),
            scaler: ScalerModel {
                mean: vec![0.0; 12],
                scale: vec![64.0; 12],
            },
            pca: None,
            svm: SvmModel {
                weights,
                intercept: -0.5,
            },
        }
    }

    fn solid(size: usize, rgb: [u8; 3]) -> Patch {
        Patch {
            data: rgb.iter().copied().cycle().take(size * size * 3).collect(),
            size,
        }
    }

    #[test]
    fn test_linear_decision() {
        let clf = LinearSvmClassifier::from_model(red_model(), 8).unwrap();
        let verdicts = clf
            .classify(&[solid(8, [250, 10, 10]), solid(8, [10, 10, 250])])
            .unwrap();
        assert_eq!(verdicts, vec![true, false]);
    }

    #[test]
    fn test_pca_projection_applied() {
        let mut model = red_model();
        // Single component selecting the red top bin, negated
        let mut component = vec![0.0; 12];
        component[3] = -1.0;
        model.pca = Some(PcaModel {
            mean: vec![0.0; 12],
            components: vec![component],
        });
        model.svm = SvmModel {
            weights: vec![1.0],
            intercept: 0.5,
        };

        let clf = LinearSvmClassifier::from_model(model, 8).unwrap();
        let red = clf.decision(&solid(8, [250, 10, 10]));
        let blue = clf.decision(&solid(8, [10, 10, 250]));
        assert!((red - -0.5).abs() < 1e-5);
        assert!((blue - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut model = red_model();
        model.svm.weights.pop();
        let err = LinearSvmClassifier::from_model(model, 8).err().unwrap();
        assert!(matches!(
            err,
            ModelError::DimensionMismatch {
                field: "svm.weights",
                expected: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn test_zero_scale_treated_as_unit() {
        let mut model = red_model();
        model.scaler.scale = vec![0.0; 12];
        let clf = LinearSvmClassifier::from_model(model, 8).unwrap();
        assert!(clf.decision(&solid(8, [250, 0, 0])).is_finite());
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, serde_json::to_string(&red_model()).unwrap()).unwrap();

        let clf = LinearSvmClassifier::load(&path, 8).unwrap();
        assert_eq!(clf.feature_params().hist_bins, 4);
        assert_eq!(clf.patch_size(), 8);
    }
}
