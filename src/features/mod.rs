// src/features/mod.rs
//
// Feature vector for window classification.
//
//   Patch (RGB u8) → color_space → [spatial bins | color histogram | HOG]
//
// The parameters travel with the trained model so the detector always
// extracts exactly what the classifier was trained on.

pub mod color_space;
pub mod hog;

pub use color_space::{ChannelImage, ColorSpace};
pub use hog::HogParams;

use crate::preprocessing::{self, Patch};
use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};

// ============================================================================
// PARAMETERS
// ============================================================================

/// Which converted channel(s) feed the HOG descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HogChannelRepr", into = "HogChannelRepr")]
pub enum HogChannel {
    Single(usize),
    All,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum HogChannelRepr {
    Index(usize),
    Name(String),
}

impl TryFrom<HogChannelRepr> for HogChannel {
    type Error = String;

    fn try_from(repr: HogChannelRepr) -> Result<Self, Self::Error> {
        match repr {
            HogChannelRepr::Index(i) if i < 3 => Ok(Self::Single(i)),
            HogChannelRepr::Index(i) => Err(format!("hog_channel {} out of range 0..=2", i)),
            HogChannelRepr::Name(name) if name.eq_ignore_ascii_case("ALL") => Ok(Self::All),
            HogChannelRepr::Name(name) => Err(format!("unknown hog_channel '{}'", name)),
        }
    }
}

impl From<HogChannel> for HogChannelRepr {
    fn from(channel: HogChannel) -> Self {
        match channel {
            HogChannel::Single(i) => Self::Index(i),
            HogChannel::All => Self::Name("ALL".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    pub color_space: ColorSpace,
    pub orient: usize,
    pub pix_per_cell: usize,
    pub cell_per_block: usize,
    pub hog_channel: HogChannel,
    pub spatial_size: usize,
    pub hist_bins: usize,
    pub spatial_feat: bool,
    pub hist_feat: bool,
    pub hog_feat: bool,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            color_space: ColorSpace::Yuv,
            orient: 8,
            pix_per_cell: 4,
            cell_per_block: 2,
            hog_channel: HogChannel::Single(0),
            spatial_size: 32,
            hist_bins: 32,
            spatial_feat: true,
            hist_feat: true,
            hog_feat: true,
        }
    }
}

impl FeatureParams {
    pub fn hog_params(&self) -> HogParams {
        HogParams {
            orientations: self.orient,
            pix_per_cell: self.pix_per_cell,
            cells_per_block: self.cell_per_block,
        }
    }

    fn hog_channels(&self) -> Vec<usize> {
        match self.hog_channel {
            HogChannel::Single(c) => vec![c],
            HogChannel::All => vec![0, 1, 2],
        }
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Length of the vector `extract` produces for a `patch_size` patch
pub fn feature_len(params: &FeatureParams, patch_size: usize) -> usize {
    let mut len = 0;
    if params.spatial_feat {
        len += params.spatial_size * params.spatial_size * 3;
    }
    if params.hist_feat {
        len += params.hist_bins * 3;
    }
    if params.hog_feat {
        len += params.hog_channels().len()
            * params.hog_params().descriptor_len(patch_size, patch_size);
    }
    len
}

pub fn extract(patch: &Patch, params: &FeatureParams) -> Vec<f32> {
    let image = color_space::convert_patch(patch, params.color_space);
    let mut features = Vec::with_capacity(feature_len(params, patch.size));

    if params.spatial_feat {
        features.extend(bin_spatial(&image, params.spatial_size));
    }
    if params.hist_feat {
        features.extend(color_histogram(&image, params.hist_bins));
    }
    if params.hog_feat {
        let hog_params = params.hog_params();
        for c in params.hog_channels() {
            features.extend(hog::hog(image.slice(s![.., .., c]), &hog_params));
        }
    }

    features
}

/// Downsample to `size x size` (bilinear) and ravel HWC
pub fn bin_spatial(image: &ChannelImage, size: usize) -> Vec<f32> {
    let (h, w, _) = image.dim();
    if size == 0 || h == 0 || w == 0 {
        return Vec::new();
    }
    if h == size && w == size {
        return image.iter().copied().collect();
    }

    let x_taps = preprocessing::linear_taps(w, size);
    let y_taps = preprocessing::linear_taps(h, size);
    let mut out = Array3::<f32>::zeros((size, size, 3));

    for (dy, &(sy0, sy1, fy)) in y_taps.iter().enumerate() {
        for (dx, &(sx0, sx1, fx)) in x_taps.iter().enumerate() {
            for c in 0..3 {
                out[[dy, dx, c]] = image[[sy0, sx0, c]] * (1.0 - fx) * (1.0 - fy)
                    + image[[sy0, sx1, c]] * fx * (1.0 - fy)
                    + image[[sy1, sx0, c]] * (1.0 - fx) * fy
                    + image[[sy1, sx1, c]] * fx * fy;
            }
        }
    }

    out.into_iter().collect()
}

/// Per-channel histogram over [0, 1], channels concatenated
pub fn color_histogram(image: &ChannelImage, bins: usize) -> Vec<f32> {
    let mut hist = vec![0.0f32; bins * 3];
    if bins == 0 {
        return hist;
    }
    for ((_, _, c), &v) in image.indexed_iter() {
        let bin = ((v.clamp(0.0, 1.0) * bins as f32) as usize).min(bins - 1);
        hist[c * bins + bin] += 1.0;
    }
    hist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_patch(size: usize, rgb: [u8; 3]) -> Patch {
        Patch {
            data: rgb.iter().copied().cycle().take(size * size * 3).collect(),
            size,
        }
    }

    #[test]
    fn test_default_feature_len_matches_extract() {
        let params = FeatureParams::default();
        assert_eq!(feature_len(&params, 64), 3072 + 96 + 7200);

        let patch = solid_patch(64, [30, 120, 200]);
        assert_eq!(extract(&patch, &params).len(), feature_len(&params, 64));
    }

    #[test]
    fn test_all_channels_triples_hog_part() {
        let params = FeatureParams {
            hog_channel: HogChannel::All,
            spatial_feat: false,
            hist_feat: false,
            ..FeatureParams::default()
        };
        assert_eq!(feature_len(&params, 64), 3 * 7200);
        let patch = solid_patch(64, [0, 0, 0]);
        assert_eq!(extract(&patch, &params).len(), 3 * 7200);
    }

    #[test]
    fn test_histogram_counts_every_pixel_once_per_channel() {
        let patch = solid_patch(8, [255, 0, 128]);
        let image = color_space::convert_patch(&patch, ColorSpace::Rgb);
        let hist = color_histogram(&image, 4);
        assert_eq!(hist.len(), 12);
        // 1.0 falls into the last bin
        assert_eq!(hist[3], 64.0);
        assert_eq!(hist[4], 64.0);
        assert_eq!(hist[8 + 2], 64.0);
        assert_eq!(hist.iter().sum::<f32>(), 3.0 * 64.0);
    }

    #[test]
    fn test_bin_spatial_keeps_uniform_values() {
        let patch = solid_patch(64, [51, 102, 204]);
        let image = color_space::convert_patch(&patch, ColorSpace::Rgb);
        let out = bin_spatial(&image, 16);
        assert_eq!(out.len(), 16 * 16 * 3);
        assert!((out[0] - 0.2).abs() < 1e-5);
        assert!((out[1] - 0.4).abs() < 1e-5);
        assert!((out[2] - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_bin_spatial_blends_alternating_columns() {
        let mut data = Vec::with_capacity(64 * 64 * 3);
        for _y in 0..64 {
            for x in 0..64 {
                let v = if x % 2 == 0 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let patch = Patch { data, size: 64 };
        let image = color_space::convert_patch(&patch, ColorSpace::Rgb);
        let out = bin_spatial(&image, 32);
        assert_eq!(out.len(), 32 * 32 * 3);
        assert!(out.iter().all(|v| (v - 0.5).abs() < 1e-5), "{:?}", &out[..6]);
    }

    #[test]
    fn test_hog_channel_serde() {
        let params: FeatureParams =
            serde_json::from_str(r#"{"hog_channel": "ALL", "color_space": "HLS"}"#).unwrap();
        assert_eq!(params.hog_channel, HogChannel::All);
        assert_eq!(params.color_space, ColorSpace::Hls);
        assert_eq!(params.orient, 8);

        let params: FeatureParams = serde_json::from_str(r#"{"hog_channel": 2}"#).unwrap();
        assert_eq!(params.hog_channel, HogChannel::Single(2));

        assert!(serde_json::from_str::<FeatureParams>(r#"{"hog_channel": 3}"#).is_err());
    }
}
