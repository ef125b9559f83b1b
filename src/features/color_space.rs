// src/features/color_space.rs
//
// RGB -> feature color space conversion. Channels are scaled to [0, 1],
// except YUV/YCrCb chroma which keeps the unsaturated float range
// (V of pure red is ~1.115).

use crate::preprocessing::Patch;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "HSV")]
    Hsv,
    #[serde(rename = "LUV")]
    Luv,
    #[serde(rename = "HLS")]
    Hls,
    #[serde(rename = "YUV")]
    Yuv,
    #[serde(rename = "YCrCb")]
    YCrCb,
}

/// Float image `(height, width, 3)` in the target color space
pub type ChannelImage = Array3<f32>;

pub fn convert_patch(patch: &Patch, space: ColorSpace) -> ChannelImage {
    let n = patch.size;
    let mut out = Array3::<f32>::zeros((n, n, 3));
    for y in 0..n {
        for x in 0..n {
            let [r, g, b] = patch.pixel(x, y);
            let converted = convert_pixel(
                r as f32 / 255.0,
                g as f32 / 255.0,
                b as f32 / 255.0,
                space,
            );
            for (c, v) in converted.into_iter().enumerate() {
                out[[y, x, c]] = v;
            }
        }
    }
    out
}

pub fn convert_pixel(r: f32, g: f32, b: f32, space: ColorSpace) -> [f32; 3] {
    match space {
        ColorSpace::Rgb => [r, g, b],
        ColorSpace::Hsv => {
            let (h, max, min) = hue(r, g, b);
            let s = if max > 0.0 { (max - min) / max } else { 0.0 };
            [h, s, max]
        }
        ColorSpace::Hls => {
            let (h, max, min) = hue(r, g, b);
            let l = (max + min) / 2.0;
            let diff = max - min;
            let s = if diff <= f32::EPSILON {
                0.0
            } else if l < 0.5 {
                diff / (max + min)
            } else {
                diff / (2.0 - max - min)
            };
            [h, l, s]
        }
        ColorSpace::Yuv => {
            let y = luma(r, g, b);
            let u = 0.492 * (b - y) + 0.5;
            let v = 0.877 * (r - y) + 0.5;
            [y, u, v]
        }
        ColorSpace::YCrCb => {
            let y = luma(r, g, b);
            let cr = 0.713 * (r - y) + 0.5;
            let cb = 0.564 * (b - y) + 0.5;
            [y, cr, cb]
        }
        ColorSpace::Luv => luv(r, g, b),
    }
}

fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Hue scaled to [0, 1) plus the channel max/min
fn hue(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = max - min;
    if diff <= f32::EPSILON {
        return (0.0, max, min);
    }
    let mut h = if max == r {
        60.0 * (g - b) / diff
    } else if max == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    ((h / 360.0).min(1.0 - f32::EPSILON), max, min)
}

// D65 white point in u'v'
const UN: f32 = 0.197_939_43;
const VN: f32 = 0.468_310_96;

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn luv(r: f32, g: f32, b: f32) -> [f32; 3] {
    let (r, g, b) = (srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b));
    let x = 0.412_453 * r + 0.357_580 * g + 0.180_423 * b;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = 0.019_334 * r + 0.119_193 * g + 0.950_227 * b;

    let l = if y > 0.008_856 {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    };

    let denom = x + 15.0 * y + 3.0 * z;
    let (u, v) = if denom > f32::EPSILON {
        let up = 4.0 * x / denom;
        let vp = 9.0 * y / denom;
        (13.0 * l * (up - UN), 13.0 * l * (vp - VN))
    } else {
        (0.0, 0.0)
    };

    // L in [0, 100], u in [-134, 220], v in [-140, 122]
    [
        (l / 100.0).clamp(0.0, 1.0),
        ((u + 134.0) / 354.0).clamp(0.0, 1.0),
        ((v + 140.0) / 262.0).clamp(0.0, 1.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-3)
    }

    #[test]
    fn test_gray_has_neutral_chroma() {
        for space in [ColorSpace::Yuv, ColorSpace::YCrCb] {
            let out = convert_pixel(0.5, 0.5, 0.5, space);
            assert!(close(out, [0.5, 0.5, 0.5]), "{:?} -> {:?}", space, out);
        }
    }

    #[test]
    fn test_saturated_primaries_keep_chroma_overshoot() {
        let red = convert_pixel(1.0, 0.0, 0.0, ColorSpace::Yuv);
        assert!(close(red, [0.299, 0.3529, 1.1148]), "{:?}", red);

        let green = convert_pixel(0.0, 1.0, 0.0, ColorSpace::Yuv);
        assert!((green[2] + 0.0148).abs() < 1e-3, "{:?}", green);

        // distinct reds no longer collapse onto one V value
        let dark_red = convert_pixel(0.9, 0.0, 0.0, ColorSpace::Yuv);
        assert!(dark_red[2] < red[2] && dark_red[2] > 1.0);

        let cr = convert_pixel(1.0, 0.0, 0.0, ColorSpace::YCrCb)[1];
        assert!((cr - 0.9998).abs() < 1e-3, "{}", cr);
    }

    #[test]
    fn test_hsv_primaries() {
        assert!(close(convert_pixel(1.0, 0.0, 0.0, ColorSpace::Hsv), [0.0, 1.0, 1.0]));
        assert!(close(
            convert_pixel(0.0, 1.0, 0.0, ColorSpace::Hsv),
            [1.0 / 3.0, 1.0, 1.0]
        ));
        assert!(close(
            convert_pixel(0.0, 0.0, 1.0, ColorSpace::Hsv),
            [2.0 / 3.0, 1.0, 1.0]
        ));
    }

    #[test]
    fn test_hls_white_and_black() {
        assert!(close(convert_pixel(1.0, 1.0, 1.0, ColorSpace::Hls), [0.0, 1.0, 0.0]));
        assert!(close(convert_pixel(0.0, 0.0, 0.0, ColorSpace::Hls), [0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_luv_white_is_full_lightness() {
        let out = convert_pixel(1.0, 1.0, 1.0, ColorSpace::Luv);
        assert!((out[0] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_non_chroma_spaces_stay_in_unit_range() {
        let spaces = [
            ColorSpace::Rgb,
            ColorSpace::Hsv,
            ColorSpace::Luv,
            ColorSpace::Hls,
        ];
        for space in spaces {
            for &(r, g, b) in &[(0.0, 0.0, 0.0), (1.0, 0.2, 0.7), (0.1, 0.9, 0.3), (1.0, 1.0, 0.0)] {
                let out = convert_pixel(r, g, b, space);
                assert!(out.iter().all(|v| (0.0..=1.0).contains(v)), "{:?} {:?}", space, out);
            }
        }
    }

    #[test]
    fn test_color_space_names_match_model_files() {
        let space: ColorSpace = serde_json::from_str("\"YCrCb\"").unwrap();
        assert_eq!(space, ColorSpace::YCrCb);
        assert_eq!(serde_json::to_string(&ColorSpace::Yuv).unwrap(), "\"YUV\"");
    }
}
