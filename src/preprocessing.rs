// src/preprocessing.rs

use crate::types::{BBox, Frame};

/// Square RGB patch cut out of a frame, resized to the classifier input size
#[derive(Debug, Clone)]
pub struct Patch {
    pub data: Vec<u8>,
    pub size: usize,
}

impl Patch {
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.size + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }
}

/// Crop `bbox` (clamped to the frame) and resize it to `size x size`.
/// Returns `None` when the clamped box is empty.
pub fn extract_patch(frame: &Frame, bbox: &BBox, size: usize) -> Option<Patch> {
    let b = bbox.clamp(frame.width as i32, frame.height as i32);
    if b.width() <= 0 || b.height() <= 0 || size == 0 {
        return None;
    }

    let (cw, ch) = (b.width() as usize, b.height() as usize);
    let mut crop = Vec::with_capacity(cw * ch * 3);
    for y in b.y1 as usize..b.y2 as usize {
        let start = (y * frame.width + b.x1 as usize) * 3;
        crop.extend_from_slice(&frame.data[start..start + cw * 3]);
    }

    let data = if cw == size && ch == size {
        crop
    } else {
        resize_bilinear(&crop, cw, ch, size, size)
    };

    Some(Patch { data, size })
}

/// Normalize [0, 255] -> [0, 1] and convert HWC -> CHW, appending to `out`
pub fn to_chw(patch: &Patch, out: &mut Vec<f32>) {
    let n = patch.size;
    for c in 0..3 {
        for h in 0..n {
            for w in 0..n {
                out.push(patch.data[(h * n + w) * 3 + c] as f32 / 255.0);
            }
        }
    }
}

/// Source taps `(i0, i1, weight of i1)` for each destination index of a
/// linear resize. Samples sit at pixel centers, `(d + 0.5) * ratio - 0.5`,
/// and are clamped at both borders.
pub fn linear_taps(src_len: usize, dst_len: usize) -> Vec<(usize, usize, f32)> {
    let ratio = src_len as f32 / dst_len as f32;
    (0..dst_len)
        .map(|d| {
            let s = (d as f32 + 0.5) * ratio - 0.5;
            if s <= 0.0 {
                return (0, 0, 0.0);
            }
            let s0 = s.floor() as usize;
            if s0 + 1 >= src_len {
                return (src_len - 1, src_len - 1, 0.0);
            }
            (s0, s0 + 1, s - s0 as f32)
        })
        .collect()
}

/// Bilinear image resize for interleaved images with `channels` per pixel
pub fn resize_bilinear_channels(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
    channels: usize,
) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * channels];

    let x_taps = linear_taps(src_w, dst_w);
    let y_taps = linear_taps(src_h, dst_h);

    for (dy, &(sy0, sy1, fy)) in y_taps.iter().enumerate() {
        for (dx, &(sx0, sx1, fx)) in x_taps.iter().enumerate() {
            for c in 0..channels {
                let p00 = src[(sy0 * src_w + sx0) * channels + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * channels + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * channels + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * channels + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * channels + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    dst
}

/// Bilinear resize of an RGB image
pub fn resize_bilinear(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<u8> {
    resize_bilinear_channels(src, src_w, src_h, dst_w, dst_h, 3)
}
