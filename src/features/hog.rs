// src/features/hog.rs
//
// Histogram of oriented gradients over a single float channel.
//
//   gradients  : central differences, zero on the border rows/columns
//   orientation: unsigned, [0, 180) degrees
//   cells      : magnitude summed per orientation bin, divided by cell area
//   blocks     : cells_per_block^2 cells, L2-Hys normalized (clip 0.2)
//   output     : blocks row-major, then cell row, cell col, orientation

use ndarray::{Array3, ArrayView2};

const EPS: f32 = 1e-5;
const L2HYS_CLIP: f32 = 0.2;

#[derive(Debug, Clone, Copy)]
pub struct HogParams {
    pub orientations: usize,
    pub pix_per_cell: usize,
    pub cells_per_block: usize,
}

impl HogParams {
    fn cells(&self, height: usize, width: usize) -> (usize, usize) {
        if self.pix_per_cell == 0 {
            return (0, 0);
        }
        (height / self.pix_per_cell, width / self.pix_per_cell)
    }

    fn blocks(&self, height: usize, width: usize) -> (usize, usize) {
        let (cy, cx) = self.cells(height, width);
        if self.cells_per_block == 0 || cy < self.cells_per_block || cx < self.cells_per_block {
            return (0, 0);
        }
        (cy - self.cells_per_block + 1, cx - self.cells_per_block + 1)
    }

    /// Descriptor length for an image of the given size
    pub fn descriptor_len(&self, height: usize, width: usize) -> usize {
        let (by, bx) = self.blocks(height, width);
        by * bx * self.cells_per_block * self.cells_per_block * self.orientations
    }
}

pub fn hog(channel: ArrayView2<f32>, params: &HogParams) -> Vec<f32> {
    let (height, width) = channel.dim();
    let (by, bx) = params.blocks(height, width);
    if by == 0 || bx == 0 || params.orientations == 0 {
        return Vec::new();
    }

    let cells = cell_histograms(channel, params);
    let cpb = params.cells_per_block;
    let orient = params.orientations;

    let mut out = Vec::with_capacity(params.descriptor_len(height, width));
    let mut block = Vec::with_capacity(cpb * cpb * orient);

    for r in 0..by {
        for c in 0..bx {
            block.clear();
            for cr in r..r + cpb {
                for cc in c..c + cpb {
                    for o in 0..orient {
                        block.push(cells[[cr, cc, o]]);
                    }
                }
            }
            normalize_l2_hys(&mut block);
            out.extend_from_slice(&block);
        }
    }

    out
}

fn cell_histograms(channel: ArrayView2<f32>, params: &HogParams) -> Array3<f32> {
    let (height, width) = channel.dim();
    let (cy, cx) = params.cells(height, width);
    let ppc = params.pix_per_cell;
    let orient = params.orientations;
    let bin_width = 180.0 / orient as f32;

    let mut hist = Array3::<f32>::zeros((cy, cx, orient));

    for y in 0..cy * ppc {
        for x in 0..cx * ppc {
            let g_row = if y == 0 || y + 1 >= height {
                0.0
            } else {
                channel[[y + 1, x]] - channel[[y - 1, x]]
            };
            let g_col = if x == 0 || x + 1 >= width {
                0.0
            } else {
                channel[[y, x + 1]] - channel[[y, x - 1]]
            };

            let magnitude = g_row.hypot(g_col);
            if magnitude == 0.0 {
                continue;
            }
            let angle = g_row.atan2(g_col).to_degrees().rem_euclid(180.0);
            let bin = ((angle / bin_width) as usize).min(orient - 1);

            hist[[y / ppc, x / ppc, bin]] += magnitude;
        }
    }

    let cell_area = (ppc * ppc) as f32;
    hist.mapv_inplace(|v| v / cell_area);
    hist
}

fn normalize_l2_hys(block: &mut [f32]) {
    let norm = (block.iter().map(|v| v * v).sum::<f32>() + EPS * EPS).sqrt();
    for v in block.iter_mut() {
        *v = (*v / norm).min(L2HYS_CLIP);
    }
    let norm = (block.iter().map(|v| v * v).sum::<f32>() + EPS * EPS).sqrt();
    for v in block.iter_mut() {
        *v /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn params() -> HogParams {
        HogParams {
            orientations: 8,
            pix_per_cell: 4,
            cells_per_block: 2,
        }
    }

    #[test]
    fn test_descriptor_len_for_default_patch() {
        assert_eq!(params().descriptor_len(64, 64), 15 * 15 * 4 * 8);
        let out = hog(Array2::<f32>::zeros((64, 64)).view(), &params());
        assert_eq!(out.len(), 7200);
    }

    #[test]
    fn test_flat_image_has_zero_descriptor() {
        let img = Array2::<f32>::from_elem((16, 16), 0.4);
        let out = hog(img.view(), &params());
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_vertical_edge_lands_in_horizontal_gradient_bin() {
        // Left half dark, right half bright: gradient points along +x (0 degrees)
        let img = Array2::from_shape_fn((16, 16), |(_, x)| if x < 8 { 0.0 } else { 1.0 });
        let out = hog(img.view(), &params());

        let orient = 8;
        let mut bins = vec![0.0f32; orient];
        for (i, v) in out.iter().enumerate() {
            bins[i % orient] += v;
        }
        let best = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(best, 0);
        assert!(bins[1..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_blocks_are_clipped_and_normalized() {
        let img = Array2::from_shape_fn((8, 8), |(y, x)| ((x * 7 + y * 3) % 5) as f32 / 4.0);
        let out = hog(img.view(), &params());
        assert_eq!(out.len(), 4 * 8);
        let norm: f32 = out.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_too_small_image_gives_empty_descriptor() {
        let img = Array2::<f32>::zeros((6, 6));
        assert!(hog(img.view(), &params()).is_empty());
    }
}
