// src/heatmap.rs
//
// Heat accumulation over positive windows, thresholding and
// connected-component labeling.

use crate::types::BBox;
use ndarray::Array2;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Heatmap {
    heat: Array2<f32>,
}

impl Heatmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            heat: Array2::zeros((height, width)),
        }
    }

    pub fn width(&self) -> usize {
        self.heat.ncols()
    }

    pub fn height(&self) -> usize {
        self.heat.nrows()
    }

    #[cfg(test)]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.heat[[y, x]]
    }

    pub fn max(&self) -> f32 {
        self.heat.iter().copied().fold(0.0, f32::max)
    }

    /// +1 for every pixel inside each box (x2/y2 exclusive)
    pub fn add_heat(&mut self, boxes: &[BBox]) {
        let (w, h) = (self.width() as i32, self.height() as i32);
        for b in boxes {
            let c = b.clamp(w, h);
            for y in c.y1..c.y2 {
                for x in c.x1..c.x2 {
                    self.heat[[y as usize, x as usize]] += 1.0;
                }
            }
        }
    }

    /// Zero every pixel at or below `threshold`
    pub fn apply_threshold(&mut self, threshold: f32) {
        self.heat.mapv_inplace(|v| if v <= threshold { 0.0 } else { v });
    }

    pub fn clip(&mut self, max: f32) {
        self.heat.mapv_inplace(|v| v.clamp(0.0, max));
    }

    /// 4-connected components of non-zero pixels, numbered in raster order
    pub fn label(&self) -> Labels {
        let (h, w) = self.heat.dim();
        let mut map = Array2::<u32>::zeros((h, w));
        let mut count = 0u32;
        let mut queue = VecDeque::new();

        for y in 0..h {
            for x in 0..w {
                if self.heat[[y, x]] <= 0.0 || map[[y, x]] != 0 {
                    continue;
                }
                count += 1;
                map[[y, x]] = count;
                queue.push_back((y, x));

                while let Some((cy, cx)) = queue.pop_front() {
                    let neighbors = [
                        (cy.wrapping_sub(1), cx),
                        (cy + 1, cx),
                        (cy, cx.wrapping_sub(1)),
                        (cy, cx + 1),
                    ];
                    for (ny, nx) in neighbors {
                        if ny < h && nx < w && map[[ny, nx]] == 0 && self.heat[[ny, nx]] > 0.0 {
                            map[[ny, nx]] = count;
                            queue.push_back((ny, nx));
                        }
                    }
                }
            }
        }

        Labels { map, count }
    }

    /// Heat scaled so the hottest pixel is white
    pub fn to_gray(&self) -> Vec<u8> {
        let max = self.max();
        if max <= 0.0 {
            return vec![0; self.heat.len()];
        }
        self.heat
            .iter()
            .map(|v| (v / max * 255.0).round() as u8)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Labels {
    map: Array2<u32>,
    count: u32,
}

impl Labels {
    #[cfg(test)]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[cfg(test)]
    pub fn label_at(&self, x: usize, y: usize) -> u32 {
        self.map[[y, x]]
    }

    /// `(min x, min y, max x, max y)` of every label, in label order
    pub fn bounding_boxes(&self) -> Vec<BBox> {
        let n = self.count as usize;
        let mut boxes: Vec<Option<BBox>> = vec![None; n];

        for ((y, x), &label) in self.map.indexed_iter() {
            if label == 0 {
                continue;
            }
            let (x, y) = (x as i32, y as i32);
            let slot = &mut boxes[label as usize - 1];
            *slot = Some(match *slot {
                None => BBox::new(x, y, x, y),
                Some(b) => BBox::new(b.x1.min(x), b.y1.min(y), b.x2.max(x), b.y2.max(y)),
            });
        }

        boxes.into_iter().flatten().collect()
    }
}
