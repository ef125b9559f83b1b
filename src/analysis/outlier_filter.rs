// src/analysis/outlier_filter.rs
//
// Rejects heatmap blobs too small to be a vehicle at their distance.
// Boxes starting above the horizon row are far away and may be small;
// boxes starting at or below it must be larger.

use crate::types::{BBox, FilterConfig};

pub fn is_plausible(b: &BBox, cfg: &FilterConfig) -> bool {
    let min_size = if b.y1 < cfg.horizon_y {
        cfg.far_min_size
    } else {
        cfg.near_min_size
    };
    b.width() > min_size && b.height() > min_size
}

pub fn remove_outliers(boxes: Vec<BBox>, cfg: &FilterConfig) -> Vec<BBox> {
    boxes.into_iter().filter(|b| is_plausible(b, cfg)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_far_boxes_need_32px() {
        let cfg = FilterConfig::default();
        assert!(is_plausible(&BBox::new(100, 400, 140, 440), &cfg));
        assert!(!is_plausible(&BBox::new(100, 400, 132, 440), &cfg));
    }

    #[test]
    fn test_near_boxes_need_64px() {
        let cfg = FilterConfig::default();
        assert!(!is_plausible(&BBox::new(100, 460, 150, 510), &cfg));
        assert!(is_plausible(&BBox::new(100, 460, 170, 530), &cfg));
        // horizon row itself counts as near
        assert!(!is_plausible(&BBox::new(100, 450, 150, 500), &cfg));
    }

    #[test]
    fn test_remove_outliers_keeps_order() {
        let cfg = FilterConfig::default();
        let boxes = vec![
            BBox::new(0, 400, 50, 450),
            BBox::new(0, 400, 10, 410),
            BBox::new(500, 500, 600, 600),
        ];
        assert_eq!(
            remove_outliers(boxes, &cfg),
            vec![BBox::new(0, 400, 50, 450), BBox::new(500, 500, 600, 600)]
        );
    }
}
