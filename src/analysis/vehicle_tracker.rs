// src/analysis/vehicle_tracker.rs
//
// Multi-frame vehicle tracker over heatmap boxes.
//
// Design:
//   - Greedy nearest-center matching, in vehicle creation order
//   - Each vehicle draws the mean of its last N boxes (jitter smoothing)
//   - Two vehicles claiming the same box means their blobs merged; the
//     later one is HIDDEN and keeps coasting on its average box
//   - Hidden vehicles re-attach to a nearby unclaimed box when the blobs
//     separate again, snapping their average to that box
//   - Vehicles unseen for too long, or hidden before they matured, are pruned

use crate::types::{BBox, TrackerConfig};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

// ============================================================================
// DISTANCE
// ============================================================================

/// Center distance between two boxes relative to their mean corner span
/// `sqrt(x1^2 + x2^2)`. Default match thresholds are tuned against this scale.
pub fn relative_distance(a: &BBox, b: &BBox) -> f32 {
    let span = |b: &BBox| ((b.x1 as f32).powi(2) + (b.x2 as f32).powi(2)).sqrt();
    let mean_span = (span(a) + span(b)) / 2.0;

    let (ax, ay) = a.center();
    let (bx, by) = b.center();
    let dist = (((ax - bx) as f32).powi(2) + ((ay - by) as f32).powi(2)).sqrt();

    if mean_span > 0.0 {
        dist / mean_span
    } else if dist == 0.0 {
        0.0
    } else {
        f32::INFINITY
    }
}

/// `(distance, index)` of the closest candidate; first wins on ties
pub fn closest_box<'a>(
    target: &BBox,
    candidates: impl IntoIterator<Item = (usize, &'a BBox)>,
) -> Option<(f32, usize)> {
    let mut best: Option<(f32, usize)> = None;
    for (idx, candidate) in candidates {
        let d = relative_distance(target, candidate);
        if best.map_or(true, |(bd, _)| d < bd) {
            best = Some((d, idx));
        }
    }
    best
}

// ============================================================================
// TRACKED VEHICLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct TrackedVehicle {
    pub id: u32,
    recent: VecDeque<BBox>,
    smoothing_frames: usize,
    /// Total boxes received
    pub hits: u32,
    pub avg_box: BBox,
    /// Frames since the last box
    pub last_seen: u32,
    /// Frames since creation
    pub age: u32,
    pub hidden: bool,
}

impl TrackedVehicle {
    fn new(id: u32, b: BBox, smoothing_frames: usize) -> Self {
        let mut vehicle = Self {
            id,
            recent: VecDeque::with_capacity(smoothing_frames),
            smoothing_frames: smoothing_frames.max(1),
            hits: 0,
            avg_box: b,
            last_seen: 0,
            age: 0,
            hidden: false,
        };
        vehicle.update(Some(b));
        vehicle
    }

    pub fn update(&mut self, b: Option<BBox>) {
        match b {
            Some(b) => {
                self.push(b);
                self.avg_box = mean_box(&self.recent);
                self.last_seen = 0;
            }
            None => self.last_seen += 1,
        }
        self.age += 1;
    }

    /// Re-attach a hidden vehicle. The smoothing window is filled with `b`,
    /// but the average only moves on the next `update`.
    pub fn unhide(&mut self, b: BBox) {
        if !self.hidden {
            return;
        }
        for _ in 0..self.smoothing_frames {
            self.push(b);
        }
        self.hidden = false;
    }

    fn push(&mut self, b: BBox) {
        self.recent.push_back(b);
        while self.recent.len() > self.smoothing_frames {
            self.recent.pop_front();
        }
        self.hits += 1;
    }

    /// Box to draw: the average, shrunk while the vehicle is hidden
    pub fn display_box(&self, hidden_inset_px: i32) -> BBox {
        if self.hidden {
            self.avg_box.inset(hidden_inset_px)
        } else {
            self.avg_box
        }
    }
}

fn mean_box(boxes: &VecDeque<BBox>) -> BBox {
    let n = boxes.len().max(1) as f64;
    let sum = boxes.iter().fold([0i64; 4], |acc, b| {
        [
            acc[0] + b.x1 as i64,
            acc[1] + b.y1 as i64,
            acc[2] + b.x2 as i64,
            acc[3] + b.y2 as i64,
        ]
    });
    BBox::new(
        (sum[0] as f64 / n).floor() as i32,
        (sum[1] as f64 / n).floor() as i32,
        (sum[2] as f64 / n).floor() as i32,
        (sum[3] as f64 / n).floor() as i32,
    )
}

/// Serializable view of a vehicle for per-frame reports
#[derive(Debug, Clone, Serialize)]
pub struct VehicleSnapshot {
    pub id: u32,
    #[serde(rename = "box")]
    pub bbox: BBox,
    pub hidden: bool,
    pub hits: u32,
    pub age: u32,
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct BoxTracker {
    config: TrackerConfig,
    vehicles: Vec<TrackedVehicle>,
    next_id: u32,
}

impl BoxTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            vehicles: Vec::new(),
            next_id: 1,
        }
    }

    pub fn vehicles(&self) -> &[TrackedVehicle] {
        &self.vehicles
    }

    /// Vehicles with enough history to be drawn and counted
    pub fn confirmed(&self) -> impl Iterator<Item = &TrackedVehicle> {
        let min_age = self.config.min_age;
        self.vehicles.iter().filter(move |v| v.hits > min_age)
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed().count()
    }

    pub fn snapshot(&self) -> Vec<VehicleSnapshot> {
        let inset = self.config.hidden_inset_px;
        self.confirmed()
            .map(|v| VehicleSnapshot {
                id: v.id,
                bbox: v.display_box(inset),
                hidden: v.hidden,
                hits: v.hits,
                age: v.age,
            })
            .collect()
    }

    /// Advance one frame with this frame's filtered boxes
    pub fn update(&mut self, boxes: &[BBox]) {
        let mut claimed = vec![false; boxes.len()];

        if boxes.is_empty() {
            for vehicle in &mut self.vehicles {
                vehicle.update(None);
            }
        } else {
            self.match_vehicles(boxes, &mut claimed);
            self.unhide_if_applicable(boxes, &mut claimed);
            self.create_new_vehicles(boxes, &claimed);
        }

        self.remove_lost_vehicles();
    }

    pub fn reset(&mut self) {
        self.vehicles.clear();
        self.next_id = 1;
    }

    fn match_vehicles(&mut self, boxes: &[BBox], claimed: &mut [bool]) {
        let threshold = self.config.match_distance;
        for vehicle in &mut self.vehicles {
            match closest_box(&vehicle.avg_box, boxes.iter().enumerate()) {
                Some((dist, idx)) if dist < threshold => {
                    if claimed[idx] {
                        debug!("Vehicle {} merged into a shared box, hiding", vehicle.id);
                        vehicle.hidden = true;
                    }
                    vehicle.update(Some(boxes[idx]));
                    claimed[idx] = true;
                }
                _ => vehicle.update(None),
            }
        }
    }

    fn unhide_if_applicable(&mut self, boxes: &[BBox], claimed: &mut [bool]) {
        let threshold = self.config.unhide_factor * self.config.match_distance;
        // candidates are fixed before any vehicle unhides
        let unclaimed: Vec<usize> = (0..boxes.len()).filter(|&idx| !claimed[idx]).collect();
        if unclaimed.is_empty() {
            return;
        }

        for vehicle in self.vehicles.iter_mut().filter(|v| v.hidden) {
            let candidates = unclaimed.iter().map(|&idx| (idx, &boxes[idx]));
            if let Some((dist, idx)) = closest_box(&vehicle.avg_box, candidates) {
                if dist < threshold {
                    debug!("Vehicle {} separated again, unhiding", vehicle.id);
                    vehicle.unhide(boxes[idx]);
                    claimed[idx] = true;
                }
            }
        }
    }

    fn create_new_vehicles(&mut self, boxes: &[BBox], claimed: &[bool]) {
        for (b, _) in boxes.iter().zip(claimed).filter(|(_, c)| !**c) {
            let id = self.next_id;
            self.next_id += 1;
            self.vehicles
                .push(TrackedVehicle::new(id, *b, self.config.smoothing_frames));
        }
    }

    fn remove_lost_vehicles(&mut self) {
        let max_last_seen = self.config.max_last_seen;
        let min_age = self.config.min_age;
        let before = self.vehicles.len();
        self.vehicles
            .retain(|v| v.last_seen < max_last_seen && !(v.hidden && v.age < min_age));
        if self.vehicles.len() < before {
            debug!("Pruned {} vehicle(s)", before - self.vehicles.len());
        }
    }
}
