// src/analysis/mod.rs
//
// Post-heatmap analysis.
//
// Signal flow:
//   Label boxes → outlier_filter → vehicle_tracker → confirmed vehicles

pub mod outlier_filter;
pub mod vehicle_tracker;

pub use outlier_filter::remove_outliers;
pub use vehicle_tracker::{BoxTracker, VehicleSnapshot};
