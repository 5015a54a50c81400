pub mod distance;
pub mod normalization;

pub use distance::DistanceMetric;
