use serde::{Deserialize, Serialize};
use crate::vector::normalization::calibration_ranges;

/// Number of code points between the calibrated min and max.
const LEVELS: f32 = 255.0;

/// Calibrated scalar quantization: compress each dimension to one signed byte.
///
/// `code = round((x - min) / step) - 128` with `step = (max - min) / 255`,
/// clamped into `i8`. Values outside the calibration range saturate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarQuantizer {
    mins: Vec<f32>,
    steps: Vec<f32>,
}

impl ScalarQuantizer {
    /// Create a new scalar quantizer with given bounds.
    pub fn new(mins: Vec<f32>, maxs: Vec<f32>) -> Self {
        debug_assert_eq!(mins.len(), maxs.len());
        let steps = mins
            .iter()
            .zip(maxs.iter())
            .map(|(min, max)| ((max - min) / LEVELS).max(0.0))
            .collect();
        ScalarQuantizer { mins, steps }
    }

    /// Fixed `[-1, 1]` range on every dimension, which covers unit-normalized
    /// embeddings without a calibration sample.
    pub fn unit_range(dimension: usize) -> Self {
        Self::new(vec![-1.0; dimension], vec![1.0; dimension])
    }

    /// Train quantizer from vectors (compute min/max per dimension).
    pub fn train(vectors: &[Vec<f32>]) -> Option<Self> {
        calibration_ranges(vectors).map(|(mins, maxs)| Self::new(mins, maxs))
    }

    pub fn dimension(&self) -> usize {
        self.mins.len()
    }

    /// Encode a vector to one i8 per dimension.
    pub fn encode(&self, vector: &[f32]) -> Vec<i8> {
        vector
            .iter()
            .zip(self.mins.iter().zip(self.steps.iter()))
            .map(|(val, (min, step))| {
                if *step == 0.0 {
                    i8::MIN
                } else {
                    let level = ((val - min) / step).round().clamp(0.0, LEVELS);
                    (level as i32 - 128) as i8
                }
            })
            .collect()
    }

    /// Decode an i8 vector back to f32.
    pub fn decode(&self, codes: &[i8]) -> Vec<f32> {
        codes
            .iter()
            .enumerate()
            .map(|(i, code)| self.value(i, *code))
            .collect()
    }

    /// Reconstructed value of a single component.
    #[inline]
    pub fn value(&self, dim: usize, code: i8) -> f32 {
        self.mins[dim] + (code as i32 + 128) as f32 * self.steps[dim]
    }

    /// Worst-case per-dimension reconstruction error for in-range inputs.
    pub fn max_error(&self) -> f32 {
        self.steps.iter().fold(0.0_f32, |acc, s| acc.max(s / 2.0))
    }
}
