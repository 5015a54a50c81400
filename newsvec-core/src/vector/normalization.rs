use crate::core::errors::{NewsvecError, Result};

/// Check a raw vector against the corpus dimensionality and reject
/// non-finite components.
pub fn validate_vector(data: &[f32], dimension: usize) -> Result<()> {
    if data.len() != dimension {
        return Err(NewsvecError::DimensionMismatch {
            expected: dimension,
            got: data.len(),
        });
    }
    if let Some((i, val)) = data.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(NewsvecError::InvalidVector(format!(
            "non-finite value at dimension {}: {}",
            i, val
        )));
    }
    Ok(())
}

/// Per-dimension (min, max) over a sample, used to calibrate scalar codecs.
pub fn calibration_ranges(vectors: &[Vec<f32>]) -> Option<(Vec<f32>, Vec<f32>)> {
    let dim = vectors.first()?.len();
    let mut mins = vec![f32::MAX; dim];
    let mut maxs = vec![f32::MIN; dim];

    for v in vectors {
        for (i, &val) in v.iter().enumerate().take(dim) {
            mins[i] = mins[i].min(val);
            maxs[i] = maxs[i].max(val);
        }
    }

    Some((mins, maxs))
}
