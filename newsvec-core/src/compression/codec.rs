use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::core::errors::NewsvecError;

/// Default centroids per PQ subspace; one byte per code.
pub const DEFAULT_PQ_CENTROIDS: usize = 256;

/// Codec parameters chosen at corpus creation or by `recode`.
///
/// Parses from `f32`, `int8`, `binary`, `pq:M` and `pq:MxK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodecSpec {
    Float32,
    Int8,
    Binary,
    Product { subspaces: usize, centroids: usize },
}

impl CodecSpec {
    /// Bytes per encoded vector of the given dimension.
    pub fn encoded_len(&self, dimension: usize) -> usize {
        match self {
            CodecSpec::Float32 => dimension * 4,
            CodecSpec::Int8 => dimension,
            CodecSpec::Binary => (dimension + 7) / 8,
            CodecSpec::Product { subspaces, .. } => *subspaces,
        }
    }

    /// Compute compression ratio against raw f32 storage.
    pub fn compression_ratio(&self, dimension: usize) -> f32 {
        let compressed = self.encoded_len(dimension);
        if compressed == 0 {
            1.0
        } else {
            (dimension * 4) as f32 / compressed as f32
        }
    }
}

impl fmt::Display for CodecSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecSpec::Float32 => f.write_str("f32"),
            CodecSpec::Int8 => f.write_str("int8"),
            CodecSpec::Binary => f.write_str("binary"),
            CodecSpec::Product { subspaces, centroids } => {
                write!(f, "pq:{}x{}", subspaces, centroids)
            }
        }
    }
}

impl FromStr for CodecSpec {
    type Err = NewsvecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "f32" | "float32" => return Ok(CodecSpec::Float32),
            "int8" | "i8" => return Ok(CodecSpec::Int8),
            "binary" | "bin" => return Ok(CodecSpec::Binary),
            _ => {}
        }

        let params = s
            .strip_prefix("pq:")
            .ok_or_else(|| NewsvecError::config(format!("unknown codec '{}'", s)))?;
        let (m, k) = match params.split_once('x') {
            Some((m, k)) => (m, Some(k)),
            None => (params, None),
        };
        let subspaces: usize = m
            .parse()
            .map_err(|_| NewsvecError::config(format!("invalid PQ subspace count '{}'", m)))?;
        let centroids: usize = match k {
            Some(k) => k
                .parse()
                .map_err(|_| NewsvecError::config(format!("invalid PQ centroid count '{}'", k)))?,
            None => DEFAULT_PQ_CENTROIDS,
        };
        if subspaces == 0 || centroids == 0 || centroids > 256 {
            return Err(NewsvecError::config(format!(
                "PQ needs subspaces >= 1 and 1..=256 centroids, got {}x{}",
                subspaces, centroids
            )));
        }
        Ok(CodecSpec::Product { subspaces, centroids })
    }
}
