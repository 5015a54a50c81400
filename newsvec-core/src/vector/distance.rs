use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::core::errors::NewsvecError;

/// Compute L2 (Euclidean) distance between two vectors.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(
        a.len(),
        b.len(),
        "Vectors must have the same dimension"
    );
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Compute cosine distance (1 - cosine_similarity) between two vectors.
/// Zero vectors are at distance 1 from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(
        a.len(),
        b.len(),
        "Vectors must have the same dimension"
    );
    DistanceMetric::Cosine.distance_pairs(a.iter().copied().zip(b.iter().copied()))
}

/// Compute inner product.
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(
        a.len(),
        b.len(),
        "Vectors must have the same dimension"
    );
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Number of differing bits between two packed bit strings.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum()
}

/// Corpus-wide distance metric, fixed when the corpus is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMetric {
    Euclidean,
    Cosine,
    /// Negated dot product so that smaller is closer.
    InnerProduct,
    /// Count of sign disagreements. Only valid with the binary codec.
    Hamming,
}

impl DistanceMetric {
    /// Compute distance using the specified metric.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Euclidean => l2_distance(a, b),
            DistanceMetric::InnerProduct => -inner_product(a, b),
            _ => self.distance_pairs(a.iter().copied().zip(b.iter().copied())),
        }
    }

    /// Compute distance over a stream of component pairs.
    ///
    /// Codecs feed decoded components through this one at a time so stored
    /// vectors never have to be materialized during a scan.
    pub fn distance_pairs<I>(&self, pairs: I) -> f32
    where
        I: IntoIterator<Item = (f32, f32)>,
    {
        let mut acc = PairAccumulator::default();
        for (x, y) in pairs {
            acc.push(x, y);
        }
        acc.finish(*self)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::InnerProduct => "inner-product",
            DistanceMetric::Hamming => "hamming",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = NewsvecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "cosine" | "cos" => Ok(DistanceMetric::Cosine),
            "inner-product" | "ip" | "dot" => Ok(DistanceMetric::InnerProduct),
            "hamming" => Ok(DistanceMetric::Hamming),
            other => Err(NewsvecError::config(format!("unknown distance metric '{}'", other))),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PairAccumulator {
    dot: f32,
    norm_a: f32,
    norm_b: f32,
    sq_diff: f32,
    sign_diff: u32,
}

impl PairAccumulator {
    #[inline]
    fn push(&mut self, x: f32, y: f32) {
        self.dot += x * y;
        self.norm_a += x * x;
        self.norm_b += y * y;
        self.sq_diff += (x - y) * (x - y);
        if (x > 0.0) != (y > 0.0) {
            self.sign_diff += 1;
        }
    }

    fn finish(self, metric: DistanceMetric) -> f32 {
        match metric {
            DistanceMetric::Euclidean => self.sq_diff.sqrt(),
            DistanceMetric::InnerProduct => -self.dot,
            DistanceMetric::Hamming => self.sign_diff as f32,
            DistanceMetric::Cosine => {
                let denom = (self.norm_a * self.norm_b).sqrt();
                if denom == 0.0 {
                    1.0
                } else {
                    1.0 - (self.dot / denom).clamp(-1.0, 1.0)
                }
            }
        }
    }
}
