use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::core::errors::{ErrorCode, NewsvecError, Result};
use crate::vector::distance::{hamming_distance, DistanceMetric};
use crate::vector::normalization::validate_vector;
use super::binary_quant::BinaryQuantizer;
use super::codec::CodecSpec;
use super::pq::{PQTrainer, ProductQuantizer};
use super::scalar_quant::ScalarQuantizer;

/// Fixed-width encoding of a raw vector under the corpus codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantizedVector {
    Float32(Vec<f32>),
    Int8(Vec<i8>),
    Binary(Vec<u8>),
    Product(Vec<u8>),
}

impl QuantizedVector {
    pub fn kind(&self) -> &'static str {
        match self {
            QuantizedVector::Float32(_) => "f32",
            QuantizedVector::Int8(_) => "int8",
            QuantizedVector::Binary(_) => "binary",
            QuantizedVector::Product(_) => "pq",
        }
    }

    /// Number of stored codes (floats, bytes or centroid ids).
    pub fn len(&self) -> usize {
        match self {
            QuantizedVector::Float32(v) => v.len(),
            QuantizedVector::Int8(v) => v.len(),
            QuantizedVector::Binary(v) | QuantizedVector::Product(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trained codec state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Codec {
    Float32,
    Int8(ScalarQuantizer),
    Binary(BinaryQuantizer),
    Product(ProductQuantizer),
}

/// Encoder/decoder for one corpus: dimension, metric and codec are fixed for
/// the lifetime of a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantizer {
    dimension: usize,
    metric: DistanceMetric,
    spec: CodecSpec,
    codec: Codec,
}

impl Quantizer {
    /// Build a quantizer, training codec parameters from `sample` where the
    /// codec needs them.
    ///
    /// `int8` calibrates per-dimension ranges from the sample, or uses
    /// `[-1, 1]` when the sample is empty. `pq` requires a non-empty sample.
    pub fn train(
        spec: CodecSpec,
        dimension: usize,
        metric: DistanceMetric,
        sample: &[Vec<f32>],
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(NewsvecError::config("dimension must be > 0"));
        }
        match (spec, metric) {
            (CodecSpec::Binary, DistanceMetric::Hamming) => {}
            (CodecSpec::Binary, other) => {
                return Err(NewsvecError::config(format!(
                    "binary codec requires the hamming metric, got {}",
                    other
                )))
            }
            (other, DistanceMetric::Hamming) => {
                return Err(NewsvecError::config(format!(
                    "hamming metric requires the binary codec, got {}",
                    other
                )))
            }
            _ => {}
        }
        for v in sample {
            validate_vector(v, dimension)?;
        }

        let codec = match spec {
            CodecSpec::Float32 => Codec::Float32,
            CodecSpec::Binary => Codec::Binary(BinaryQuantizer::new(dimension)),
            CodecSpec::Int8 => Codec::Int8(
                ScalarQuantizer::train(sample)
                    .unwrap_or_else(|| ScalarQuantizer::unit_range(dimension)),
            ),
            CodecSpec::Product { subspaces, centroids } => {
                if dimension % subspaces != 0 {
                    return Err(NewsvecError::config(format!(
                        "PQ subspace count {} does not divide dimension {}",
                        subspaces, dimension
                    )));
                }
                if sample.is_empty() {
                    return Err(NewsvecError::codec("PQ codec needs a non-empty training sample"));
                }
                Codec::Product(PQTrainer::new(subspaces, centroids).train(sample, dimension))
            }
        };

        debug!(codec = %spec, dimension, metric = %metric, sample = sample.len(), "Trained quantizer");

        Ok(Quantizer {
            dimension,
            metric,
            spec,
            codec,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn spec(&self) -> CodecSpec {
        self.spec
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Encode a raw vector. Deterministic: the same input under the same
    /// parameters always yields identical codes.
    pub fn encode(&self, vector: &[f32]) -> Result<QuantizedVector> {
        validate_vector(vector, self.dimension)?;
        Ok(match &self.codec {
            Codec::Float32 => QuantizedVector::Float32(vector.to_vec()),
            Codec::Int8(sq) => QuantizedVector::Int8(sq.encode(vector)),
            Codec::Binary(bq) => QuantizedVector::Binary(bq.encode(vector)),
            Codec::Product(pq) => QuantizedVector::Product(pq.encode(vector)),
        })
    }

    /// Reconstruct an approximation of the raw vector.
    pub fn decode(&self, q: &QuantizedVector) -> Result<Vec<f32>> {
        self.check(q)?;
        match (&self.codec, q) {
            (Codec::Float32, QuantizedVector::Float32(v)) => Ok(v.clone()),
            (Codec::Int8(sq), QuantizedVector::Int8(codes)) => Ok(sq.decode(codes)),
            (Codec::Binary(bq), QuantizedVector::Binary(bits)) => Ok(bq.decode(bits)),
            (Codec::Product(pq), QuantizedVector::Product(codes)) => Ok(pq.decode(codes)),
            _ => Err(NewsvecError::CodecError {
                code: ErrorCode::InvalidQuantizedVector,
                message: format!("cannot decode {} codes", q.kind()),
            }),
        }
    }

    /// Verify that `q` was produced by this codec for this dimensionality.
    pub fn check(&self, q: &QuantizedVector) -> Result<()> {
        let expected_kind = match self.codec {
            Codec::Float32 => "f32",
            Codec::Int8(_) => "int8",
            Codec::Binary(_) => "binary",
            Codec::Product(_) => "pq",
        };
        if q.kind() != expected_kind {
            return Err(NewsvecError::CodecError {
                code: ErrorCode::InvalidQuantizedVector,
                message: format!("expected {} codes, got {}", expected_kind, q.kind()),
            });
        }
        let expected_len = match &self.codec {
            Codec::Float32 | Codec::Int8(_) => self.dimension,
            Codec::Binary(bq) => bq.packed_len(),
            Codec::Product(pq) => pq.subspaces(),
        };
        if q.len() != expected_len {
            return Err(NewsvecError::CodecError {
                code: ErrorCode::InvalidQuantizedVector,
                message: format!("expected {} codes, got {}", expected_len, q.len()),
            });
        }
        if let (Codec::Product(pq), QuantizedVector::Product(codes)) = (&self.codec, q) {
            if let Some((s, code)) = codes
                .iter()
                .enumerate()
                .find(|(s, code)| **code as usize >= pq.codebooks[*s].len())
            {
                return Err(NewsvecError::CodecError {
                    code: ErrorCode::InvalidQuantizedVector,
                    message: format!("PQ code {} out of range in subspace {}", code, s),
                });
            }
        }
        Ok(())
    }

    /// Distance between two quantized vectors under the corpus metric,
    /// computed directly over codes.
    ///
    /// Both operands must have passed [`Quantizer::check`]; mismatched
    /// variants compare as infinitely far apart.
    pub fn distance(&self, a: &QuantizedVector, b: &QuantizedVector) -> f32 {
        let metric = self.metric;
        match (&self.codec, a, b) {
            (Codec::Float32, QuantizedVector::Float32(x), QuantizedVector::Float32(y)) => {
                metric.distance(x, y)
            }
            (Codec::Int8(sq), QuantizedVector::Int8(x), QuantizedVector::Int8(y)) => metric
                .distance_pairs(
                    x.iter()
                        .zip(y.iter())
                        .enumerate()
                        .map(|(i, (cx, cy))| (sq.value(i, *cx), sq.value(i, *cy))),
                ),
            (Codec::Binary(_), QuantizedVector::Binary(x), QuantizedVector::Binary(y)) => {
                hamming_distance(x, y) as f32
            }
            (Codec::Product(pq), QuantizedVector::Product(x), QuantizedVector::Product(y)) => {
                metric.distance_pairs(pq.components(x).zip(pq.components(y)))
            }
            _ => f32::INFINITY,
        }
    }

    /// Upper bound on per-dimension reconstruction error for in-range inputs.
    ///
    /// `None` for codecs without a per-component bound: binary keeps only the
    /// sign of each component, PQ error depends on the training sample.
    pub fn error_bound(&self) -> Option<f32> {
        match &self.codec {
            Codec::Float32 => Some(0.0),
            Codec::Int8(sq) => Some(sq.max_error()),
            Codec::Binary(_) | Codec::Product(_) => None,
        }
    }
}
