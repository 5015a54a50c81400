use serde::{Deserialize, Serialize};

/// Binary quantization: compress each dimension to 1 bit.
///
/// Bit `i` is set when component `i` is strictly positive; bits are packed
/// LSB-first, eight dimensions per byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryQuantizer {
    dimension: usize,
}

impl BinaryQuantizer {
    /// Create a new binary quantizer.
    pub fn new(dimension: usize) -> Self {
        BinaryQuantizer { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Byte size of one packed vector.
    pub fn packed_len(&self) -> usize {
        (self.dimension + 7) / 8
    }

    /// Encode a vector to binary (packed bits).
    pub fn encode(&self, vector: &[f32]) -> Vec<u8> {
        let mut bytes = vec![0u8; self.packed_len()];

        for (i, &val) in vector.iter().enumerate().take(self.dimension) {
            if val > 0.0 {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }

        bytes
    }

    /// Decode a binary vector to a unit vector of `±1/sqrt(D)` components.
    pub fn decode(&self, data: &[u8]) -> Vec<f32> {
        let magnitude = if self.dimension == 0 {
            0.0
        } else {
            1.0 / (self.dimension as f32).sqrt()
        };

        (0..self.dimension)
            .map(|i| {
                let bit = data.get(i / 8).map_or(0, |byte| (byte >> (i % 8)) & 1);
                if bit == 1 { magnitude } else { -magnitude }
            })
            .collect()
    }
}
