//! Product quantization: split a vector into `M` equal subspaces and store
//! the index of the nearest trained centroid in each.

pub mod training;
pub mod encode;
pub mod decode;

use serde::{Deserialize, Serialize};

pub use training::PQTrainer;

/// Trained product quantizer. Codebooks are indexed as
/// `codebooks[subspace][centroid][component]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductQuantizer {
    pub codebooks: Vec<Vec<Vec<f32>>>,
    pub subvector_dim: usize,
}

impl ProductQuantizer {
    pub fn new(codebooks: Vec<Vec<Vec<f32>>>, subvector_dim: usize) -> Self {
        ProductQuantizer {
            codebooks,
            subvector_dim,
        }
    }

    pub fn subspaces(&self) -> usize {
        self.codebooks.len()
    }

    pub fn dimension(&self) -> usize {
        self.codebooks.len() * self.subvector_dim
    }
}
