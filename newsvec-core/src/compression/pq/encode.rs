use super::training::nearest_centroid;
use super::ProductQuantizer;

impl ProductQuantizer {
    /// Encode a vector to PQ codes, one centroid index per subspace.
    pub fn encode(&self, vector: &[f32]) -> Vec<u8> {
        self.codebooks
            .iter()
            .enumerate()
            .map(|(subvector_idx, codebook)| {
                let start = subvector_idx * self.subvector_dim;
                let end = (start + self.subvector_dim).min(vector.len());
                if start >= end {
                    return 0;
                }
                nearest_centroid(codebook, &vector[start..end]) as u8
            })
            .collect()
    }
}
