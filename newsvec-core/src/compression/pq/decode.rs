use super::ProductQuantizer;

impl ProductQuantizer {
    /// Decode PQ codes back to a vector.
    pub fn decode(&self, codes: &[u8]) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.dimension());
        for (subvector_idx, code) in codes.iter().enumerate().take(self.codebooks.len()) {
            result.extend_from_slice(self.centroid(subvector_idx, *code));
        }
        result
    }

    /// Reconstructed components of a code string, without allocating.
    pub fn components<'a>(&'a self, codes: &'a [u8]) -> impl Iterator<Item = f32> + 'a {
        codes
            .iter()
            .enumerate()
            .take(self.codebooks.len())
            .flat_map(move |(subvector_idx, code)| {
                self.centroid(subvector_idx, *code).iter().copied()
            })
    }

    fn centroid(&self, subvector_idx: usize, code: u8) -> &[f32] {
        let codebook = &self.codebooks[subvector_idx];
        // Codes are produced by `encode`, so out-of-range only happens for
        // hand-built vectors that failed validation upstream.
        codebook
            .get(code as usize)
            .or_else(|| codebook.first())
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }
}
