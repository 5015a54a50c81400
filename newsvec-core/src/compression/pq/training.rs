use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use super::ProductQuantizer;

/// Fixed seed so that training on the same sample yields identical codebooks.
const KMEANS_SEED: u64 = 0x6e65_7773_7665_6301;
const KMEANS_ITERATIONS: usize = 25;

/// Product Quantization training using k-means.
pub struct PQTrainer {
    pub n_subvectors: usize,
    pub n_centroids: usize,
}

impl PQTrainer {
    /// Create a new PQ trainer.
    pub fn new(n_subvectors: usize, n_centroids: usize) -> Self {
        PQTrainer {
            n_subvectors,
            n_centroids,
        }
    }

    /// Train centroids for each subvector using k-means.
    ///
    /// `dim` must be divisible by `n_subvectors`; callers validate this.
    /// When the sample holds fewer vectors than `n_centroids`, each codebook
    /// has one centroid per sample vector.
    pub fn train(&self, vectors: &[Vec<f32>], dim: usize) -> ProductQuantizer {
        let subvector_dim = dim / self.n_subvectors.max(1);
        let mut rng = StdRng::seed_from_u64(KMEANS_SEED);

        let codebooks = (0..self.n_subvectors)
            .map(|subvector_idx| {
                let start = subvector_idx * subvector_dim;
                let end = start + subvector_dim;
                let subvectors: Vec<&[f32]> = vectors
                    .iter()
                    .filter(|v| v.len() >= end)
                    .map(|v| &v[start..end])
                    .collect();
                self.kmeans(&subvectors, subvector_dim, &mut rng)
            })
            .collect();

        ProductQuantizer::new(codebooks, subvector_dim)
    }

    fn kmeans(&self, vectors: &[&[f32]], dim: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
        if vectors.is_empty() {
            return vec![vec![0.0; dim]];
        }

        let k = self.n_centroids.min(vectors.len()).max(1);
        let mut seeds: Vec<usize> = sample(rng, vectors.len(), k).into_vec();
        seeds.sort_unstable();
        let mut centroids: Vec<Vec<f32>> = seeds.iter().map(|&i| vectors[i].to_vec()).collect();

        for _ in 0..KMEANS_ITERATIONS {
            let mut sums = vec![vec![0.0_f32; dim]; k];
            let mut counts = vec![0usize; k];

            // Assign each vector to nearest centroid
            for v in vectors {
                let best_idx = nearest_centroid(&centroids, v);
                counts[best_idx] += 1;
                for (acc, &val) in sums[best_idx].iter_mut().zip(v.iter()) {
                    *acc += val;
                }
            }

            // Update centroids; empty clusters keep their previous centroid
            let mut moved = false;
            for (idx, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
                if count == 0 {
                    continue;
                }
                let updated: Vec<f32> = sum.into_iter().map(|s| s / count as f32).collect();
                if updated != centroids[idx] {
                    moved = true;
                    centroids[idx] = updated;
                }
            }

            if !moved {
                break;
            }
        }

        centroids
    }
}

/// Index of the closest centroid by squared L2; ties resolve to the lowest index.
pub(crate) fn nearest_centroid(centroids: &[Vec<f32>], subvector: &[f32]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = f32::MAX;

    for (idx, centroid) in centroids.iter().enumerate() {
        let dist: f32 = subvector
            .iter()
            .zip(centroid.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum();
        if dist < best_dist {
            best_dist = dist;
            best_idx = idx;
        }
    }

    best_idx
}
