//! Exclusive maintenance: compaction and recoding. Both hold the writer
//! mutex and the state write lock from start to finish, build the next
//! generation off to the side, persist it, and only then swap it in.

use std::time::Instant;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, instrument};
use crate::compression::{CodecSpec, Quantizer};
use crate::core::errors::Result;
use crate::core::types::Generation;
use crate::index::SlotEntry;
use crate::vector::distance::DistanceMetric;
use super::state::CorpusState;
use super::Corpus;

#[derive(Debug, Clone, Serialize)]
pub struct CompactionStats {
    pub generation: Generation,
    pub tombstones_removed: usize,
    pub live_vectors: usize,
    pub positions_before: u64,
    pub positions_after: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecodeStats {
    pub generation: Generation,
    pub from: CodecSpec,
    pub to: CodecSpec,
    pub metric: DistanceMetric,
    pub vectors_recoded: usize,
    pub duration_ms: u64,
}

impl Corpus {
    /// Drop tombstones, renumber positions densely and start a new
    /// generation.
    #[instrument(skip(self))]
    pub fn compact(&self) -> Result<CompactionStats> {
        self.ensure_not_ingesting()?;
        let start = Instant::now();
        let mut writer = self.writer();
        let mut state = self.state.write();

        let positions_before = state.index.next_position();
        let tombstones_removed = state.index.tombstones();

        let mut next = CorpusState::from_snapshot(state.quantizer().clone(), state.to_snapshot())?;
        let remap = next.index.compact();
        next.mapper.apply_remap(&remap)?;
        next.generation = state.generation + 1;

        let manifest = Corpus::persist(self.layout(), &next, &mut writer.wal)?;
        next.checkpoint_seq = manifest.checkpoint_seq;
        *state = next;
        writer.metrics.checkpoints += 1;

        let stats = CompactionStats {
            generation: state.generation,
            tombstones_removed,
            live_vectors: state.index.len(),
            positions_before,
            positions_after: state.index.next_position(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            generation = stats.generation,
            removed = stats.tombstones_removed,
            live = stats.live_vectors,
            duration_ms = stats.duration_ms,
            "Compaction complete"
        );
        Ok(stats)
    }

    /// Re-encode every live vector under a new codec.
    ///
    /// Training uses the vectors decoded under the current codec, so a lossy
    /// current codec bounds the quality of the new one. Without an explicit
    /// metric the current one is kept unless the codec forces a change:
    /// `binary` needs `hamming`, and leaving `binary` falls back to `cosine`.
    #[instrument(skip(self), fields(codec = %spec))]
    pub fn recode(&self, spec: CodecSpec, metric: Option<DistanceMetric>) -> Result<RecodeStats> {
        self.ensure_not_ingesting()?;
        let start = Instant::now();
        let mut writer = self.writer();
        let mut state = self.state.write();

        let old = state.quantizer().clone();
        let metric = match (spec, metric) {
            (_, Some(metric)) => metric,
            (CodecSpec::Binary, None) => DistanceMetric::Hamming,
            (_, None) if old.metric() == DistanceMetric::Hamming => DistanceMetric::Cosine,
            (_, None) => old.metric(),
        };

        let mut snapshot = state.to_snapshot();
        let decoded: Vec<Vec<f32>> = snapshot
            .vectors
            .slots
            .par_iter()
            .map(|slot| old.decode(&slot.vector))
            .collect::<Result<_>>()?;
        let quantizer = Quantizer::train(spec, old.dimension(), metric, &decoded)?;
        snapshot.vectors.slots = snapshot
            .vectors
            .slots
            .par_iter()
            .zip(decoded.par_iter())
            .map(|(slot, raw)| {
                Ok(SlotEntry {
                    position: slot.position,
                    vector: quantizer.encode(raw)?,
                })
            })
            .collect::<Result<_>>()?;
        snapshot.generation = state.generation + 1;
        let vectors_recoded = snapshot.vectors.slots.len();

        let mut next = CorpusState::from_snapshot(quantizer, snapshot)?;
        let manifest = Corpus::persist(self.layout(), &next, &mut writer.wal)?;
        next.checkpoint_seq = manifest.checkpoint_seq;
        *state = next;
        writer.metrics.checkpoints += 1;

        let stats = RecodeStats {
            generation: state.generation,
            from: old.spec(),
            to: spec,
            metric,
            vectors_recoded,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            generation = stats.generation,
            from = %stats.from,
            to = %stats.to,
            vectors = stats.vectors_recoded,
            "Recode complete"
        );
        Ok(stats)
    }
}
