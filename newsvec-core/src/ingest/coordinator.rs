use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};
use crate::compression::QuantizedVector;
use crate::core::errors::{NewsvecError, Result};
use crate::core::types::{ExternalId, InternalPosition};
use crate::core::utils::generate_batch_id;
use crate::corpus::{Corpus, CorpusState, Writer};
use crate::metadata::MetadataRecord;
use crate::storage::WalOp;
use super::batch::{BatchSummary, IngestBatch, PreparedBatch, TripleFailure};

/// What the batch has done so far to an id, seen by later triples of the
/// same batch.
struct Pending {
    position: InternalPosition,
    vector: QuantizedVector,
    metadata: MetadataRecord,
}

/// Drives upserts into a corpus, keeping mapping, index and metadata in
/// step. Every public operation commits as one atomic WAL batch.
pub struct IngestCoordinator {
    corpus: Arc<Corpus>,
}

impl IngestCoordinator {
    pub fn new(corpus: Arc<Corpus>) -> Self {
        IngestCoordinator { corpus }
    }

    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// Plan a batch against the current state without holding the writer.
    /// The result must be committed before any other commit lands, or the
    /// commit fails with `BatchAborted`.
    #[instrument(skip(self, batch), fields(batch_id = %batch.batch_id, records = batch.len()))]
    pub fn prepare(&self, batch: IngestBatch) -> Result<PreparedBatch> {
        let state = self.corpus.read();
        plan(&state, batch)
    }

    #[instrument(skip(self, prepared), fields(batch_id = %prepared.batch_id()))]
    pub fn commit(&self, prepared: PreparedBatch) -> Result<BatchSummary> {
        let mut writer = self.corpus.writer();
        self.commit_locked(&mut writer, prepared)
    }

    /// Plan and commit under the writer lock; never aborts on a concurrent
    /// commit.
    #[instrument(skip(self, batch), fields(batch_id = %batch.batch_id, records = batch.len()))]
    pub fn ingest(&self, batch: IngestBatch) -> Result<BatchSummary> {
        let mut writer = self.corpus.writer();
        let prepared = {
            let state = self.corpus.read();
            plan(&state, batch)?
        };
        self.commit_locked(&mut writer, prepared)
    }

    fn commit_locked(&self, writer: &mut Writer, prepared: PreparedBatch) -> Result<BatchSummary> {
        let start = Instant::now();
        let base = prepared.base();
        let (ops, mut summary) = prepared.into_parts();
        if !ops.is_empty() {
            let seq = self.corpus.commit_ops(writer, base, &summary.batch_id, ops)?;
            summary.seq = Some(seq);
        }

        if summary.failed > 0 {
            warn!(batch_id = %summary.batch_id, failed = summary.failed, "Batch committed with rejected triples");
        }
        info!(
            batch_id = %summary.batch_id,
            seq = ?summary.seq,
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch committed"
        );
        Ok(summary)
    }

    /// Commit a single-purpose batch built from the current state.
    fn commit_single<T, F>(&self, plan_ops: F) -> Result<T>
    where
        F: FnOnce(&CorpusState) -> Result<(Vec<WalOp>, T)>,
    {
        let mut writer = self.corpus.writer();
        let (base, ops, value) = {
            let state = self.corpus.read();
            let (ops, value) = plan_ops(&state)?;
            ((state.generation(), state.seq()), ops, value)
        };
        if !ops.is_empty() {
            self.corpus.commit_ops(&mut writer, base, &generate_batch_id(), ops)?;
        }
        Ok(value)
    }

    /// Unmap `id` and tombstone its vector. Metadata is kept.
    #[instrument(skip(self), fields(id = %id))]
    pub fn remove_vector(&self, id: &ExternalId) -> Result<InternalPosition> {
        self.commit_single(|state| {
            let position = state
                .mapper()
                .lookup(id)
                .ok_or_else(|| NewsvecError::NotFound(id.to_string()))?;
            Ok((vec![WalOp::Release { id: id.clone(), position }], position))
        })
    }

    /// Metadata-only upsert; the id need not have a vector.
    #[instrument(skip(self, record), fields(id = %id))]
    pub fn put_metadata(&self, id: &ExternalId, mut record: MetadataRecord) -> Result<()> {
        record.normalize();
        if record.ingested_at.is_none() {
            record.ingested_at = Some(Utc::now());
        }
        self.commit_single(|_| {
            Ok((vec![WalOp::PutMetadata { id: id.clone(), record }], ()))
        })
    }

    /// Returns whether a record existed.
    #[instrument(skip(self), fields(id = %id))]
    pub fn delete_metadata(&self, id: &ExternalId) -> Result<bool> {
        self.commit_single(|state| {
            if state.metadata().contains(id) {
                Ok((vec![WalOp::DeleteMetadata { id: id.clone() }], true))
            } else {
                Ok((Vec::new(), false))
            }
        })
    }

    /// Remove both the vector and the metadata of `id`.
    #[instrument(skip(self), fields(id = %id))]
    pub fn delete(&self, id: &ExternalId) -> Result<()> {
        self.commit_single(|state| {
            let mut ops = Vec::new();
            if let Some(position) = state.mapper().lookup(id) {
                ops.push(WalOp::Release { id: id.clone(), position });
            }
            if state.metadata().contains(id) {
                ops.push(WalOp::DeleteMetadata { id: id.clone() });
            }
            if ops.is_empty() {
                return Err(NewsvecError::NotFound(id.to_string()));
            }
            Ok((ops, ()))
        })
    }
}

/// Turn a batch into WAL ops against `state`, in input order.
///
/// Per triple: validation failures are recorded and skipped; a live id whose
/// vector and metadata are unchanged is skipped; a live id otherwise is
/// overwritten in place; an unmapped id gets the next fresh position.
fn plan(state: &CorpusState, batch: IngestBatch) -> Result<PreparedBatch> {
    let IngestBatch { batch_id, records } = batch;
    let quantizer = state.quantizer();
    let encoded: Vec<Result<QuantizedVector>> = records
        .par_iter()
        .map(|record| quantizer.encode(&record.vector))
        .collect();

    let mut summary = BatchSummary::new(batch_id);
    let mut ops = Vec::with_capacity(records.len() * 2);
    let mut pending: HashMap<ExternalId, Pending> = HashMap::new();
    let mut next_position = state.mapper().next_position();
    let now = Utc::now();

    for (index, (record, vector)) in records.into_iter().zip(encoded).enumerate() {
        let vector = match vector {
            Ok(vector) => vector,
            Err(e) if e.is_validation() => {
                debug!(id = %record.id, error = %e, "Rejected triple");
                summary.failures.push(TripleFailure::new(index, record.id, &e));
                summary.failed += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        let id = record.id;
        let mut metadata = record.metadata;
        metadata.normalize();

        let current = match pending.get(&id) {
            Some(p) => Some((p.position, &p.vector, Some(&p.metadata))),
            None => state.mapper().lookup(&id).and_then(|position| {
                state
                    .index()
                    .get(position)
                    .map(|v| (position, v, state.metadata_of(&id)))
            }),
        };

        match current {
            Some((position, stored_vector, stored_metadata)) => {
                let vector_changed = *stored_vector != vector;
                let metadata_changed = stored_metadata.map_or(true, |m| !m.same_content(&metadata));
                if !vector_changed && !metadata_changed {
                    summary.skipped += 1;
                    continue;
                }
                if vector_changed {
                    ops.push(WalOp::Overwrite {
                        id: id.clone(),
                        position,
                        vector: vector.clone(),
                    });
                }
                if metadata_changed {
                    metadata.ingested_at = Some(now);
                    ops.push(WalOp::PutMetadata {
                        id: id.clone(),
                        record: metadata.clone(),
                    });
                }
                summary.updated += 1;
                pending.insert(id, Pending { position, vector, metadata });
            }
            None => {
                let position = next_position;
                next_position += 1;
                metadata.ingested_at = Some(now);
                ops.push(WalOp::Insert {
                    id: id.clone(),
                    position,
                    vector: vector.clone(),
                });
                ops.push(WalOp::PutMetadata {
                    id: id.clone(),
                    record: metadata.clone(),
                });
                summary.inserted += 1;
                pending.insert(id, Pending { position, vector, metadata });
            }
        }
    }

    Ok(PreparedBatch {
        base: (state.generation(), state.seq()),
        ops,
        summary,
    })
}
