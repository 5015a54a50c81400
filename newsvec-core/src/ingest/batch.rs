use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::core::errors::NewsvecError;
use crate::core::types::{ExternalId, Generation};
use crate::core::utils::generate_batch_id;
use crate::metadata::MetadataRecord;
use crate::storage::WalOp;

/// One producer triple, one line of the JSON Lines input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRecord {
    pub id: ExternalId,
    pub vector: Vec<f32>,
    pub metadata: MetadataRecord,
}

impl IngestRecord {
    pub fn new(id: impl Into<ExternalId>, vector: Vec<f32>, metadata: MetadataRecord) -> Self {
        IngestRecord {
            id: id.into(),
            vector,
            metadata,
        }
    }
}

/// Ordered triples committed together.
#[derive(Debug, Clone)]
pub struct IngestBatch {
    pub batch_id: String,
    pub records: Vec<IngestRecord>,
}

impl IngestBatch {
    pub fn new(records: Vec<IngestRecord>) -> Self {
        IngestBatch {
            batch_id: generate_batch_id(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A triple rejected by validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripleFailure {
    /// Offset of the triple within its batch.
    pub index: usize,
    pub id: ExternalId,
    pub code: &'static str,
    pub error: String,
}

impl TripleFailure {
    pub fn new(index: usize, id: ExternalId, error: &NewsvecError) -> Self {
        TripleFailure {
            index,
            id,
            code: error.code().as_str(),
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub batch_id: String,
    /// WAL sequence of the committed batch; `None` when nothing changed.
    pub seq: Option<u64>,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<TripleFailure>,
}

impl BatchSummary {
    pub fn new(batch_id: impl Into<String>) -> Self {
        BatchSummary {
            batch_id: batch_id.into(),
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.skipped + self.failed
    }

    /// Accumulate counts of another batch (used for run totals).
    pub fn absorb(&mut self, other: &BatchSummary) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.failures.extend(other.failures.iter().cloned());
        if other.seq.is_some() {
            self.seq = other.seq;
        }
    }
}

/// A planned batch awaiting commit. Dropping it cancels the batch.
#[derive(Debug)]
pub struct PreparedBatch {
    pub(crate) base: (Generation, u64),
    pub(crate) ops: Vec<WalOp>,
    pub(crate) summary: BatchSummary,
}

impl PreparedBatch {
    pub fn batch_id(&self) -> &str {
        &self.summary.batch_id
    }

    /// `(generation, seq)` the batch was planned against.
    pub fn base(&self) -> (Generation, u64) {
        self.base
    }

    pub fn ops(&self) -> &[WalOp] {
        &self.ops
    }

    /// Outcome counts the commit will report.
    pub fn summary(&self) -> &BatchSummary {
        &self.summary
    }

    pub(crate) fn into_parts(mut self) -> (Vec<WalOp>, BatchSummary) {
        let ops = std::mem::take(&mut self.ops);
        let summary = std::mem::take(&mut self.summary);
        (ops, summary)
    }
}

impl Drop for PreparedBatch {
    fn drop(&mut self) {
        if !self.ops.is_empty() {
            debug!(batch_id = %self.summary.batch_id, ops = self.ops.len(), "Prepared batch cancelled");
        }
    }
}
