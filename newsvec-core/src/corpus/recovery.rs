use serde::Serialize;
use tracing::{debug, info, warn};
use crate::core::errors::{ErrorCode, NewsvecError, Result};
use crate::core::types::Generation;
use crate::storage::WalScan;
use super::state::CorpusState;

/// What `Corpus::open` found and did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryReport {
    pub generation: Generation,
    /// Snapshot directory the state was loaded from.
    pub snapshot: String,
    /// Batches re-applied from the WAL on top of the snapshot.
    pub replayed_batches: usize,
    /// Records already covered by the snapshot (older generation or
    /// sequence at or below the checkpoint).
    pub skipped_records: usize,
    /// Bytes of torn or corrupt WAL tail that were cut off.
    pub discarded_bytes: u64,
    /// Sequence of the last applied batch.
    pub last_seq: u64,
}

/// Re-apply intact WAL records on top of a freshly loaded snapshot.
pub(crate) fn replay(state: &mut CorpusState, scan: WalScan, report: &mut RecoveryReport) -> Result<()> {
    report.discarded_bytes = scan.discarded_bytes;
    if scan.discarded_bytes > 0 {
        warn!(
            bytes = scan.discarded_bytes,
            valid_len = scan.valid_len,
            "Discarding torn WAL tail"
        );
    }

    for record in scan.records {
        if record.generation < state.generation || record.seq <= state.checkpoint_seq {
            report.skipped_records += 1;
            continue;
        }
        if record.generation > state.generation {
            return Err(NewsvecError::storage(
                ErrorCode::WALReplayFailed,
                format!(
                    "WAL record {} belongs to generation {} but the manifest is at {}",
                    record.seq, record.generation, state.generation
                ),
            ));
        }
        if record.seq != state.seq + 1 {
            return Err(NewsvecError::storage(
                ErrorCode::WALReplayFailed,
                format!("WAL gap: expected seq {}, found {}", state.seq + 1, record.seq),
            ));
        }

        debug!(seq = record.seq, batch_id = %record.batch_id, ops = record.ops.len(), "Replaying batch");
        state.apply(record.seq, record.ops)?;
        report.replayed_batches += 1;
    }

    report.generation = state.generation;
    report.last_seq = state.seq;
    info!(
        generation = report.generation,
        replayed = report.replayed_batches,
        skipped = report.skipped_records,
        last_seq = report.last_seq,
        "Recovery complete"
    );
    Ok(())
}
