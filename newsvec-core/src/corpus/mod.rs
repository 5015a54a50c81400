//! A persisted corpus: the in-memory stores behind a reader/writer lock, the
//! batch WAL behind the writer mutex, and the manifest/snapshot layout on
//! disk.

pub mod maintenance;
pub mod recovery;
pub mod state;

use std::fs;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use serde::Serialize;
use tracing::{info, instrument, warn};
use crate::compression::{CodecSpec, Quantizer};
use crate::config::CorpusConfig;
use crate::core::errors::{NewsvecError, Result};
use crate::core::types::{Generation, InternalPosition};
use crate::storage::{
    snapshot_name, CorpusSnapshot, DataLayout, IngestLock, Manifest, WalOp, WalRecord,
    WriteAheadLog,
};
use crate::vector::distance::DistanceMetric;

pub use maintenance::{CompactionStats, RecodeStats};
pub use recovery::RecoveryReport;
pub use state::CorpusState;

/// Commit counters since open.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitMetrics {
    pub batches_committed: u64,
    pub ops_committed: u64,
    pub checkpoints: u64,
    pub last_commit_ms: u64,
}

/// Serialized access to the WAL. Holding this is holding the writer lock.
pub(crate) struct Writer {
    pub(crate) wal: WriteAheadLog,
    pub(crate) metrics: CommitMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    pub generation: Generation,
    pub seq: u64,
    pub checkpoint_seq: u64,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub codec: CodecSpec,
    /// Raw f32 bytes per encoded byte.
    pub compression_ratio: f32,
    pub live_vectors: usize,
    pub tombstones: usize,
    pub next_position: InternalPosition,
    pub mapped_ids: usize,
    pub metadata_records: usize,
    pub wal_bytes: u64,
    pub ingest_locked: bool,
    pub commits: CommitMetrics,
}

pub struct Corpus {
    config: CorpusConfig,
    layout: DataLayout,
    state: RwLock<CorpusState>,
    writer: Mutex<Writer>,
    recovery: RecoveryReport,
}

impl Corpus {
    /// Initialize a new corpus in `config.data_dir`, training the codec on
    /// `sample` where it needs one.
    #[instrument(skip(config, sample), fields(data_dir = %config.data_dir.display()))]
    pub fn create(config: CorpusConfig, sample: &[Vec<f32>]) -> Result<Self> {
        config.validate()?;
        let layout = DataLayout::new(&config.data_dir);
        if layout.manifest().exists() {
            return Err(NewsvecError::config(format!(
                "corpus already exists at {}",
                layout.root().display()
            )));
        }
        fs::create_dir_all(layout.snapshots())?;

        let quantizer = Quantizer::train(config.codec, config.dimension, config.metric, sample)?;
        let state = CorpusState::empty(quantizer);
        let mut wal = WriteAheadLog::open(&layout.wal(), 0, config.fsync)?;
        Self::persist(&layout, &state, &mut wal)?;

        info!(
            dimension = config.dimension,
            metric = %config.metric,
            codec = %config.codec,
            "Created corpus"
        );
        Ok(Corpus {
            config,
            layout,
            state: RwLock::new(state),
            writer: Mutex::new(Writer {
                wal,
                metrics: CommitMetrics::default(),
            }),
            recovery: RecoveryReport {
                snapshot: snapshot_name(0, 0),
                ..RecoveryReport::default()
            },
        })
    }

    /// Open an existing corpus: load the manifest's snapshot, then replay
    /// the intact prefix of the WAL.
    #[instrument(skip(config), fields(data_dir = %config.data_dir.display()))]
    pub fn open(config: CorpusConfig) -> Result<Self> {
        let layout = DataLayout::new(&config.data_dir);
        let manifest = Manifest::load(&layout.manifest())?;
        if manifest.dimension != config.dimension
            || manifest.metric != config.metric
            || manifest.codec != config.codec
        {
            info!(
                dimension = manifest.dimension,
                metric = %manifest.metric,
                codec = %manifest.codec,
                "Using creation parameters from manifest"
            );
        }
        let config = CorpusConfig {
            dimension: manifest.dimension,
            metric: manifest.metric,
            codec: manifest.codec,
            ..config
        };
        config.validate()?;

        let snapshot = CorpusSnapshot::load(
            &layout.snapshot(&manifest.snapshot),
            manifest.generation,
            manifest.checkpoint_seq,
        )?;
        let mut state = CorpusState::from_snapshot(manifest.quantizer.clone(), snapshot)?;

        let scan = WriteAheadLog::scan(&layout.wal())?;
        let valid_len = scan.valid_len;
        let mut recovery = RecoveryReport {
            snapshot: manifest.snapshot.clone(),
            ..RecoveryReport::default()
        };
        recovery::replay(&mut state, scan, &mut recovery)?;
        let wal = WriteAheadLog::open(&layout.wal(), valid_len, config.fsync)?;

        Ok(Corpus {
            config,
            layout,
            state: RwLock::new(state),
            writer: Mutex::new(Writer {
                wal,
                metrics: CommitMetrics::default(),
            }),
            recovery,
        })
    }

    /// Open when a manifest exists, otherwise create with an empty sample.
    pub fn open_or_create(config: CorpusConfig) -> Result<Self> {
        if DataLayout::new(&config.data_dir).manifest().exists() {
            Self::open(config)
        } else {
            Self::create(config, &[])
        }
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn recovery(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Shared view of the stores. Held by queries for their whole duration.
    pub fn read(&self) -> RwLockReadGuard<'_, CorpusState> {
        self.state.read()
    }

    pub(crate) fn writer(&self) -> MutexGuard<'_, Writer> {
        self.writer.lock()
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&self) -> parking_lot::RwLockWriteGuard<'_, CorpusState> {
        self.state.write()
    }

    /// `MaintenanceLocked` while another run holds the ingest lock.
    fn ensure_not_ingesting(&self) -> Result<()> {
        let lock = self.layout.ingest_lock();
        match IngestLock::holder(&lock) {
            Some(holder) => Err(NewsvecError::MaintenanceLocked(format!(
                "ingestion in progress ({}); remove {} if that process is gone",
                holder,
                lock.display()
            ))),
            None => Ok(()),
        }
    }

    /// Take the ingest lock file for this corpus.
    pub fn ingest_lock(&self) -> Result<IngestLock> {
        IngestLock::acquire(self.layout.ingest_lock())
    }

    /// Make `ops` durable as one WAL record, then apply them.
    ///
    /// `base` is the `(generation, seq)` the ops were planned against; any
    /// commit in between aborts the batch. Returns the new sequence.
    pub(crate) fn commit_ops(
        &self,
        writer: &mut Writer,
        base: (Generation, u64),
        batch_id: &str,
        ops: Vec<WalOp>,
    ) -> Result<u64> {
        let record = {
            let state = self.state.read();
            if (state.generation, state.seq) != base {
                return Err(NewsvecError::BatchAborted {
                    batch_id: batch_id.to_string(),
                    reason: format!(
                        "planned against g{}-s{}, corpus is at g{}-s{}",
                        base.0, base.1, state.generation, state.seq
                    ),
                });
            }
            state.check(&ops)?;
            WalRecord::new(state.seq + 1, state.generation, batch_id.to_string(), ops)?
        };

        writer.wal.append(&record)?;

        let seq = record.seq;
        let op_count = record.ops.len() as u64;
        self.state.write().apply(seq, record.ops)?;

        writer.metrics.batches_committed += 1;
        writer.metrics.ops_committed += op_count;
        writer.metrics.last_commit_ms = crate::core::utils::current_timestamp_ms();

        let interval = self.config.checkpoint_interval;
        let checkpoint_seq = self.state.read().checkpoint_seq;
        if interval > 0 && seq - checkpoint_seq >= interval {
            // The batch is already durable; a failed checkpoint only leaves
            // a longer WAL to replay.
            if let Err(e) = self.checkpoint_locked(writer) {
                warn!(seq, error = %e, "Automatic checkpoint failed");
            }
        }
        Ok(seq)
    }

    /// Fold the WAL into a fresh snapshot. Refused while an ingestion run
    /// holds the lock, since that run may have appended to the WAL since
    /// this handle loaded it.
    #[instrument(skip(self))]
    pub fn checkpoint(&self) -> Result<Manifest> {
        self.ensure_not_ingesting()?;
        let mut writer = self.writer();
        self.checkpoint_locked(&mut writer)
    }

    pub(crate) fn checkpoint_locked(&self, writer: &mut Writer) -> Result<Manifest> {
        let manifest = {
            let state = self.state.read();
            Self::persist(&self.layout, &state, &mut writer.wal)?
        };
        self.state.write().checkpoint_seq = manifest.checkpoint_seq;
        writer.metrics.checkpoints += 1;
        info!(
            generation = manifest.generation,
            seq = manifest.checkpoint_seq,
            snapshot = %manifest.snapshot,
            "Checkpoint written"
        );
        Ok(manifest)
    }

    /// Write `state` as the current snapshot: store files, then manifest,
    /// then WAL reset, then old snapshot cleanup. A crash between steps
    /// leaves either the old or the new snapshot current, and WAL records
    /// already covered by the manifest are skipped on replay.
    pub(crate) fn persist(
        layout: &DataLayout,
        state: &CorpusState,
        wal: &mut WriteAheadLog,
    ) -> Result<Manifest> {
        let snapshot = state.to_snapshot();
        let manifest = Manifest::new(state.quantizer().clone(), snapshot.generation, snapshot.checkpoint_seq);
        snapshot.write(&layout.snapshot(&manifest.snapshot))?;
        manifest.store(&layout.manifest())?;
        wal.reset()?;
        Self::prune_snapshots(layout, &manifest.snapshot);
        Ok(manifest)
    }

    fn prune_snapshots(layout: &DataLayout, keep: &str) {
        let entries = match fs::read_dir(layout.snapshots()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to list snapshots for cleanup");
                return;
            }
        };
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy() == keep {
                continue;
            }
            if let Err(e) = fs::remove_dir_all(entry.path()) {
                warn!(path = %entry.path().display(), error = %e, "Failed to remove old snapshot");
            }
        }
    }

    pub fn stats(&self) -> CorpusStats {
        let (commits, wal_bytes) = {
            let writer = self.writer();
            (writer.metrics.clone(), writer.wal.len())
        };
        let state = self.state.read();
        let quantizer = state.quantizer();
        CorpusStats {
            generation: state.generation,
            seq: state.seq,
            checkpoint_seq: state.checkpoint_seq,
            dimension: quantizer.dimension(),
            metric: quantizer.metric(),
            codec: quantizer.spec(),
            compression_ratio: quantizer.spec().compression_ratio(quantizer.dimension()),
            live_vectors: state.index.len(),
            tombstones: state.index.tombstones(),
            next_position: state.index.next_position(),
            mapped_ids: state.mapper.live_count(),
            metadata_records: state.metadata.len(),
            wal_bytes,
            ingest_locked: IngestLock::is_held(&self.layout.ingest_lock()),
            commits,
        }
    }
}
