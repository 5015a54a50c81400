//! On-disk layout: manifest, per-generation snapshots and the batch WAL.
//!
//! ```text
//! <data_dir>/MANIFEST.json
//! <data_dir>/snapshots/g{gen}-s{seq}/{mapping,vectors,metadata}.json
//! <data_dir>/wal.jsonl
//! <data_dir>/ingest.lock
//! ```

pub mod files;
pub mod lock;
pub mod manifest;
pub mod snapshot;
pub mod wal;

use std::path::{Path, PathBuf};

pub use lock::{IngestLock, LockHolder};
pub use manifest::{snapshot_name, Manifest};
pub use snapshot::CorpusSnapshot;
pub use wal::{WalOp, WalRecord, WalScan, WriteAheadLog};

pub const MANIFEST_FILE: &str = "MANIFEST.json";
pub const WAL_FILE: &str = "wal.jsonl";
pub const SNAPSHOTS_DIR: &str = "snapshots";
pub const INGEST_LOCK_FILE: &str = "ingest.lock";

/// Paths inside a corpus data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DataLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn wal(&self) -> PathBuf {
        self.root.join(WAL_FILE)
    }

    pub fn snapshots(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR)
    }

    pub fn snapshot(&self, name: &str) -> PathBuf {
        self.snapshots().join(name)
    }

    pub fn ingest_lock(&self) -> PathBuf {
        self.root.join(INGEST_LOCK_FILE)
    }
}
