use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use crate::compression::QuantizedVector;
use crate::core::errors::{ErrorCode, NewsvecError, Result};
use crate::core::types::{ExternalId, Generation, InternalPosition};
use crate::metadata::MetadataRecord;

/// One state change. A batch is an ordered list of these, applied
/// all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WalOp {
    /// Map `id` to a fresh `position` and store its vector there.
    Insert {
        id: ExternalId,
        position: InternalPosition,
        vector: QuantizedVector,
    },
    /// Replace the vector of the live slot mapped to `id`.
    Overwrite {
        id: ExternalId,
        position: InternalPosition,
        vector: QuantizedVector,
    },
    /// Unmap `id` and tombstone its slot.
    Release {
        id: ExternalId,
        position: InternalPosition,
    },
    PutMetadata {
        id: ExternalId,
        record: MetadataRecord,
    },
    DeleteMetadata {
        id: ExternalId,
    },
}

impl WalOp {
    pub fn id(&self) -> &ExternalId {
        match self {
            WalOp::Insert { id, .. }
            | WalOp::Overwrite { id, .. }
            | WalOp::Release { id, .. }
            | WalOp::PutMetadata { id, .. }
            | WalOp::DeleteMetadata { id } => id,
        }
    }
}

/// One committed batch, one line of `wal.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalRecord {
    pub seq: u64,
    pub generation: Generation,
    pub batch_id: String,
    pub ops: Vec<WalOp>,
    /// Hex SHA-256 over the other fields.
    pub checksum: String,
}

#[derive(Serialize)]
struct RecordBody<'a> {
    seq: u64,
    generation: Generation,
    batch_id: &'a str,
    ops: &'a [WalOp],
}

impl WalRecord {
    pub fn new(seq: u64, generation: Generation, batch_id: String, ops: Vec<WalOp>) -> Result<Self> {
        let checksum = Self::compute_checksum(seq, generation, &batch_id, &ops)?;
        Ok(WalRecord {
            seq,
            generation,
            batch_id,
            ops,
            checksum,
        })
    }

    fn compute_checksum(
        seq: u64,
        generation: Generation,
        batch_id: &str,
        ops: &[WalOp],
    ) -> Result<String> {
        let body = serde_json::to_vec(&RecordBody {
            seq,
            generation,
            batch_id,
            ops,
        })?;
        Ok(format!("{:x}", Sha256::digest(&body)))
    }

    pub fn verify(&self) -> bool {
        Self::compute_checksum(self.seq, self.generation, &self.batch_id, &self.ops)
            .map_or(false, |sum| sum == self.checksum)
    }
}

/// Result of scanning a log file.
#[derive(Debug, Default)]
pub struct WalScan {
    pub records: Vec<WalRecord>,
    /// Byte length of the intact prefix.
    pub valid_len: u64,
    /// Bytes after the intact prefix: a torn or corrupt tail.
    pub discarded_bytes: u64,
}

/// Append-only JSON Lines log of committed batches.
pub struct WriteAheadLog {
    path: PathBuf,
    file: File,
    len: u64,
    fsync: bool,
}

impl WriteAheadLog {
    /// Read every intact record. Scanning stops at the first line that is
    /// unterminated, unparsable or fails its checksum.
    pub fn scan(path: &Path) -> Result<WalScan> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(WalScan::default()),
            Err(e) => return Err(e.into()),
        };

        let mut scan = WalScan::default();
        let mut offset = 0usize;
        while offset < bytes.len() {
            let Some(end) = bytes[offset..].iter().position(|b| *b == b'\n') else {
                break;
            };
            let line = &bytes[offset..offset + end];
            match serde_json::from_slice::<WalRecord>(line) {
                Ok(record) if record.verify() => scan.records.push(record),
                Ok(record) => {
                    warn!(seq = record.seq, "WAL record checksum mismatch");
                    break;
                }
                Err(e) => {
                    warn!(offset, error = %e, "Unparsable WAL record");
                    break;
                }
            }
            offset += end + 1;
        }

        scan.valid_len = offset as u64;
        scan.discarded_bytes = (bytes.len() - offset) as u64;
        Ok(scan)
    }

    /// Open for appending, cutting the file back to `valid_len` first.
    pub fn open(path: &Path, valid_len: u64, fsync: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                NewsvecError::storage(
                    ErrorCode::StorageIOError,
                    format!("Failed to open WAL {}: {}", path.display(), e),
                )
            })?;
        if file.metadata()?.len() != valid_len {
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok(WriteAheadLog {
            path: path.to_path_buf(),
            file,
            len: valid_len,
            fsync,
        })
    }

    /// Durably append one record. On failure the file is cut back to its
    /// previous length so later appends never follow a partial line.
    ///
    /// Refuses to write when the file no longer has the length this handle
    /// left it at, i.e. another process truncated or extended it.
    pub fn append(&mut self, record: &WalRecord) -> Result<()> {
        let on_disk = self.file.metadata()?.len();
        if on_disk != self.len {
            return Err(NewsvecError::storage(
                ErrorCode::StorageIOError,
                format!(
                    "WAL {} is {} bytes but this handle expected {}; it was modified by another process",
                    self.path.display(),
                    on_disk,
                    self.len
                ),
            ));
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let written = self.write_at_end(&line);
        if let Err(e) = written {
            if let Err(rollback) = self.file.set_len(self.len) {
                warn!(error = %rollback, "Failed to roll back partial WAL append");
            }
            return Err(NewsvecError::storage(
                ErrorCode::StorageIOError,
                format!("WAL append failed for batch {}: {}", record.batch_id, e),
            ));
        }

        self.len += line.len() as u64;
        debug!(seq = record.seq, ops = record.ops.len(), bytes = line.len(), "Appended WAL record");
        Ok(())
    }

    fn write_at_end(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(self.len))?;
        self.file.write_all(line)?;
        if self.fsync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Drop every record. Called once a checkpoint covers them.
    pub fn reset(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.len = 0;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
