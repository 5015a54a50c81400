use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::compression::{CodecSpec, Quantizer};
use crate::core::errors::{NewsvecError, Result};
use crate::core::types::Generation;
use crate::vector::distance::DistanceMetric;
use super::files::{read_json, write_json_atomic};

pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Root of the persisted state: which snapshot is current and which codec
/// the corpus is encoded with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub generation: Generation,
    /// Last WAL sequence folded into the snapshot.
    pub checkpoint_seq: u64,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub codec: CodecSpec,
    /// Trained codec parameters.
    pub quantizer: Quantizer,
    /// Snapshot directory name under `snapshots/`.
    pub snapshot: String,
    pub updated_at: DateTime<Utc>,
}

impl Manifest {
    pub fn new(quantizer: Quantizer, generation: Generation, checkpoint_seq: u64) -> Self {
        Manifest {
            format_version: MANIFEST_FORMAT_VERSION,
            generation,
            checkpoint_seq,
            dimension: quantizer.dimension(),
            metric: quantizer.metric(),
            codec: quantizer.spec(),
            snapshot: snapshot_name(generation, checkpoint_seq),
            quantizer,
            updated_at: Utc::now(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let manifest: Manifest = read_json(path)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    /// The summary fields must agree with the embedded quantizer.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MANIFEST_FORMAT_VERSION {
            return Err(NewsvecError::config(format!(
                "unsupported manifest format {}",
                self.format_version
            )));
        }
        if self.dimension != self.quantizer.dimension()
            || self.metric != self.quantizer.metric()
            || self.codec != self.quantizer.spec()
        {
            return Err(NewsvecError::config(
                "manifest dimension/metric/codec disagree with stored quantizer",
            ));
        }
        Ok(())
    }
}

/// `g{generation}-s{seq}`.
pub fn snapshot_name(generation: Generation, checkpoint_seq: u64) -> String {
    format!("g{}-s{}", generation, checkpoint_seq)
}
