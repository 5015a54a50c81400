use std::fs;
use std::path::Path;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::core::errors::{ErrorCode, NewsvecError, Result};
use crate::core::types::{Generation, InternalPosition};
use crate::index::SlotEntry;
use crate::mapping::MappingEntry;
use crate::metadata::MetadataEntry;
use super::files::{read_json, sync_dir, write_json_atomic};

pub const MAPPING_FILE: &str = "mapping.json";
pub const VECTORS_FILE: &str = "vectors.json";
pub const METADATA_FILE: &str = "metadata.json";

/// One persisted store, headed by the generation it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreFile<T> {
    pub generation: Generation,
    pub checkpoint_seq: u64,
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingData {
    pub next_position: InternalPosition,
    pub entries: Vec<MappingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorData {
    pub next_position: InternalPosition,
    pub slots: Vec<SlotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataData {
    pub records: Vec<MetadataEntry>,
}

/// Point-in-time copy of the three stores.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusSnapshot {
    pub generation: Generation,
    pub checkpoint_seq: u64,
    pub mapping: MappingData,
    pub vectors: VectorData,
    pub metadata: MetadataData,
}

impl CorpusSnapshot {
    /// Write all three store files into `dir`, creating it.
    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        write_json_atomic(&dir.join(MAPPING_FILE), &StoreFile {
            generation: self.generation,
            checkpoint_seq: self.checkpoint_seq,
            data: &self.mapping,
        })?;
        write_json_atomic(&dir.join(VECTORS_FILE), &StoreFile {
            generation: self.generation,
            checkpoint_seq: self.checkpoint_seq,
            data: &self.vectors,
        })?;
        write_json_atomic(&dir.join(METADATA_FILE), &StoreFile {
            generation: self.generation,
            checkpoint_seq: self.checkpoint_seq,
            data: &self.metadata,
        })?;
        if let Some(parent) = dir.parent() {
            sync_dir(parent)?;
        }
        debug!(
            dir = %dir.display(),
            generation = self.generation,
            seq = self.checkpoint_seq,
            "Wrote snapshot"
        );
        Ok(())
    }

    /// Load a snapshot, rejecting any store file whose header disagrees
    /// with the expected generation or checkpoint.
    pub fn load(dir: &Path, generation: Generation, checkpoint_seq: u64) -> Result<Self> {
        let mapping = load_store(dir, MAPPING_FILE, generation, checkpoint_seq)?;
        let vectors = load_store(dir, VECTORS_FILE, generation, checkpoint_seq)?;
        let metadata = load_store(dir, METADATA_FILE, generation, checkpoint_seq)?;
        Ok(CorpusSnapshot {
            generation,
            checkpoint_seq,
            mapping,
            vectors,
            metadata,
        })
    }
}

fn load_store<T: DeserializeOwned>(
    dir: &Path,
    name: &str,
    generation: Generation,
    checkpoint_seq: u64,
) -> Result<T> {
    let file: StoreFile<T> = read_json(&dir.join(name))?;
    if file.generation != generation {
        return Err(NewsvecError::GenerationMismatch {
            store: name.to_string(),
            expected: generation,
            found: file.generation,
        });
    }
    if file.checkpoint_seq != checkpoint_seq {
        return Err(NewsvecError::storage(
            ErrorCode::GenerationMismatch,
            format!(
                "{} holds checkpoint {} but manifest expects {}",
                name, file.checkpoint_seq, checkpoint_seq
            ),
        ));
    }
    Ok(file.data)
}
