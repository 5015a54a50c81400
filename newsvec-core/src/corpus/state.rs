use std::collections::HashMap;
use crate::compression::{QuantizedVector, Quantizer};
use crate::core::errors::{NewsvecError, Result};
use crate::core::types::{ExternalId, Generation, InternalPosition};
use crate::index::{FlatIndex, VectorIndex};
use crate::mapping::IdMapper;
use crate::metadata::{InMemoryMetadataStore, MetadataRecord, MetadataStore};
use crate::storage::snapshot::{MappingData, MetadataData, VectorData};
use crate::storage::{CorpusSnapshot, WalOp};

/// The three stores plus the sequence bookkeeping that ties them to the
/// WAL. Mutated only through [`CorpusState::apply`].
pub struct CorpusState {
    pub(crate) generation: Generation,
    /// Last applied WAL sequence.
    pub(crate) seq: u64,
    /// Last sequence folded into the on-disk snapshot.
    pub(crate) checkpoint_seq: u64,
    pub(crate) mapper: IdMapper,
    pub(crate) index: Box<dyn VectorIndex>,
    pub(crate) metadata: Box<dyn MetadataStore>,
}

/// Pending mapping changes of a batch that has not been applied yet.
#[derive(Debug, Default)]
struct Overlay {
    mapped: HashMap<ExternalId, Option<InternalPosition>>,
    next_position: Option<InternalPosition>,
}

impl CorpusState {
    pub fn empty(quantizer: Quantizer) -> Self {
        CorpusState {
            generation: 0,
            seq: 0,
            checkpoint_seq: 0,
            mapper: IdMapper::new(),
            index: Box::new(FlatIndex::new(quantizer)),
            metadata: Box::new(InMemoryMetadataStore::new()),
        }
    }

    /// Rebuild from a snapshot, verifying that the mapping and the index
    /// describe the same set of live positions.
    pub fn from_snapshot(quantizer: Quantizer, snapshot: CorpusSnapshot) -> Result<Self> {
        let CorpusSnapshot {
            generation,
            checkpoint_seq,
            mapping,
            vectors,
            metadata,
        } = snapshot;

        let mapper = IdMapper::restore(mapping.entries, mapping.next_position)?;
        let index = FlatIndex::restore(quantizer, vectors.next_position, vectors.slots)?;
        if mapper.next_position() != index.next_position() {
            return Err(NewsvecError::IndexCorruption {
                position: index.next_position(),
                message: format!(
                    "mapping next position {} disagrees with index",
                    mapper.next_position()
                ),
            });
        }
        if mapper.live_count() != index.len() {
            return Err(NewsvecError::IndexCorruption {
                position: 0,
                message: format!(
                    "{} mapped ids but {} live slots",
                    mapper.live_count(),
                    index.len()
                ),
            });
        }
        for entry in mapper.entries() {
            if index.get(entry.position).is_none() {
                return Err(NewsvecError::IndexCorruption {
                    position: entry.position,
                    message: format!("'{}' is mapped to an empty slot", entry.id),
                });
            }
        }

        Ok(CorpusState {
            generation,
            seq: checkpoint_seq,
            checkpoint_seq,
            mapper,
            index: Box::new(index),
            metadata: Box::new(InMemoryMetadataStore::restore(metadata.records)),
        })
    }

    pub fn to_snapshot(&self) -> CorpusSnapshot {
        CorpusSnapshot {
            generation: self.generation,
            checkpoint_seq: self.seq,
            mapping: MappingData {
                next_position: self.mapper.next_position(),
                entries: self.mapper.entries(),
            },
            vectors: VectorData {
                next_position: self.index.next_position(),
                slots: self.index.entries(),
            },
            metadata: MetadataData {
                records: self.metadata.entries(),
            },
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn checkpoint_seq(&self) -> u64 {
        self.checkpoint_seq
    }

    pub fn quantizer(&self) -> &Quantizer {
        self.index.quantizer()
    }

    pub fn mapper(&self) -> &IdMapper {
        &self.mapper
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub fn metadata(&self) -> &dyn MetadataStore {
        self.metadata.as_ref()
    }

    /// Stored vector of a live id.
    pub fn vector_of(&self, id: &ExternalId) -> Option<&QuantizedVector> {
        self.mapper.lookup(id).and_then(|pos| self.index.get(pos))
    }

    pub fn metadata_of(&self, id: &ExternalId) -> Option<&MetadataRecord> {
        self.metadata.get(id).ok()
    }

    /// Verify that `ops` would apply cleanly, in order, to the current state.
    pub fn check(&self, ops: &[WalOp]) -> Result<()> {
        let mut overlay = Overlay::default();
        let quantizer = self.index.quantizer();

        for op in ops {
            match op {
                WalOp::Insert { id, position, vector } => {
                    if overlay.lookup(&self.mapper, id).is_some() {
                        return Err(NewsvecError::AlreadyMapped(id.to_string()));
                    }
                    let next = overlay.next_position.unwrap_or_else(|| self.mapper.next_position());
                    if *position < next {
                        return Err(NewsvecError::PositionOccupied(*position));
                    }
                    quantizer.check(vector)?;
                    overlay.mapped.insert(id.clone(), Some(*position));
                    overlay.next_position = Some(position + 1);
                }
                WalOp::Overwrite { id, position, vector } => {
                    Self::expect_mapped(overlay.lookup(&self.mapper, id), id, *position)?;
                    quantizer.check(vector)?;
                }
                WalOp::Release { id, position } => {
                    Self::expect_mapped(overlay.lookup(&self.mapper, id), id, *position)?;
                    overlay.mapped.insert(id.clone(), None);
                }
                WalOp::PutMetadata { .. } | WalOp::DeleteMetadata { .. } => {}
            }
        }
        Ok(())
    }

    fn expect_mapped(
        current: Option<InternalPosition>,
        id: &ExternalId,
        position: InternalPosition,
    ) -> Result<()> {
        match current {
            Some(p) if p == position => Ok(()),
            Some(p) => Err(NewsvecError::IndexCorruption {
                position,
                message: format!("'{}' is mapped to {}, not {}", id, p, position),
            }),
            None => Err(NewsvecError::NotFound(id.to_string())),
        }
    }

    /// Check, then apply `ops` in order and advance to `seq`.
    ///
    /// A failure after the check passed means the stores diverged from the
    /// mapping and is reported as corruption.
    pub fn apply(&mut self, seq: u64, ops: Vec<WalOp>) -> Result<()> {
        self.check(&ops)?;
        for op in ops {
            self.apply_one(op).map_err(|e| match e {
                NewsvecError::IndexCorruption { .. } => e,
                other => NewsvecError::IndexCorruption {
                    position: 0,
                    message: format!("apply failed after successful check: {}", other),
                },
            })?;
        }
        self.seq = seq;
        Ok(())
    }

    fn apply_one(&mut self, op: WalOp) -> Result<()> {
        match op {
            WalOp::Insert { id, position, vector } => {
                self.mapper.assign_at(id, position)?;
                self.index.insert(position, vector)
            }
            WalOp::Overwrite { position, vector, .. } => self.index.overwrite(position, vector),
            WalOp::Release { id, position } => {
                self.mapper.release(&id)?;
                self.index.remove(position)
            }
            WalOp::PutMetadata { id, record } => {
                self.metadata.put(id, record);
                Ok(())
            }
            WalOp::DeleteMetadata { id } => {
                self.metadata.delete(&id);
                Ok(())
            }
        }
    }
}

impl Overlay {
    fn lookup(&self, mapper: &IdMapper, id: &ExternalId) -> Option<InternalPosition> {
        match self.mapped.get(id) {
            Some(pending) => *pending,
            None => mapper.lookup(id),
        }
    }
}
