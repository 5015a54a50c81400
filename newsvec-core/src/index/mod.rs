//! Vector index capability and the exact flat-scan implementation.

pub mod flat;

use serde::{Deserialize, Serialize};
use crate::compression::{QuantizedVector, Quantizer};
use crate::core::errors::Result;
use crate::core::types::InternalPosition;
use crate::mapping::PositionRemap;

pub use flat::FlatIndex;

/// Search result containing slot and distance.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub position: InternalPosition,
    pub distance: f32,
}

/// One live slot, the unit of the vector snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub position: InternalPosition,
    pub vector: QuantizedVector,
}

/// Quantized vectors keyed by internal position.
///
/// A slot is empty, live, or tombstoned. Once a slot has been used it cannot
/// be inserted into again until `compact` renumbers the index.
pub trait VectorIndex: Send + Sync {
    /// Codec and metric the stored vectors were encoded with.
    fn quantizer(&self) -> &Quantizer;

    /// Store `vector` in a never-used slot.
    fn insert(&mut self, position: InternalPosition, vector: QuantizedVector) -> Result<()>;

    /// Replace the vector of a live slot.
    fn overwrite(&mut self, position: InternalPosition, vector: QuantizedVector) -> Result<()>;

    /// Tombstone a live slot.
    fn remove(&mut self, position: InternalPosition) -> Result<()>;

    fn get(&self, position: InternalPosition) -> Option<&QuantizedVector>;

    /// Up to `k` live slots nearest to `query`, ascending by distance with
    /// ties broken by ascending position.
    fn search(&self, query: &QuantizedVector, k: usize) -> Result<Vec<IndexHit>>;

    /// Drop tombstones and renumber live slots densely in ascending
    /// old-position order.
    fn compact(&mut self) -> PositionRemap;

    /// Number of live slots.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tombstoned slots.
    fn tombstones(&self) -> usize;

    /// First never-used slot.
    fn next_position(&self) -> InternalPosition;

    /// Live slots in ascending position order.
    fn entries(&self) -> Vec<SlotEntry>;
}
