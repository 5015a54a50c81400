use std::cmp::Ordering;
use std::collections::BinaryHeap;
use rayon::prelude::*;
use crate::compression::{QuantizedVector, Quantizer};
use crate::core::errors::{NewsvecError, Result};
use crate::core::types::InternalPosition;
use crate::mapping::PositionRemap;
use super::{IndexHit, SlotEntry, VectorIndex};

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Live(QuantizedVector),
    Tombstone,
}

/// Candidate ordered by (distance, position); the heap top is the worst
/// candidate kept so far.
#[derive(Debug, Clone)]
struct HeapEntry {
    distance: f32,
    position: InternalPosition,
}

impl Eq for HeapEntry {}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn push_bounded(heap: &mut BinaryHeap<HeapEntry>, entry: HeapEntry, k: usize) {
    if heap.len() < k {
        heap.push(entry);
    } else if heap.peek().map_or(false, |worst| entry < *worst) {
        heap.pop();
        heap.push(entry);
    }
}

/// Exact nearest-neighbor index: every query scans all live slots, split
/// across the rayon pool.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    quantizer: Quantizer,
    slots: Vec<Slot>,
    live: usize,
}

impl FlatIndex {
    pub fn new(quantizer: Quantizer) -> Self {
        FlatIndex {
            quantizer,
            slots: Vec::new(),
            live: 0,
        }
    }

    /// Rebuild from persisted live slots. Positions below `next_position`
    /// without an entry come back as tombstones.
    pub fn restore(
        quantizer: Quantizer,
        next_position: InternalPosition,
        entries: Vec<SlotEntry>,
    ) -> Result<Self> {
        let mut index = FlatIndex::new(quantizer);
        index.slots = vec![Slot::Tombstone; next_position as usize];
        for SlotEntry { position, vector } in entries {
            index.quantizer.check(&vector)?;
            match index.slots.get_mut(position as usize) {
                Some(slot @ Slot::Tombstone) => *slot = Slot::Live(vector),
                Some(Slot::Live(_)) => return Err(NewsvecError::PositionOccupied(position)),
                None => {
                    return Err(NewsvecError::IndexCorruption {
                        position,
                        message: format!("slot beyond next position {}", next_position),
                    })
                }
            }
            index.live += 1;
        }
        Ok(index)
    }

    fn live_slot_mut(&mut self, position: InternalPosition) -> Result<&mut QuantizedVector> {
        match self.slots.get_mut(position as usize) {
            Some(Slot::Live(vector)) => Ok(vector),
            _ => Err(NewsvecError::NotFound(format!("live slot {}", position))),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    fn insert(&mut self, position: InternalPosition, vector: QuantizedVector) -> Result<()> {
        self.quantizer.check(&vector)?;
        let idx = position as usize;
        if idx < self.slots.len() {
            return Err(NewsvecError::PositionOccupied(position));
        }
        // Skipped slots were handed out and released elsewhere; keep them dead.
        self.slots.resize(idx, Slot::Tombstone);
        self.slots.push(Slot::Live(vector));
        self.live += 1;
        Ok(())
    }

    fn overwrite(&mut self, position: InternalPosition, vector: QuantizedVector) -> Result<()> {
        self.quantizer.check(&vector)?;
        *self.live_slot_mut(position)? = vector;
        Ok(())
    }

    fn remove(&mut self, position: InternalPosition) -> Result<()> {
        self.live_slot_mut(position)?;
        self.slots[position as usize] = Slot::Tombstone;
        self.live -= 1;
        Ok(())
    }

    fn get(&self, position: InternalPosition) -> Option<&QuantizedVector> {
        match self.slots.get(position as usize) {
            Some(Slot::Live(vector)) => Some(vector),
            _ => None,
        }
    }

    fn search(&self, query: &QuantizedVector, k: usize) -> Result<Vec<IndexHit>> {
        self.quantizer.check(query)?;
        if k == 0 || self.live == 0 {
            return Ok(Vec::new());
        }

        let quantizer = &self.quantizer;
        let heap = self
            .slots
            .par_iter()
            .enumerate()
            .filter_map(|(idx, slot)| match slot {
                Slot::Live(vector) => Some(HeapEntry {
                    distance: quantizer.distance(query, vector),
                    position: idx as InternalPosition,
                }),
                Slot::Tombstone => None,
            })
            .fold(BinaryHeap::new, |mut heap, entry| {
                push_bounded(&mut heap, entry, k);
                heap
            })
            .reduce(BinaryHeap::new, |mut acc, other| {
                for entry in other {
                    push_bounded(&mut acc, entry, k);
                }
                acc
            });

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| IndexHit {
                position: entry.position,
                distance: entry.distance,
            })
            .collect())
    }

    fn compact(&mut self) -> PositionRemap {
        let mut remap = PositionRemap::with_capacity(self.live);
        let mut compacted = Vec::with_capacity(self.live);
        for (old, slot) in std::mem::take(&mut self.slots).into_iter().enumerate() {
            if let Slot::Live(vector) = slot {
                remap.insert(old as InternalPosition, compacted.len() as InternalPosition);
                compacted.push(Slot::Live(vector));
            }
        }
        self.slots = compacted;
        remap
    }

    fn len(&self) -> usize {
        self.live
    }

    fn tombstones(&self) -> usize {
        self.slots.len() - self.live
    }

    fn next_position(&self) -> InternalPosition {
        self.slots.len() as InternalPosition
    }

    fn entries(&self) -> Vec<SlotEntry> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| match slot {
                Slot::Live(vector) => Some(SlotEntry {
                    position: idx as InternalPosition,
                    vector: vector.clone(),
                }),
                Slot::Tombstone => None,
            })
            .collect()
    }
}
