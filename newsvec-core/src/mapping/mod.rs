//! Bijective mapping between external document ids and internal positions.
//!
//! Positions are handed out in increasing order and never reused within a
//! generation: a released position stays dead until compaction renumbers
//! the survivors.

use std::collections::{BTreeMap, HashMap};
use serde::{Deserialize, Serialize};
use crate::core::errors::{NewsvecError, Result};
use crate::core::types::{ExternalId, InternalPosition};

/// Old position -> new position, produced by index compaction.
pub type PositionRemap = HashMap<InternalPosition, InternalPosition>;

/// One live mapping entry, the unit of the mapping snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub id: ExternalId,
    pub position: InternalPosition,
}

#[derive(Debug, Clone, Default)]
pub struct IdMapper {
    forward: HashMap<ExternalId, InternalPosition>,
    reverse: BTreeMap<InternalPosition, ExternalId>,
    next_position: InternalPosition,
}

impl IdMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries. Fails on duplicate ids or positions,
    /// or on a position at or beyond `next_position`.
    pub fn restore(entries: Vec<MappingEntry>, next_position: InternalPosition) -> Result<Self> {
        let mut mapper = IdMapper {
            next_position,
            ..Self::default()
        };
        for MappingEntry { id, position } in entries {
            if position >= next_position {
                return Err(NewsvecError::IndexCorruption {
                    position,
                    message: format!("mapped position beyond next position {}", next_position),
                });
            }
            if mapper.reverse.contains_key(&position) || mapper.forward.contains_key(&id) {
                return Err(NewsvecError::IndexCorruption {
                    position,
                    message: format!("duplicate mapping for '{}'", id),
                });
            }
            mapper.forward.insert(id.clone(), position);
            mapper.reverse.insert(position, id);
        }
        Ok(mapper)
    }

    /// Assign the next never-used position to `id`.
    pub fn assign(&mut self, id: ExternalId) -> Result<InternalPosition> {
        let position = self.next_position;
        self.assign_at(id, position)?;
        Ok(position)
    }

    /// Bind `id` to a specific fresh position. Positions below
    /// `next_position` were already handed out in this generation.
    pub fn assign_at(&mut self, id: ExternalId, position: InternalPosition) -> Result<()> {
        self.check_assign(&id, position)?;
        self.forward.insert(id.clone(), position);
        self.reverse.insert(position, id);
        self.next_position = position + 1;
        Ok(())
    }

    /// Validate an `assign_at` without applying it.
    pub fn check_assign(&self, id: &ExternalId, position: InternalPosition) -> Result<()> {
        if self.forward.contains_key(id) {
            return Err(NewsvecError::AlreadyMapped(id.to_string()));
        }
        if position < self.next_position {
            return Err(NewsvecError::PositionOccupied(position));
        }
        Ok(())
    }

    pub fn lookup(&self, id: &ExternalId) -> Option<InternalPosition> {
        self.forward.get(id).copied()
    }

    pub fn reverse(&self, position: InternalPosition) -> Option<&ExternalId> {
        self.reverse.get(&position)
    }

    /// Drop the mapping for `id`, returning its former position.
    pub fn release(&mut self, id: &ExternalId) -> Result<InternalPosition> {
        let position = self
            .forward
            .remove(id)
            .ok_or_else(|| NewsvecError::NotFound(id.to_string()))?;
        self.reverse.remove(&position);
        Ok(position)
    }

    pub fn live_count(&self) -> usize {
        self.forward.len()
    }

    pub fn next_position(&self) -> InternalPosition {
        self.next_position
    }

    /// Live entries in ascending position order.
    pub fn entries(&self) -> Vec<MappingEntry> {
        self.reverse
            .iter()
            .map(|(position, id)| MappingEntry {
                id: id.clone(),
                position: *position,
            })
            .collect()
    }

    /// Renumber live entries after compaction. Every live position must be
    /// covered by `remap`.
    pub fn apply_remap(&mut self, remap: &PositionRemap) -> Result<()> {
        let mut forward = HashMap::with_capacity(self.forward.len());
        let mut reverse = BTreeMap::new();
        for (old, id) in &self.reverse {
            let new = *remap.get(old).ok_or_else(|| NewsvecError::IndexCorruption {
                position: *old,
                message: "live mapping has no compacted slot".to_string(),
            })?;
            forward.insert(id.clone(), new);
            reverse.insert(new, id.clone());
        }
        self.next_position = reverse.keys().next_back().map_or(0, |p| p + 1);
        self.forward = forward;
        self.reverse = reverse;
        Ok(())
    }
}
