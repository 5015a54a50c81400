use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::core::errors::{NewsvecError, Result};
use crate::core::types::ExternalId;
use super::schema::MetadataRecord;

/// One stored record, the unit of the metadata snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub id: ExternalId,
    pub record: MetadataRecord,
}

/// Keyed store of per-document attributes.
///
/// Independent of vector existence: a record may exist for an id with no
/// mapped position and vice versa.
pub trait MetadataStore: Send + Sync {
    /// Upsert, returning the previous record.
    fn put(&mut self, id: ExternalId, record: MetadataRecord) -> Option<MetadataRecord>;

    fn get(&self, id: &ExternalId) -> Result<&MetadataRecord>;

    /// Remove, returning the previous record.
    fn delete(&mut self, id: &ExternalId) -> Option<MetadataRecord>;

    fn contains(&self, id: &ExternalId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records in id order.
    fn entries(&self) -> Vec<MetadataEntry>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    records: BTreeMap<ExternalId, MetadataRecord>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(entries: Vec<MetadataEntry>) -> Self {
        InMemoryMetadataStore {
            records: entries.into_iter().map(|e| (e.id, e.record)).collect(),
        }
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn put(&mut self, id: ExternalId, record: MetadataRecord) -> Option<MetadataRecord> {
        self.records.insert(id, record)
    }

    fn get(&self, id: &ExternalId) -> Result<&MetadataRecord> {
        self.records
            .get(id)
            .ok_or_else(|| NewsvecError::NotFound(format!("metadata for '{}'", id)))
    }

    fn delete(&mut self, id: &ExternalId) -> Option<MetadataRecord> {
        self.records.remove(id)
    }

    fn contains(&self, id: &ExternalId) -> bool {
        self.records.contains_key(id)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn entries(&self) -> Vec<MetadataEntry> {
        self.records
            .iter()
            .map(|(id, record)| MetadataEntry {
                id: id.clone(),
                record: record.clone(),
            })
            .collect()
    }
}
