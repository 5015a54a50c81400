//! Similarity search joined against the metadata store.

use std::sync::Arc;
use std::time::Instant;
use serde::Serialize;
use tracing::{debug, instrument};
use crate::compression::QuantizedVector;
use crate::core::errors::{NewsvecError, Result};
use crate::core::types::{ExternalId, InternalPosition};
use crate::corpus::Corpus;
use crate::metadata::{Filter, MetadataRecord};

/// What to search with.
#[derive(Debug, Clone)]
pub enum QueryVector {
    /// Raw embedding, encoded with the corpus codec.
    Raw(Vec<f32>),
    /// Codes from the corpus codec, checked before use.
    Quantized(QuantizedVector),
    /// The stored vector of a live document; the document itself is
    /// among the results.
    ById(ExternalId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: ExternalId,
    pub position: InternalPosition,
    pub distance: f32,
    /// `None` when the document has a vector but no metadata.
    pub metadata: Option<MetadataRecord>,
}

/// Everything stored for one id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: ExternalId,
    pub position: Option<InternalPosition>,
    pub stable_key: u64,
    pub metadata: Option<MetadataRecord>,
}

pub struct QueryFacade {
    corpus: Arc<Corpus>,
}

impl QueryFacade {
    pub fn new(corpus: Arc<Corpus>) -> Self {
        QueryFacade { corpus }
    }

    /// Up to `k` nearest documents, ascending by distance.
    ///
    /// With a filter, `k * overfetch_factor` candidates are taken from the
    /// index and filtered after the metadata join, so fewer than `k` hits
    /// may come back even when more matching documents exist. Documents
    /// without metadata never match a filter.
    #[instrument(skip(self, query, filter))]
    pub fn similarity_search(
        &self,
        query: QueryVector,
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(NewsvecError::InvalidQuery("k must be >= 1".to_string()));
        }
        let start = Instant::now();
        let state = self.corpus.read();
        let quantizer = state.quantizer();

        let encoded = match query {
            QueryVector::Raw(vector) => quantizer.encode(&vector)?,
            QueryVector::Quantized(codes) => {
                quantizer.check(&codes)?;
                codes
            }
            QueryVector::ById(id) => state
                .vector_of(&id)
                .cloned()
                .ok_or_else(|| NewsvecError::NotFound(format!("vector for '{}'", id)))?,
        };

        let fetch = match filter {
            Some(_) => k.saturating_mul(self.corpus.config().overfetch_factor),
            None => k,
        };
        let candidates = state.index().search(&encoded, fetch)?;
        let candidate_count = candidates.len();

        let mut hits = Vec::with_capacity(k.min(candidate_count));
        for candidate in candidates {
            let id = state.mapper().reverse(candidate.position).ok_or_else(|| {
                NewsvecError::IndexCorruption {
                    position: candidate.position,
                    message: "live slot has no reverse mapping".to_string(),
                }
            })?;
            let metadata = state.metadata_of(id);
            if let Some(filter) = filter {
                if !metadata.map_or(false, |m| filter.matches(m)) {
                    continue;
                }
            }
            hits.push(SearchHit {
                id: id.clone(),
                position: candidate.position,
                distance: candidate.distance,
                metadata: metadata.cloned(),
            });
            if hits.len() == k {
                break;
            }
        }

        debug!(
            k,
            fetched = candidate_count,
            returned = hits.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Similarity search"
        );
        Ok(hits)
    }

    /// Position and metadata of `id`; `NotFound` when neither exists.
    pub fn document(&self, id: &ExternalId) -> Result<Document> {
        let state = self.corpus.read();
        let position = state.mapper().lookup(id);
        let metadata = state.metadata_of(id).cloned();
        if position.is_none() && metadata.is_none() {
            return Err(NewsvecError::NotFound(id.to_string()));
        }
        Ok(Document {
            id: id.clone(),
            position,
            stable_key: id.stable_key(),
            metadata,
        })
    }
}
